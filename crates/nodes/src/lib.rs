//! `nodes` crate — the `ExecutableNode` trait, its error taxonomy, and the
//! registry that maps a workflow node's `type` string to a registered
//! executor.
//!
//! Node *implementations* (`DataMapper`, `APICall`, `ERPExport`, ...) are
//! external collaborators resolved by name at runtime; this crate defines
//! only the dispatch contract and the registry, plus a `MockNode` test
//! double used throughout the `engine` crate's test suite.

pub mod builtin;
pub mod error;
pub mod mock;
pub mod registry;
pub mod retry;
pub mod traits;

pub use builtin::ConditionalNode;
pub use error::NodeError;
pub use registry::NodeRegistry;
pub use retry::RetryPolicy;
pub use traits::{ExecutableNode, ExecutionContext};
