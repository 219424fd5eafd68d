//! `engine` crate — core domain models, DAG validation, conditional-edge
//! routing, and the execution engine that ties them together with the
//! `nodes`/`state`/`db` crates.

pub mod conditional;
pub mod dag;
pub mod engine;
pub mod error;
pub mod models;
pub mod validator;

pub use engine::{Engine, RunStatusView, WorkflowPatch};
pub use error::EngineError;
pub use models::{
    Edge, NodeDefinition, NodeExecution, NodeStatus, RunError, RunProgress, RunStatus, Variables,
    Workflow, WorkflowDefinition, WorkflowRun, WorkflowStatus,
};
pub use validator::ValidationResult;
