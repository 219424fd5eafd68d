//! `rusty-automation-tool` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the API server, with its own in-process task queue.
//! - `worker`   — start a standalone pool of queue workers.
//! - `migrate`  — run pending database migrations.
//! - `validate` — validate a workflow definition JSON file.

mod tasks;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use engine::Engine;
use nodes::NodeRegistry;
use queue::{TaskQueue, TaskRegistry};
use state::StateStore;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "rusty-automation-tool",
    about = "High-performance workflow automation engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        /// Workers draining the in-process task queue alongside the server.
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Start a standalone pool of queue workers.
    Worker {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow definition JSON file (`{nodes, edges}`).
        path: std::path::PathBuf,
    },
}

/// Wires up the pool, two-tier state store, node registry, engine and task
/// queue that every long-running subcommand needs.
async fn build_runtime(database_url: &str) -> (db::DbPool, Engine, Arc<StateStore>, Arc<TaskQueue>) {
    let pool = db::pool::create_pool(database_url, 10)
        .await
        .expect("failed to connect to database");

    let state = Arc::new(StateStore::new(pool.clone()));
    let nodes = NodeRegistry::new();
    nodes.register("Conditional", Arc::new(nodes::ConditionalNode));
    let engine = Engine::new(pool.clone(), Arc::clone(&state), nodes);

    let task_registry = TaskRegistry::new();
    tasks::register_core_tasks(&task_registry, engine.clone(), Arc::clone(&state));
    let queue = TaskQueue::new(task_registry);

    (pool, engine, state, queue)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, database_url, workers } => {
            info!("Starting API server on {bind}");
            let (pool, engine, state, queue) = build_runtime(&database_url).await;
            queue.spawn_workers(workers);

            let app_state = api::AppState { pool, engine, state, queue };
            api::serve(&bind, app_state).await.expect("API server failed");
        }
        Command::Worker { database_url, workers } => {
            info!("Starting {workers} background worker(s)");
            let (_pool, _engine, _state, queue) = build_runtime(&database_url).await;
            let handles = queue.spawn_workers(workers);

            tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
            info!("Shutting down workers");
            queue.shutdown();
            for handle in handles {
                handle.await.ok();
            }
        }
        Command::Migrate { database_url } => {
            info!("Running migrations against {database_url}");
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .expect("failed to connect to database");
            db::pool::run_migrations(&pool).await.expect("migration failed");
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("cannot read file {}: {e}", path.display()));

            let definition: engine::WorkflowDefinition =
                serde_json::from_str(&content).unwrap_or_else(|e| panic!("invalid JSON: {e}"));

            let result = engine::validator::validate(&definition, &engine::validator::core_known_types());
            println!("{}", serde_json::to_string_pretty(&result).expect("serializable"));

            if !result.valid {
                std::process::exit(1);
            }
        }
    }
}
