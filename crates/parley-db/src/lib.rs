//! SQLite persistence for Parley.
//!
//! Provides connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the query helpers behind the assistant's
//! task, project, user and user-info collaborators.
//!
//! All helpers take a plain `&rusqlite::Connection`; callers on the async
//! side check a connection out of the pool inside `spawn_blocking`.

mod error;
mod migrations;
mod pool;
mod tasks;
mod users;

pub use error::DbError;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use tasks::{
    create_project, create_task, get_task, list_projects, list_tasks, update_task,
    CreateProjectParams, CreateTaskParams, UpdateTaskParams,
};
pub use users::{find_user_by_email, get_user_info, insert_user, set_user_info, UserRow};
