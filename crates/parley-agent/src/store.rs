//! Persistence and lookup collaborators used by tools and the connection
//! handler.

use async_trait::async_trait;
use parley_db::{CreateProjectParams, CreateTaskParams, DbError, DbPool, UpdateTaskParams};
use parley_types::{ProjectRecord, TaskRecord};
use reqwest::Client;
use rusqlite::Connection;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("blocking task failed: {0}")]
    Join(String),
    #[error("lookup failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Task, project and user-info persistence for one user at a time.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, user_id: i64, params: CreateTaskParams) -> Result<TaskRecord, StoreError>;

    async fn update_task(
        &self,
        user_id: i64,
        task_id: i64,
        params: UpdateTaskParams,
    ) -> Result<TaskRecord, StoreError>;

    async fn create_project(
        &self,
        user_id: i64,
        params: CreateProjectParams,
    ) -> Result<ProjectRecord, StoreError>;

    async fn user_info(&self, user_id: i64) -> Result<String, StoreError>;
}

/// [`TaskStore`] over the SQLite pool. Queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: DbPool,
}

impl SqliteTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?;
        Ok(result?)
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create_task(&self, user_id: i64, params: CreateTaskParams) -> Result<TaskRecord, StoreError> {
        self.with_conn(move |conn| parley_db::create_task(conn, user_id, &params))
            .await
    }

    async fn update_task(
        &self,
        user_id: i64,
        task_id: i64,
        params: UpdateTaskParams,
    ) -> Result<TaskRecord, StoreError> {
        self.with_conn(move |conn| parley_db::update_task(conn, user_id, task_id, &params))
            .await
    }

    async fn create_project(
        &self,
        user_id: i64,
        params: CreateProjectParams,
    ) -> Result<ProjectRecord, StoreError> {
        self.with_conn(move |conn| parley_db::create_project(conn, user_id, &params))
            .await
    }

    async fn user_info(&self, user_id: i64) -> Result<String, StoreError> {
        self.with_conn(move |conn| parley_db::get_user_info(conn, user_id))
            .await
    }
}

/// Resolves a client IP to location and timezone details.
#[async_trait]
pub trait TimezoneLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<Value, StoreError>;
}

/// [`TimezoneLookup`] backed by ipinfo.io's `/{ip}/json` endpoint.
pub struct IpInfoLookup {
    client: Client,
    base_url: String,
}

impl IpInfoLookup {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TimezoneLookup for IpInfoLookup {
    async fn lookup(&self, ip: &str) -> Result<Value, StoreError> {
        let info = self
            .client
            .get(format!("{}/{ip}/json", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(info)
    }
}
