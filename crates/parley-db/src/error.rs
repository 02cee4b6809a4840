use thiserror::Error;

/// Errors returned by the query helpers.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
    #[error("failed to check out pooled connection: {0}")]
    Pool(#[from] r2d2::Error),
}

impl DbError {
    pub(crate) fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }
}
