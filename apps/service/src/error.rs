use thiserror::Error;

use crate::database::StoreError;

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound { kind, id: id.to_string() }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
