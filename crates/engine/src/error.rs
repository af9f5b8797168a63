//! Errors the engine can surface to callers.

use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InvalidRequest(a), Self::InvalidRequest(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
