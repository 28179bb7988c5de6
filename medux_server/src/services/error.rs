//! Errors raised by service operations.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::fhir::DatatypeError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Datatype(#[from] DatatypeError),

    #[error("{0}")]
    Validation(String),

    #[error("{model} {id} not found")]
    NotFound { model: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("database error: {0}")]
    Database(DieselError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(model: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            model,
            id: id.to_string(),
        }
    }
}

impl From<DieselError> for ServiceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)
            | DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::Conflict(info.message().to_string())
            }
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                Self::Validation(info.message().to_string())
            }
            other => Self::Database(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
