use crate::persistence::PersistenceError;
use thiserror::Error;

/// Run-level and admin-level failures. A store missing from the master table
/// is not an error; it is reported through [`crate::MatchVerdict::NotInMaster`].
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("invalid reference date '{value}'")]
    InvalidDate { value: String },
    #[error("planning table contains no rows")]
    EmptyPlanning,
    #[error("store id {0} already exists in the master table")]
    DuplicateStoreId(i64),
    #[error("store id {0} not found in the master table")]
    StoreNotFound(i64),
    #[error("master table not found at {0}")]
    MissingMasterTable(String),
    #[error("admin session is not authenticated")]
    Unauthorized,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type ValidatorResult<T> = Result<T, ValidatorError>;
