use crate::admin::AdminEdit;
use crate::error::{ValidatorError, ValidatorResult};
use crate::model::{MasterTable, StoreMaster};
use polars::prelude::PolarsError;
use serde_json::Error as SerdeJsonError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("dataframe conversion error: {0}")]
    DataFrame(#[from] PolarsError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("spreadsheet read error: {0}")]
    SpreadsheetRead(#[from] calamine::Error),
    #[error("spreadsheet write error: {0}")]
    SpreadsheetWrite(#[from] rust_xlsxwriter::XlsxError),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("no master table stored")]
    NotFound,
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Persistent home of the master table.
pub trait MasterStore {
    /// Location shown in error messages.
    fn describe(&self) -> String;

    /// Load the table; [`PersistenceError::NotFound`] when nothing is stored.
    fn load_master(&self) -> PersistenceResult<MasterTable>;

    fn save_master(&self, table: &MasterTable) -> PersistenceResult<()>;

    /// Apply one admin edit as an exclusive read-modify-write and return the
    /// edited row. Concurrent callers on the same store are serialized.
    fn apply_edit(&self, edit: &AdminEdit) -> ValidatorResult<StoreMaster>;
}

/// Load the master table, treating an absent table as fatal for the run.
pub fn load_required_master(store: &dyn MasterStore) -> ValidatorResult<MasterTable> {
    store.load_master().map_err(|err| missing_master(store, err))
}

pub(crate) fn missing_master(store: &dyn MasterStore, err: PersistenceError) -> ValidatorError {
    match err {
        PersistenceError::NotFound => ValidatorError::MissingMasterTable(store.describe()),
        other => ValidatorError::Persistence(other),
    }
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    CsvMasterStore, PlanningReader, load_master_from_csv, read_planning, save_master_to_csv,
};
