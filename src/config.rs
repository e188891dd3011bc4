use crate::persistence::{PersistenceError, PersistenceResult};
use crate::report::ExportFormat;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "PLANNING_VALIDATOR_CONFIG";
pub const MASTER_PATH_ENV: &str = "PLANNING_VALIDATOR_MASTER";
pub const ADMIN_SECRET_ENV: &str = "PLANNING_VALIDATOR_ADMIN_SECRET";
pub const HTTP_ADDR_ENV: &str = "PLANNING_VALIDATOR_HTTP_ADDR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    #[default]
    Latin1,
    Utf8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub master_path: PathBuf,
    pub master_delimiter: char,
    pub master_encoding: TextEncoding,
    /// Shared secret unlocking master-table edits. Admin is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
    pub http_addr: String,
    /// Accepted planning date formats, tried in order. Day-first formats
    /// come before year-first ones for slash-separated dates.
    pub planning_date_formats: Vec<String>,
    pub default_distribution_center: String,
    pub default_format: String,
    pub collapse_verdicts: bool,
    /// Format of the default export file name.
    pub export_format: ExportFormat,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            master_path: PathBuf::from("data/maestro.csv"),
            master_delimiter: ';',
            master_encoding: TextEncoding::Latin1,
            admin_secret: None,
            http_addr: "0.0.0.0:3000".to_string(),
            // Slash dates are read day-first: 03/01/2025 is 3 January. Planning
            // files prepared for month-first readers (pandas `to_datetime`
            // defaults) need "%m/%d/%Y" moved ahead of "%d/%m/%Y".
            planning_date_formats: vec![
                "%Y-%m-%d".to_string(),
                "%d/%m/%Y".to_string(),
                "%d-%m-%Y".to_string(),
                "%Y/%m/%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%d/%m/%Y %H:%M".to_string(),
                "%d/%m/%Y %H:%M:%S".to_string(),
            ],
            default_distribution_center: "Malvinas".to_string(),
            default_format: "Express".to_string(),
            collapse_verdicts: false,
            export_format: ExportFormat::Xlsx,
        }
    }
}

impl ValidatorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> PersistenceResult<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load the file named by `PLANNING_VALIDATOR_CONFIG` (defaults when
    /// unset), then apply environment overrides.
    pub fn from_env() -> PersistenceResult<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                debug!("loading config from {path}");
                Self::load(path.trim())?
            }
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup; blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(path) = value(MASTER_PATH_ENV) {
            self.master_path = PathBuf::from(path);
        }
        if let Some(secret) = value(ADMIN_SECRET_ENV) {
            self.admin_secret = Some(secret);
        }
        if let Some(addr) = value(HTTP_ADDR_ENV) {
            self.http_addr = addr;
        }
    }

    pub fn master_delimiter_byte(&self) -> u8 {
        // validate() guarantees an ASCII delimiter.
        self.master_delimiter as u8
    }

    fn validate(&self) -> PersistenceResult<()> {
        if !self.master_delimiter.is_ascii() {
            return Err(PersistenceError::InvalidData(format!(
                "master_delimiter must be an ASCII character (got '{}')",
                self.master_delimiter
            )));
        }
        if self.planning_date_formats.is_empty() {
            return Err(PersistenceError::InvalidData(
                "planning_date_formats must list at least one format".into(),
            ));
        }
        Ok(())
    }
}
