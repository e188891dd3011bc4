pub mod admin;
pub mod config;
pub mod delivery_spec;
pub mod error;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod matching;
pub mod model;
pub mod persistence;
pub mod reconcile;
pub mod report;
pub mod weekday;

pub use admin::{AdminEdit, NewStore, check_secret};
pub use config::{TextEncoding, ValidatorConfig};
pub use delivery_spec::DeliverySpec;
pub use error::{ValidatorError, ValidatorResult};
pub use matching::{MatchVerdict, applicable_days, match_store};
pub use model::{MasterTable, PlannedDelivery, StoreMaster};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteMasterStore;
pub use persistence::{
    CsvMasterStore, MasterStore, PersistenceError, PlanningReader, load_master_from_csv,
    load_required_master, read_planning, save_master_to_csv,
};
pub use reconcile::{
    ReconciliationReport, ReconciliationSummary, ReportRow, reconcile, validate_planning,
};
pub use report::{
    ExportFormat, ReportOptions, assemble_report, export_file_name, write_report, write_report_csv,
    write_report_xlsx,
};
pub use weekday::{WeekdayCode, day_code_of};
