use planning_validator::{
    CsvMasterStore, MasterStore, MasterTable, NewStore, PlanningReader, ReconciliationReport,
    ReportOptions, ValidatorConfig, ValidatorError, admin, assemble_report, check_secret,
    export_file_name, load_required_master, report::render_text_table, validate_planning,
    write_report,
};
use polars::prelude::DataFrame;
use std::io::{self, Write};
use std::path::PathBuf;

struct Session {
    config: ValidatorConfig,
    store: CsvMasterStore,
    master: Option<MasterTable>,
    report: Option<ReconciliationReport>,
    admin: bool,
}

impl Session {
    fn new(config: ValidatorConfig) -> Self {
        let store = CsvMasterStore::from_config(&config);
        Self {
            config,
            store,
            master: None,
            report: None,
            admin: false,
        }
    }

    fn master(&mut self) -> Result<&MasterTable, ValidatorError> {
        if self.master.is_none() {
            self.master = Some(load_required_master(&self.store)?);
        }
        match self.master.as_ref() {
            Some(table) => Ok(table),
            None => Err(ValidatorError::MissingMasterTable(self.store.describe())),
        }
    }

    fn report_frame(&self, report: &ReconciliationReport) -> Option<DataFrame> {
        let options = ReportOptions {
            collapse_verdicts: self.config.collapse_verdicts,
        };
        match assemble_report(report, options) {
            Ok(df) => Some(df),
            Err(err) => {
                println!("Error building report: {err}");
                None
            }
        }
    }
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  master show                        Show the master table\n  master load <csv>                  Use another master table file\n  master reload                      Re-read the master table from disk\n  validate <planning_file>           Validate a planning file (.csv or .xlsx)\n  show                               Show the last validation report\n  missing                            Show expected stores missing from the planning\n  export [path]                      Export the last report (.xlsx or .csv)\n  login <secret>                     Unlock master-table edits\n  logout                             Lock master-table edits\n  set <id> <spec...>                 Update a store's delivery days (e.g. L,X,V)\n  add <id> <zone> <spec> <name...>   Register a new store\n  quit|exit                          Exit"
    );
}

fn print_master(table: &MasterTable) {
    println!("{:<8} {:<30} {:<20} {}", "Pto Op", "Tienda", "Zona", "Dias");
    for store in table.stores() {
        println!(
            "{:<8} {:<30} {:<20} {}",
            store.store_id, store.name, store.zone, store.delivery_spec
        );
    }
    println!("{} store(s).", table.len());
}

fn print_report_header(report: &ReconciliationReport) {
    match report.reference_date {
        Some(date) => println!(
            "Planning day: {} ({}, {})",
            report.reference_day,
            report.reference_day.spanish_name(),
            date
        ),
        None => println!("Planning day: {}", report.reference_day),
    }
    if report.weekend_mode() {
        println!("Weekend mode: Monday deliveries also satisfy this run.");
    }
    if !report.date_anomalies.is_empty() {
        println!(
            "Warning: {} row(s) do not share the reference date.",
            report.date_anomalies.len()
        );
    }
}

fn cmd_validate(session: &mut Session, path: &str) {
    let reader = PlanningReader::from_config(&session.config);
    let planned = match reader.read_path(path) {
        Ok(planned) => planned,
        Err(err) => {
            println!("Error reading planning: {err}");
            return;
        }
    };
    let result = session
        .master()
        .and_then(|master| validate_planning(master, &planned));
    match result {
        Ok(report) => {
            print_report_header(&report);
            if let Some(df) = session.report_frame(&report) {
                println!("{}", render_text_table(&df));
            }
            println!(
                "Validated planning for day {}: {}",
                report.reference_day,
                report.summary().to_cli_summary()
            );
            session.report = Some(report);
        }
        Err(err) => println!("Error validating planning: {err}"),
    }
}

fn cmd_missing(session: &Session) {
    let Some(report) = session.report.as_ref() else {
        println!("No validation has been run yet.");
        return;
    };
    if report.missing.is_empty() {
        println!("No expected stores are missing.");
        return;
    }
    for row in &report.missing {
        println!(
            "{:<8} {:<30} {:<20} {}",
            row.store_id.map(|id| id.to_string()).unwrap_or_default(),
            row.store_name,
            row.zone.as_deref().unwrap_or_default(),
            row.delivery_spec.as_deref().unwrap_or_default()
        );
    }
    println!("{} expected store(s) missing.", report.missing.len());
}

fn cmd_export(session: &Session, path: Option<&str>) {
    let Some(report) = session.report.as_ref() else {
        println!("No validation has been run yet.");
        return;
    };
    let Some(df) = session.report_frame(report) else {
        return;
    };
    let path = path.map(PathBuf::from).unwrap_or_else(|| {
        PathBuf::from(export_file_name(
            report.reference_date,
            report.reference_day,
            session.config.export_format,
        ))
    });
    match write_report(&df, &path, session.config.master_delimiter_byte()) {
        Ok(()) => println!("Report exported to {}.", path.display()),
        Err(err) => println!("Error exporting report: {err}"),
    }
}

fn cmd_set(session: &mut Session, store_id: i64, spec: String) {
    match admin::update_delivery_spec(&session.store, session.admin, store_id, spec) {
        Ok(store) => {
            println!(
                "Updated store {} ({}) delivery days to '{}'.",
                store.store_id, store.name, store.delivery_spec
            );
            session.master = None;
        }
        Err(ValidatorError::StoreNotFound(id)) => println!("Store {id} not found."),
        Err(ValidatorError::Unauthorized) => println!("Login required."),
        Err(err) => println!("Error updating store: {err}"),
    }
}

fn cmd_add(session: &mut Session, new_store: NewStore) {
    let store = new_store.into_master(&session.config);
    match admin::add_store(&session.store, session.admin, store) {
        Ok(store) => {
            println!("Added store {} ({}).", store.store_id, store.name);
            session.master = None;
        }
        Err(ValidatorError::DuplicateStoreId(id)) => {
            println!("Store {id} already exists in the master table.")
        }
        Err(ValidatorError::Unauthorized) => println!("Login required."),
        Err(err) => println!("Error adding store: {err}"),
    }
}

fn main() {
    env_logger::init();

    let config = match ValidatorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error loading configuration: {err}");
            std::process::exit(1);
        }
    };
    let mut session = Session::new(config);

    println!("Planning Validator (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or_default();
        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "master" => match parts.next() {
                Some("show") => match session.master() {
                    Ok(table) => print_master(table),
                    Err(err) => println!("Error loading master table: {err}"),
                },
                Some("reload") => {
                    session.master = None;
                    match session.master() {
                        Ok(table) => println!("Master table reloaded ({} stores).", table.len()),
                        Err(err) => println!("Error loading master table: {err}"),
                    }
                }
                Some("load") => match parts.next() {
                    Some(path) => {
                        session.config.master_path = PathBuf::from(path);
                        session.store = CsvMasterStore::from_config(&session.config);
                        session.master = None;
                        match session.master() {
                            Ok(table) => println!("Master table loaded from {path} ({} stores).", table.len()),
                            Err(err) => println!("Error loading master table: {err}"),
                        }
                    }
                    None => println!("Usage: master load <csv>"),
                },
                _ => println!("Usage: master <show|load|reload>"),
            },
            "validate" => match parts.next() {
                Some(path) => cmd_validate(&mut session, path),
                None => println!("Usage: validate <planning_file>"),
            },
            "show" => match session.report.as_ref() {
                Some(report) => {
                    print_report_header(report);
                    if let Some(df) = session.report_frame(report) {
                        println!("{}", render_text_table(&df));
                    }
                }
                None => println!("No validation has been run yet."),
            },
            "missing" => cmd_missing(&session),
            "export" => cmd_export(&session, parts.next()),
            "login" => {
                let candidate = parts.collect::<Vec<_>>().join(" ");
                if check_secret(&candidate, session.config.admin_secret.as_deref()) {
                    session.admin = true;
                    println!("Admin session unlocked.");
                } else {
                    println!("Invalid admin secret.");
                }
            }
            "logout" => {
                session.admin = false;
                println!("Admin session locked.");
            }
            "set" => {
                let id = parts.next().and_then(|s| s.parse::<i64>().ok());
                let spec = parts.collect::<Vec<_>>().join(" ");
                match id {
                    Some(id) if !spec.is_empty() => cmd_set(&mut session, id, spec),
                    _ => println!("Usage: set <id> <spec...>"),
                }
            }
            "add" => {
                let id = parts.next().and_then(|s| s.parse::<i64>().ok());
                let zone = parts.next();
                let spec = parts.next();
                let name = parts.collect::<Vec<_>>().join(" ");
                match (id, zone, spec) {
                    (Some(store_id), Some(zone), Some(spec)) if !name.is_empty() => cmd_add(
                        &mut session,
                        NewStore {
                            store_id,
                            name,
                            zone: zone.to_string(),
                            delivery_spec: spec.to_string(),
                            distribution_center: None,
                            format: None,
                        },
                    ),
                    _ => println!("Usage: add <id> <zone> <spec> <name...>"),
                }
            }
            _ => println!("Unknown command. Type 'help' for commands."),
        }
    }
}
