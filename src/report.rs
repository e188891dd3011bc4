use crate::persistence::PersistenceResult;
use crate::reconcile::{ReconciliationReport, ReportRow};
use crate::weekday::WeekdayCode;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Days between 0001-01-01 and 1970-01-01, the epoch polars dates count from.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub const VERDICT_COLUMN: &str = "verdict";
pub const REPORT_SHEET_NAME: &str = "Validacion";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    #[default]
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    /// Format implied by a file extension; anything but `.xlsx` is delimited text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => ExportFormat::Xlsx,
            _ => ExportFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Emit "Corresponde"/"No corresponde" instead of the day-naming labels.
    pub collapse_verdicts: bool,
}

/// Shape a reconciliation report into a flat table.
///
/// Fixed leading columns are verdict, store id, store name, zone and
/// delivery spec. Passthrough columns (date, shipment id, trip id) are
/// appended only when at least one row carries a value for them.
pub fn assemble_report(
    report: &ReconciliationReport,
    options: ReportOptions,
) -> PolarsResult<DataFrame> {
    let rows: Vec<&ReportRow> = report.rows().collect();

    let verdicts: Vec<String> = rows
        .iter()
        .map(|r| {
            if options.collapse_verdicts {
                r.verdict.collapsed_label().to_string()
            } else {
                r.verdict.label()
            }
        })
        .collect();
    let store_ids: Vec<Option<i64>> = rows.iter().map(|r| r.store_id).collect();
    let names: Vec<&str> = rows.iter().map(|r| r.store_name.as_str()).collect();
    let zones: Vec<Option<&str>> = rows.iter().map(|r| r.zone.as_deref()).collect();
    let specs: Vec<Option<&str>> = rows.iter().map(|r| r.delivery_spec.as_deref()).collect();

    let mut columns: Vec<Column> = vec![
        Series::new(PlSmallStr::from_static(VERDICT_COLUMN), verdicts).into_column(),
        Series::new(PlSmallStr::from_static("store_id"), store_ids).into_column(),
        Series::new(PlSmallStr::from_static("store_name"), names).into_column(),
        Series::new(PlSmallStr::from_static("zone"), zones).into_column(),
        Series::new(PlSmallStr::from_static("delivery_spec"), specs).into_column(),
    ];

    if rows.iter().any(|r| r.date.is_some()) {
        let dates: Vec<Option<i32>> = rows.iter().map(|r| r.date.map(date_to_i32)).collect();
        columns.push(
            Series::new(PlSmallStr::from_static("date"), dates)
                .cast(&DataType::Date)?
                .into_column(),
        );
    }
    if rows.iter().any(|r| r.shipment_id.is_some()) {
        let values: Vec<Option<&str>> = rows.iter().map(|r| r.shipment_id.as_deref()).collect();
        columns.push(Series::new(PlSmallStr::from_static("shipment_id"), values).into_column());
    }
    if rows.iter().any(|r| r.trip_id.is_some()) {
        let values: Vec<Option<&str>> = rows.iter().map(|r| r.trip_id.as_deref()).collect();
        columns.push(Series::new(PlSmallStr::from_static("trip_id"), values).into_column());
    }

    DataFrame::new(columns)
}

/// Export file name, e.g. `Validacion_V_03-01.xlsx`.
pub fn export_file_name(
    reference_date: Option<NaiveDate>,
    day: WeekdayCode,
    format: ExportFormat,
) -> String {
    let ext = format.extension();
    match reference_date {
        Some(date) => format!("Validacion_{}_{}.{ext}", day, date.format("%d-%m")),
        None => format!("Validacion_{}.{ext}", day),
    }
}

/// Write the frame in the format implied by the path's extension.
pub fn write_report<P: AsRef<Path>>(df: &DataFrame, path: P, delimiter: u8) -> PersistenceResult<()> {
    let path = path.as_ref();
    match ExportFormat::from_path(path) {
        ExportFormat::Xlsx => write_report_xlsx(df, path),
        ExportFormat::Csv => write_report_csv(df, path, delimiter),
    }
}

pub fn write_report_csv<P: AsRef<Path>>(
    df: &DataFrame,
    path: P,
    delimiter: u8,
) -> PersistenceResult<()> {
    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(file);

    let columns = df.get_columns();
    writer.write_record(columns.iter().map(|c| c.name().as_str()))?;
    for row_idx in 0..df.height() {
        let mut record = Vec::with_capacity(columns.len());
        for col in columns {
            record.push(col.get(row_idx).map(|av| any_value_to_string(&av))?);
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Single-sheet workbook named [`REPORT_SHEET_NAME`]. Store ids are written
/// as numbers, everything else as text.
pub fn write_report_xlsx<P: AsRef<Path>>(df: &DataFrame, path: P) -> PersistenceResult<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet().set_name(REPORT_SHEET_NAME)?;

    let columns = df.get_columns();
    for (col_idx, col) in columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, col.name().as_str())?;
    }
    for row_idx in 0..df.height() {
        let xlsx_row = row_idx as u32 + 1;
        for (col_idx, col) in columns.iter().enumerate() {
            let col16 = col_idx as u16;
            match col.get(row_idx)? {
                AnyValue::Null => {}
                AnyValue::Int32(v) => {
                    worksheet.write_number(xlsx_row, col16, f64::from(v))?;
                }
                AnyValue::Int64(v) => {
                    worksheet.write_number(xlsx_row, col16, v as f64)?;
                }
                av => {
                    worksheet.write_string(xlsx_row, col16, any_value_to_string(&av))?;
                }
            }
        }
    }

    workbook.save(path.as_ref())?;
    Ok(())
}

pub fn any_value_to_string(av: &AnyValue) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Date(days) => date_from_i32(*days)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        _ => av.to_string(),
    }
}

/// Render a frame as a boxed plain-text table.
pub fn render_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let cells: Vec<Vec<String>> = (0..df.height())
        .map(|row_idx| {
            columns
                .iter()
                .map(|col| {
                    col.get(row_idx)
                        .map(|av| any_value_to_string(&av))
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = col_names.iter().map(|n| n.chars().count()).collect();
    for row in &cells {
        for (ci, cell) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(cell.chars().count());
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    push_line(&mut out, &col_names, &widths);
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        push_line(&mut out, row, &widths);
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    out.push('|');
    for (ci, cell) in cells.iter().enumerate() {
        out.push(' ');
        out.push_str(cell);
        let pad = widths[ci].saturating_sub(cell.chars().count());
        out.push_str(&" ".repeat(pad));
        out.push_str(" |");
    }
    out.push('\n');
}

fn date_to_i32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn date_from_i32(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}
