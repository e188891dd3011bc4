use super::{MasterStore, PersistenceError, PersistenceResult, missing_master};
use crate::admin::AdminEdit;
use crate::config::{TextEncoding, ValidatorConfig};
use crate::error::ValidatorResult;
use crate::model::{MasterTable, PlannedDelivery, StoreMaster};
use calamine::{Data, Reader, Xlsx, open_workbook_auto};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use encoding_rs::WINDOWS_1252;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

const PLANNING_DELIMITERS: [u8; 4] = [b';', b',', b'\t', b'|'];
const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Master table row as laid out in the operator's spreadsheet export.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MasterCsvRecord {
    #[serde(rename = "CD", alias = "distribution_center", default)]
    distribution_center: String,
    #[serde(rename = "Pto Op", alias = "store_id")]
    store_id: String,
    #[serde(rename = "Tienda", alias = "name", default)]
    name: String,
    #[serde(rename = "Formato", alias = "format", default)]
    format: String,
    #[serde(rename = "Zona Geografica", alias = "zone", default)]
    zone: String,
    #[serde(rename = "DIA DE ENTREGA", alias = "delivery_spec", default)]
    delivery_spec: String,
}

impl From<&StoreMaster> for MasterCsvRecord {
    fn from(store: &StoreMaster) -> Self {
        Self {
            distribution_center: store.distribution_center.clone().unwrap_or_default(),
            store_id: store.store_id.to_string(),
            name: store.name.clone(),
            format: store.format.clone().unwrap_or_default(),
            zone: store.zone.clone(),
            delivery_spec: store.delivery_spec.clone(),
        }
    }
}

impl MasterCsvRecord {
    fn into_store(self) -> PersistenceResult<StoreMaster> {
        let store_id = parse_store_id(&self.store_id)?;
        Ok(StoreMaster {
            store_id,
            name: self.name,
            zone: self.zone,
            delivery_spec: self.delivery_spec,
            distribution_center: parse_string_option(self.distribution_center),
            format: parse_string_option(self.format),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct PlanningCsvRecord {
    #[serde(rename = "FECHA", alias = "date", default)]
    date: String,
    #[serde(rename = "TIENDA", alias = "store_id", default)]
    store_id: String,
    #[serde(rename = "NOMBRE_TIENDA", alias = "name", default)]
    name: String,
    #[serde(rename = "ENVIO", alias = "SHIPMENT", alias = "shipment_id", default)]
    shipment_id: String,
    #[serde(rename = "VIAJE", alias = "TRIP", alias = "trip_id", default)]
    trip_id: String,
}

impl PlanningCsvRecord {
    fn is_blank(&self) -> bool {
        self.date.trim().is_empty() && self.store_id.trim().is_empty()
    }
}

pub fn load_master_from_csv<P: AsRef<Path>>(path: P, delimiter: u8) -> PersistenceResult<MasterTable> {
    let bytes = match fs::read(path.as_ref()) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(PersistenceError::NotFound),
        Err(err) => return Err(err.into()),
    };
    let text = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut table = MasterTable::new();
    for (row_idx, record) in reader.deserialize::<MasterCsvRecord>().enumerate() {
        let record = record?;
        if record.store_id.trim().is_empty() {
            continue;
        }
        let store = match record.into_store() {
            Ok(store) => store,
            Err(err) => {
                warn!("skipping master row {}: {err}", row_idx + 1);
                continue;
            }
        };
        table
            .add_store(store)
            .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
    }
    info!("loaded {} store(s) from {}", table.len(), path.as_ref().display());
    Ok(table)
}

/// Write the master table, replacing the previous file atomically.
pub fn save_master_to_csv<P: AsRef<Path>>(
    table: &MasterTable,
    path: P,
    delimiter: u8,
    encoding: TextEncoding,
) -> PersistenceResult<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    if table.is_empty() {
        writer.serialize(MasterCsvRecord::default())?;
    }
    for store in table.stores() {
        writer.serialize(MasterCsvRecord::from(store))?;
    }
    let mut text = writer
        .into_inner()
        .map_err(|err| PersistenceError::Io(err.into_error()))?;
    if table.is_empty() {
        // Keep only the header line.
        if let Some(end) = text.iter().position(|&b| b == b'\n') {
            text.truncate(end + 1);
        }
    }
    let text = String::from_utf8(text)
        .map_err(|err| PersistenceError::InvalidData(format!("master row is not text: {err}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let bytes = encode_text(&text, encoding)?;
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    debug!("saved {} store(s) to {}", table.len(), path.display());
    Ok(())
}

/// Master table kept in a delimited text file.
pub struct CsvMasterStore {
    path: PathBuf,
    delimiter: u8,
    encoding: TextEncoding,
    edit_lock: Mutex<()>,
}

impl CsvMasterStore {
    pub fn new<P: Into<PathBuf>>(path: P, delimiter: u8, encoding: TextEncoding) -> Self {
        Self {
            path: path.into(),
            delimiter,
            encoding,
            edit_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(
            config.master_path.clone(),
            config.master_delimiter_byte(),
            config.master_encoding,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MasterStore for CsvMasterStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load_master(&self) -> PersistenceResult<MasterTable> {
        load_master_from_csv(&self.path, self.delimiter)
    }

    fn save_master(&self, table: &MasterTable) -> PersistenceResult<()> {
        let _guard = self.edit_lock.lock();
        save_master_to_csv(table, &self.path, self.delimiter, self.encoding)
    }

    fn apply_edit(&self, edit: &AdminEdit) -> ValidatorResult<StoreMaster> {
        let _guard = self.edit_lock.lock();
        let mut table = self.load_master().map_err(|err| missing_master(self, err))?;
        let edited = edit.apply_to(&mut table)?;
        save_master_to_csv(&table, &self.path, self.delimiter, self.encoding)?;
        Ok(edited)
    }
}

/// Parses uploaded planning tables, either delimited text or a workbook.
/// For text the delimiter is sniffed from the header line and bytes may be
/// UTF-8 or Windows-1252.
#[derive(Debug, Clone)]
pub struct PlanningReader {
    date_formats: Vec<String>,
}

impl Default for PlanningReader {
    fn default() -> Self {
        Self::from_config(&ValidatorConfig::default())
    }
}

impl PlanningReader {
    pub fn new(date_formats: Vec<String>) -> Self {
        Self { date_formats }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(config.planning_date_formats.clone())
    }

    /// Workbook extensions (`xlsx`, `xlsm`, `xls`, `ods`) go through
    /// [`Self::read_xlsx`]; anything else is read as delimited text.
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> PersistenceResult<Vec<PlannedDelivery>> {
        let path = path.as_ref();
        if is_workbook_path(path) {
            return self.read_xlsx(path);
        }
        let bytes = fs::read(path)?;
        self.read_bytes(bytes)
    }

    /// Uploaded bytes; zip-packaged workbooks are recognised by signature.
    pub fn read_bytes(&self, bytes: Vec<u8>) -> PersistenceResult<Vec<PlannedDelivery>> {
        if bytes.starts_with(ZIP_SIGNATURE) {
            let mut workbook: Xlsx<_> =
                Xlsx::new(Cursor::new(bytes)).map_err(calamine::Error::Xlsx)?;
            return self.read_workbook(&mut workbook);
        }
        self.read_str(&decode_text(bytes))
    }

    pub fn read_str(&self, text: &str) -> PersistenceResult<Vec<PlannedDelivery>> {
        let header = text.lines().next().unwrap_or_default();
        let delimiter = sniff_delimiter(header);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        self.read_records(&headers, reader.records())
    }

    /// First worksheet of a workbook file.
    pub fn read_xlsx<P: AsRef<Path>>(&self, path: P) -> PersistenceResult<Vec<PlannedDelivery>> {
        let mut workbook = open_workbook_auto(path.as_ref())?;
        self.read_workbook(&mut workbook)
    }

    fn read_workbook<RS, R>(&self, workbook: &mut R) -> PersistenceResult<Vec<PlannedDelivery>>
    where
        RS: Read + Seek,
        R: Reader<RS>,
        R::Error: Into<calamine::Error>,
    {
        let sheet = workbook.sheet_names().first().cloned().ok_or_else(|| {
            PersistenceError::InvalidData("planning workbook has no worksheets".into())
        })?;
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(Into::<calamine::Error>::into)?;

        let mut rows = range
            .rows()
            .map(|cells| cells.iter().map(cell_to_string).collect::<StringRecord>());
        let headers = rows.next().unwrap_or_default();
        self.read_records(&headers, rows.map(Ok))
    }

    fn read_records<I>(
        &self,
        headers: &StringRecord,
        records: I,
    ) -> PersistenceResult<Vec<PlannedDelivery>>
    where
        I: IntoIterator<Item = csv::Result<StringRecord>>,
    {
        if !headers.iter().any(|h| h == "TIENDA" || h == "store_id") {
            return Err(PersistenceError::InvalidData(
                "planning table has no store column (TIENDA)".into(),
            ));
        }

        let mut planned = Vec::new();
        for (row_idx, record) in records.into_iter().enumerate() {
            let record: PlanningCsvRecord = record?.deserialize(Some(headers))?;
            if record.is_blank() {
                continue;
            }
            let store_id = match parse_store_id(&record.store_id) {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!("planning row {} has no usable store id: {err}", row_idx + 1);
                    None
                }
            };
            planned.push(PlannedDelivery {
                store_id,
                raw_store_id: record.store_id,
                date: self.parse_date(&record.date),
                raw_date: record.date,
                name: parse_string_option(record.name),
                shipment_id: parse_string_option(record.shipment_id),
                trip_id: parse_string_option(record.trip_id),
            });
        }
        debug!("read {} planning row(s)", planned.len());
        Ok(planned)
    }

    /// First matching format wins; `None` when nothing matches.
    pub fn parse_date(&self, input: &str) -> Option<NaiveDate> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        self.date_formats.iter().find_map(|format| {
            if format.contains("%H") {
                NaiveDateTime::parse_from_str(input, format)
                    .ok()
                    .map(|dt| dt.date())
            } else {
                NaiveDate::parse_from_str(input, format).ok()
            }
        })
    }
}

pub fn read_planning<P: AsRef<Path>>(
    path: P,
    config: &ValidatorConfig,
) -> PersistenceResult<Vec<PlannedDelivery>> {
    PlanningReader::from_config(config).read_path(path)
}

fn is_workbook_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| WORKBOOK_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)))
}

/// Workbook cells as the text a CSV export would carry. Date cells become
/// ISO dates; whole floats lose their fraction.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => n.to_string(),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    }
}

/// 1900 date system. Counting from 1899-12-30 is exact for serials after
/// February 1900.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn sniff_delimiter(header: &str) -> u8 {
    PLANNING_DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| header.bytes().filter(|b| b == d).count())
        .filter(|d| header.bytes().any(|b| b == *d))
        .unwrap_or(b',')
}

/// Store ids exported from spreadsheets may carry a `.0` suffix.
fn parse_store_id(input: &str) -> PersistenceResult<i64> {
    let trimmed = input.trim();
    let integral = trimmed
        .strip_suffix(".0")
        .or_else(|| trimmed.strip_suffix(",0"))
        .unwrap_or(trimmed);
    integral
        .parse::<i64>()
        .map_err(|e| PersistenceError::InvalidData(format!("invalid store id '{input}': {e}")))
}

/// UTF-8 first, then Windows-1252 (the superset of latin-1 spreadsheet tools write).
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let bytes = err.into_bytes();
            let (decoded, _, _) = WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

fn encode_text(text: &str, encoding: TextEncoding) -> PersistenceResult<Vec<u8>> {
    match encoding {
        TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        TextEncoding::Latin1 => {
            let (encoded, _, had_unmappable_chars) = WINDOWS_1252.encode(text);
            if had_unmappable_chars {
                let offending: String = text
                    .chars()
                    .filter(|c| {
                        let mut buf = [0u8; 4];
                        WINDOWS_1252.encode(c.encode_utf8(&mut buf)).2
                    })
                    .collect();
                return Err(PersistenceError::InvalidData(format!(
                    "master table has characters with no latin-1 form: {offending:?}; \
                     switch master_encoding to utf8"
                )));
            }
            Ok(encoded.into_owned())
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn parse_string_option(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_semicolon_header() {
        assert_eq!(sniff_delimiter("FECHA;TIENDA;NOMBRE_TIENDA"), b';');
        assert_eq!(sniff_delimiter("FECHA,TIENDA"), b',');
        assert_eq!(sniff_delimiter("TIENDA"), b',');
    }

    #[test]
    fn store_id_accepts_spreadsheet_floats() {
        assert_eq!(parse_store_id(" 101.0 ").unwrap(), 101);
        assert!(parse_store_id("abc").is_err());
    }

    #[test]
    fn latin1_round_trip() {
        let bytes = encode_text("Zona Peñalolén", TextEncoding::Latin1).unwrap();
        assert_eq!(decode_text(bytes), "Zona Peñalolén");
    }

    #[test]
    fn windows_1252_punctuation_decodes() {
        assert_eq!(decode_text(b"Centro \x96 Norte \x80".to_vec()), "Centro – Norte €");
    }

    #[test]
    fn latin1_encode_rejects_unmappable_text() {
        let err = encode_text("Tienda 東京", TextEncoding::Latin1).unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidData(msg) if msg.contains('東')));
    }

    #[test]
    fn excel_serials_map_to_calendar_dates() {
        assert_eq!(excel_serial_to_date(45660.0), NaiveDate::from_ymd_opt(2025, 1, 3));
        assert_eq!(cell_to_string(&Data::Float(101.0)), "101");
    }
}
