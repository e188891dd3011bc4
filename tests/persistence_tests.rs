use chrono::NaiveDate;
use planning_validator::{
    CsvMasterStore, MasterStore, MasterTable, MatchVerdict, PersistenceError, PlanningReader,
    StoreMaster, TextEncoding, ValidatorError, WeekdayCode, admin, load_master_from_csv,
    load_required_master, save_master_to_csv, validate_planning,
};
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use tempfile::{NamedTempFile, tempdir};

const MASTER_CSV: &str = "CD;Pto Op;Tienda;Formato;Zona Geografica;DIA DE ENTREGA\n\
Malvinas;101;Centro;Express;Norte;LXV\n\
Malvinas;102;Puerto;Express;Sur;M, J\n\
Malvinas;103;Alameda;Super;Norte;\n";

fn write_master(text: &str) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), text).unwrap();
    file
}

#[test]
fn loads_semicolon_master_with_spreadsheet_headers() {
    let file = write_master(MASTER_CSV);
    let table = load_master_from_csv(file.path(), b';').unwrap();

    assert_eq!(table.len(), 3);
    let store = table.get(102).unwrap();
    assert_eq!(store.name, "Puerto");
    assert_eq!(store.zone, "Sur");
    assert_eq!(store.delivery_spec, "M, J");
    assert_eq!(store.distribution_center.as_deref(), Some("Malvinas"));
    assert!(table.spec_of(103).unwrap().is_empty());
}

#[test]
fn loads_latin1_master() {
    let mut bytes = b"Pto Op;Tienda;Zona Geografica;DIA DE ENTREGA\n7;Pe".to_vec();
    bytes.push(0xF1); // n with tilde in latin-1
    bytes.extend_from_slice(b"alol\n;;;\n8;Sur;Sur;V\n");
    let file = NamedTempFile::new().unwrap();
    fs::write(file.path(), bytes).unwrap();

    let table = load_master_from_csv(file.path(), b';').unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(7).unwrap().name, "Peñalol");
    assert_eq!(table.get(7).unwrap().distribution_center, None);
}

#[test]
fn duplicate_ids_in_master_file_are_rejected() {
    let file = write_master("Pto Op;Tienda;Zona Geografica;DIA DE ENTREGA\n1;A;Z;L\n1;B;Z;M\n");
    let err = load_master_from_csv(file.path(), b';').unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)));
}

#[test]
fn save_preserves_columns_and_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("maestro.csv");
    let mut store = StoreMaster::new(5, "Ñuñoa", "Oriente", "L,X");
    store.distribution_center = Some("Malvinas".into());
    store.format = Some("Express".into());
    let table = MasterTable::from_stores([store]).unwrap();

    save_master_to_csv(&table, &path, b';', TextEncoding::Latin1).unwrap();
    let raw = fs::read(&path).unwrap();
    assert!(raw.starts_with(b"CD;Pto Op;Tienda;Formato;Zona Geografica;DIA DE ENTREGA"));
    assert!(raw.contains(&0xD1)); // latin-1 encoded

    let loaded = load_master_from_csv(&path, b';').unwrap();
    assert_eq!(loaded.stores(), table.stores());
}

#[test]
fn missing_master_file_is_fatal() {
    let dir = tempdir().unwrap();
    let store = CsvMasterStore::new(dir.path().join("absent.csv"), b';', TextEncoding::Utf8);
    assert!(matches!(store.load_master(), Err(PersistenceError::NotFound)));
    assert!(matches!(
        load_required_master(&store),
        Err(ValidatorError::MissingMasterTable(_))
    ));
}

#[test]
fn planning_reader_sniffs_delimiter_and_aliases() {
    let reader = PlanningReader::default();
    let text = "FECHA,TIENDA,NOMBRE_TIENDA,ENVIO,VIAJE,EXTRA\n\
2025-01-03,101.0,Centro,E1,T1,x\n\
,,,,,\n\
03/01/2025,102,,E2,,y\n";
    let planned = reader.read_str(text).unwrap();

    assert_eq!(planned.len(), 2);
    assert_eq!(planned[0].store_id, Some(101));
    assert_eq!(planned[0].date, NaiveDate::from_ymd_opt(2025, 1, 3));
    assert_eq!(planned[0].shipment_id.as_deref(), Some("E1"));
    assert_eq!(planned[0].trip_id.as_deref(), Some("T1"));
    assert_eq!(planned[1].date, NaiveDate::from_ymd_opt(2025, 1, 3));
    assert_eq!(planned[1].name, None);
    assert_eq!(planned[1].trip_id, None);
}

#[test]
fn planning_reader_keeps_rows_with_bad_dates() {
    let reader = PlanningReader::default();
    let text = "TIENDA;FECHA\n101;2025-01-03 08:30:00\n102;sometime\nabc;2025-01-03\n";
    let planned = reader.read_str(text).unwrap();

    assert_eq!(planned.len(), 3);
    assert_eq!(planned[0].date, NaiveDate::from_ymd_opt(2025, 1, 3));
    assert_eq!(planned[1].date, None);
    assert_eq!(planned[1].raw_date, "sometime");
    assert_eq!(planned[2].store_id, None);
    assert_eq!(planned[2].raw_store_id, "abc");
}

#[test]
fn planning_without_store_column_is_invalid() {
    let err = PlanningReader::default()
        .read_str("FECHA;NOMBRE\n2025-01-03;x\n")
        .unwrap_err();
    assert!(matches!(err, PersistenceError::InvalidData(_)));
}

#[test]
fn first_row_without_store_id_still_sets_reference_day() {
    let master = MasterTable::from_stores([StoreMaster::new(101, "Centro", "Norte", "S")]).unwrap();
    let text = "FECHA;TIENDA;NOMBRE_TIENDA\n2025-01-03;;Sin codigo\n2025-01-04;101;Centro\n";
    let planned = PlanningReader::default().read_str(text).unwrap();

    assert_eq!(planned.len(), 2);
    assert_eq!(planned[0].store_id, None);
    assert_eq!(planned[0].name.as_deref(), Some("Sin codigo"));

    let report = validate_planning(&master, &planned).unwrap();
    assert_eq!(report.reference_day, WeekdayCode::Fri);
    assert_eq!(report.matched[0].verdict, MatchVerdict::NotInMaster);
    assert_eq!(report.matched[0].store_name, "Sin codigo");
    assert_eq!(
        report.matched[1].verdict,
        MatchVerdict::Match { day: WeekdayCode::Sat }
    );
}

#[test]
fn planning_bytes_fall_back_to_windows_1252() {
    let mut bytes = b"FECHA;TIENDA;NOMBRE_TIENDA\n2025-01-03;101;Centro ".to_vec();
    bytes.push(0x96); // en dash in windows-1252
    bytes.extend_from_slice(b" Norte\n");
    let planned = PlanningReader::default().read_bytes(bytes).unwrap();
    assert_eq!(planned[0].name.as_deref(), Some("Centro \u{2013} Norte"));
}

#[test]
fn euro_sign_survives_edit_of_another_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("maestro.csv");
    fs::write(
        &path,
        "Pto Op;Tienda;Zona Geografica;DIA DE ENTREGA\n101;Tienda \u{20ac} Norte;Norte;L\n102;Puerto;Sur;V\n",
    )
    .unwrap();
    let store = CsvMasterStore::new(&path, b';', TextEncoding::Latin1);

    admin::update_delivery_spec(&store, true, 102, "VS").unwrap();

    let raw = fs::read(&path).unwrap();
    assert!(raw.contains(&0x80));
    let reloaded = store.load_master().unwrap();
    assert_eq!(reloaded.get(101).unwrap().name, "Tienda \u{20ac} Norte");
    assert_eq!(reloaded.get(102).unwrap().delivery_spec, "VS");
}

#[test]
fn unencodable_master_is_not_written_lossily() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("maestro.csv");
    let original = "Pto Op;Tienda;Zona Geografica;DIA DE ENTREGA\n101;Tokio \u{6771}\u{4eac};Norte;L\n102;Puerto;Sur;V\n";
    fs::write(&path, original).unwrap();
    let store = CsvMasterStore::new(&path, b';', TextEncoding::Latin1);

    let err = admin::update_delivery_spec(&store, true, 102, "VS").unwrap_err();
    assert!(matches!(
        err,
        ValidatorError::Persistence(PersistenceError::InvalidData(_))
    ));
    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

fn write_planning_workbook(path: &std::path::Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in ["FECHA", "TIENDA", "NOMBRE_TIENDA"].iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    sheet.write_string(1, 0, "2025-01-03").unwrap();
    sheet.write_number(1, 1, 101.0).unwrap();
    sheet.write_string(1, 2, "Centro").unwrap();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    sheet.write_number_with_format(2, 0, 45660.0, &date_format).unwrap();
    sheet.write_number(2, 1, 102.0).unwrap();
    workbook.save(path).unwrap();
}

#[test]
fn planning_reader_accepts_xlsx_by_extension_and_signature() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("planning.xlsx");
    write_planning_workbook(&path);
    let reader = PlanningReader::default();

    let from_path = reader.read_path(&path).unwrap();
    assert_eq!(from_path.len(), 2);
    assert_eq!(from_path[0].store_id, Some(101));
    assert_eq!(from_path[0].name.as_deref(), Some("Centro"));
    assert_eq!(from_path[1].store_id, Some(102));
    assert!(from_path.iter().all(|p| p.date == NaiveDate::from_ymd_opt(2025, 1, 3)));

    let from_bytes = reader.read_bytes(fs::read(&path).unwrap()).unwrap();
    assert_eq!(from_bytes, from_path);
}
