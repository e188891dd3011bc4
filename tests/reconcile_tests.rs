use chrono::NaiveDate;
use planning_validator::{
    MasterTable, MatchVerdict, PlannedDelivery, StoreMaster, ValidatorError, WeekdayCode,
    reconcile, validate_planning,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// 2025-01-03 is a Friday.
fn friday() -> NaiveDate {
    d(2025, 1, 3)
}

fn sample_master() -> MasterTable {
    MasterTable::from_stores([
        StoreMaster::new(101, "Centro", "Norte", "L"),
        StoreMaster::new(102, "Puerto", "Sur", "V,L"),
        StoreMaster::new(103, "Alameda", "Norte", "M"),
        StoreMaster::new(104, "Mercado", "Este", "S"),
        StoreMaster::new(105, "Parque", "Oeste", ""),
    ])
    .unwrap()
}

fn planned(store_id: i64, date: NaiveDate) -> PlannedDelivery {
    PlannedDelivery::new(store_id, date)
}

#[test]
fn unplanned_monday_store_is_missing_on_friday() {
    let master = sample_master();
    let rows = vec![planned(102, friday())];
    let report = reconcile(&master, &rows, WeekdayCode::Fri);

    let missing_ids: Vec<i64> = report.missing.iter().filter_map(|r| r.store_id).collect();
    assert_eq!(missing_ids, vec![101, 104]);
    assert!(report.missing.iter().all(|r| r.verdict == MatchVerdict::NotPlanned));
    assert!(report.missing.iter().all(|r| r.shipment_id.is_none() && r.trip_id.is_none()));
    assert_eq!(report.missing[0].store_name, "Centro");
    assert_eq!(report.missing[0].zone.as_deref(), Some("Norte"));
}

#[test]
fn planned_store_is_not_double_counted() {
    let master = sample_master();
    let rows = vec![planned(101, friday())];
    let report = reconcile(&master, &rows, WeekdayCode::Fri);

    assert_eq!(report.matched.len(), 1);
    assert_eq!(
        report.matched[0].verdict,
        MatchVerdict::Match { day: WeekdayCode::Mon }
    );
    assert!(report.missing.iter().all(|r| r.store_id != Some(101)));
}

#[test]
fn unknown_planned_store_is_kept_with_not_in_master() {
    let master = sample_master();
    let mut row = planned(999, friday());
    row.name = Some("Tienda Nueva".into());
    row.shipment_id = Some("E-1".into());
    let report = reconcile(&master, &[row], WeekdayCode::Fri);

    let out = &report.matched[0];
    assert_eq!(out.verdict, MatchVerdict::NotInMaster);
    assert_eq!(out.store_name, "Tienda Nueva");
    assert_eq!(out.zone, None);
    assert_eq!(out.delivery_spec, None);
    assert_eq!(out.shipment_id.as_deref(), Some("E-1"));
}

#[test]
fn matched_rows_keep_input_order_before_missing() {
    let master = sample_master();
    let rows = vec![planned(103, friday()), planned(999, friday()), planned(102, friday())];
    let report = reconcile(&master, &rows, WeekdayCode::Fri);

    let order: Vec<i64> = report.rows().filter_map(|r| r.store_id).collect();
    assert_eq!(order, vec![103, 999, 102, 101, 104]);
    assert_eq!(report.matched[0].verdict, MatchVerdict::NoMatch);
    assert_eq!(
        report.matched[2].verdict,
        MatchVerdict::MatchCarryover { day: WeekdayCode::Fri }
    );
}

#[test]
fn blank_spec_store_is_never_expected() {
    let master = sample_master();
    for day in WeekdayCode::ALL {
        let report = reconcile(&master, &[], day);
        assert!(report.missing.iter().all(|r| r.store_id != Some(105)));
    }
}

#[test]
fn saturday_run_expects_monday_and_saturday_stores() {
    let master = sample_master();
    let report = reconcile(&master, &[], WeekdayCode::Sat);
    let missing_ids: Vec<i64> = report.missing.iter().filter_map(|r| r.store_id).collect();
    assert_eq!(missing_ids, vec![101, 102, 104]);
}

#[test]
fn reconciliation_is_idempotent() {
    let master = sample_master();
    let rows = vec![planned(104, friday()), planned(103, friday())];
    let first = validate_planning(&master, &rows).unwrap();
    let second = validate_planning(&master, &rows).unwrap();
    assert_eq!(first, second);
}

#[test]
fn validate_uses_first_row_date_and_flags_anomalies() {
    let master = sample_master();
    let mut bad = planned(103, friday());
    bad.date = None;
    bad.raw_date = "garbage".into();
    let rows = vec![
        planned(101, friday()),
        planned(102, d(2025, 1, 6)),
        bad,
    ];
    let report = validate_planning(&master, &rows).unwrap();

    assert_eq!(report.reference_date, Some(friday()));
    assert_eq!(report.reference_day, WeekdayCode::Fri);
    assert!(report.weekend_mode());
    assert_eq!(report.date_anomalies, vec![1, 2]);
    // Row 1 is dated Monday but still checked against the Friday run.
    assert_eq!(
        report.matched[1].verdict,
        MatchVerdict::MatchCarryover { day: WeekdayCode::Fri }
    );
    assert_eq!(report.matched[2].verdict, MatchVerdict::NoMatch);
}

#[test]
fn validate_rejects_empty_and_undated_batches() {
    let master = sample_master();
    assert!(matches!(
        validate_planning(&master, &[]),
        Err(ValidatorError::EmptyPlanning)
    ));

    let mut row = planned(101, friday());
    row.date = None;
    row.raw_date = "not a date".into();
    assert!(matches!(
        validate_planning(&master, &[row]),
        Err(ValidatorError::InvalidDate { .. })
    ));
}

#[test]
fn summary_counts_each_outcome() {
    let master = sample_master();
    let rows = vec![
        planned(101, friday()),
        planned(103, friday()),
        planned(999, friday()),
    ];
    let summary = validate_planning(&master, &rows).unwrap().summary();
    assert_eq!(summary.planned_count, 3);
    assert_eq!(summary.matched_count, 1);
    assert_eq!(summary.no_match_count, 1);
    assert_eq!(summary.not_in_master_count, 1);
    assert_eq!(summary.missing_count, 2);
    assert_eq!(
        summary.to_cli_summary(),
        "planned=3, ok=1, no_match=1, not_in_master=1, missing=2"
    );
}

#[test]
fn row_without_store_id_is_reported_and_sets_reference_date() {
    let master = sample_master();
    let mut unnamed = planned(0, friday());
    unnamed.store_id = None;
    unnamed.raw_store_id = "s/n".into();
    let rows = vec![unnamed, planned(102, d(2025, 1, 4))];
    let report = validate_planning(&master, &rows).unwrap();

    assert_eq!(report.reference_date, Some(friday()));
    assert_eq!(report.reference_day, WeekdayCode::Fri);
    assert_eq!(report.matched.len(), 2);
    assert_eq!(report.matched[0].store_id, None);
    assert_eq!(report.matched[0].verdict, MatchVerdict::NotInMaster);
    assert_eq!(report.matched[0].verdict.collapsed_label(), "No corresponde");
    assert_eq!(report.date_anomalies, vec![1]);
}

#[test]
fn summary_counts_missing_rows_by_verdict() {
    let master = sample_master();
    let report = validate_planning(&master, &[planned(102, friday())]).unwrap();
    let summary = report.summary();

    assert_eq!(summary.planned_count, 1);
    assert_eq!(summary.missing_count, report.missing.len());
    assert_eq!(
        summary.matched_count + summary.no_match_count + summary.not_in_master_count,
        summary.planned_count
    );
}
