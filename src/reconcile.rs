use crate::delivery_spec::DeliverySpec;
use crate::error::{ValidatorError, ValidatorResult};
use crate::matching::{MatchVerdict, applicable_days, match_store};
use crate::model::{MasterTable, PlannedDelivery};
use crate::weekday::{WeekdayCode, day_code_of};
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One output row, either for a planned record or for a missing master store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub verdict: MatchVerdict,
    /// `None` for planned rows whose store cell was not a number.
    pub store_id: Option<i64>,
    pub store_name: String,
    pub zone: Option<String>,
    pub delivery_spec: Option<String>,
    pub date: Option<NaiveDate>,
    pub shipment_id: Option<String>,
    pub trip_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub planned_count: usize,
    pub matched_count: usize,
    pub no_match_count: usize,
    pub not_in_master_count: usize,
    pub missing_count: usize,
    pub date_anomaly_count: usize,
}

impl ReconciliationSummary {
    pub fn to_cli_summary(&self) -> String {
        let mut parts = vec![
            format!("planned={}", self.planned_count),
            format!("ok={}", self.matched_count),
            format!("no_match={}", self.no_match_count),
        ];
        if self.not_in_master_count > 0 {
            parts.push(format!("not_in_master={}", self.not_in_master_count));
        }
        if self.missing_count > 0 {
            parts.push(format!("missing={}", self.missing_count));
        }
        if self.date_anomaly_count > 0 {
            parts.push(format!("date_anomalies={}", self.date_anomaly_count));
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub reference_date: Option<NaiveDate>,
    pub reference_day: WeekdayCode,
    pub applicable_days: DeliverySpec,
    pub matched: Vec<ReportRow>,
    pub missing: Vec<ReportRow>,
    /// Indices of planned rows whose own date differs from the reference
    /// date or could not be parsed. These rows are still validated against
    /// the batch reference day.
    #[serde(default)]
    pub date_anomalies: Vec<usize>,
}

impl ReconciliationReport {
    /// Friday and Saturday runs accept a Monday allowance.
    pub fn weekend_mode(&self) -> bool {
        self.reference_day.is_weekend_run()
    }

    /// Matched rows followed by missing rows.
    pub fn rows(&self) -> impl Iterator<Item = &ReportRow> {
        self.matched.iter().chain(self.missing.iter())
    }

    /// Counts are taken from each row's verdict, so a `NotPlanned` row is
    /// counted as missing whichever partition holds it.
    pub fn summary(&self) -> ReconciliationSummary {
        let mut summary = ReconciliationSummary {
            planned_count: self.matched.len(),
            date_anomaly_count: self.date_anomalies.len(),
            ..Default::default()
        };
        for row in self.rows() {
            match row.verdict {
                MatchVerdict::Match { .. } | MatchVerdict::MatchCarryover { .. } => {
                    summary.matched_count += 1
                }
                MatchVerdict::NotInMaster => summary.not_in_master_count += 1,
                MatchVerdict::NoMatch => summary.no_match_count += 1,
                MatchVerdict::NotPlanned => summary.missing_count += 1,
            }
        }
        summary
    }
}

/// Validate a parsed planning table against the master table.
///
/// The first planned row's date is the reference date for the whole batch.
pub fn validate_planning(
    master: &MasterTable,
    planned: &[PlannedDelivery],
) -> ValidatorResult<ReconciliationReport> {
    let first = planned.first().ok_or(ValidatorError::EmptyPlanning)?;
    let ref_day = day_code_of(first.date, &first.raw_date)?;

    let mut report = reconcile(master, planned, ref_day);
    report.reference_date = first.date;
    report.date_anomalies = planned
        .iter()
        .enumerate()
        .filter(|(_, row)| row.date.is_none() || row.date != first.date)
        .map(|(idx, _)| idx)
        .collect();

    if !report.date_anomalies.is_empty() {
        warn!(
            "{} planning row(s) do not share the reference date {}; validating them against day {}",
            report.date_anomalies.len(),
            first.raw_date,
            ref_day
        );
    }
    info!(
        "validated planning for day {} ({}): {}",
        ref_day,
        first.raw_date,
        report.summary().to_cli_summary()
    );
    Ok(report)
}

/// Match every planned record and collect expected master stores that were
/// not planned. Output order follows input order; matched rows come first.
pub fn reconcile(
    master: &MasterTable,
    planned: &[PlannedDelivery],
    ref_day: WeekdayCode,
) -> ReconciliationReport {
    let matched: Vec<ReportRow> = planned
        .iter()
        .map(|record| planned_row(master, record, ref_day))
        .collect();

    let applicable = applicable_days(ref_day);
    let planned_ids: HashSet<i64> = planned.iter().filter_map(|p| p.store_id).collect();
    let missing = master
        .iter_with_specs()
        .filter(|(store, spec)| !planned_ids.contains(&store.store_id) && spec.intersects(&applicable))
        .map(|(store, _)| ReportRow {
            verdict: MatchVerdict::NotPlanned,
            store_id: Some(store.store_id),
            store_name: store.name.clone(),
            zone: Some(store.zone.clone()),
            delivery_spec: Some(store.delivery_spec.clone()),
            date: None,
            shipment_id: None,
            trip_id: None,
        })
        .collect();

    ReconciliationReport {
        reference_date: None,
        reference_day: ref_day,
        applicable_days: applicable,
        matched,
        missing,
        date_anomalies: Vec::new(),
    }
}

fn planned_row(master: &MasterTable, record: &PlannedDelivery, ref_day: WeekdayCode) -> ReportRow {
    let store = record.store_id.and_then(|id| master.get(id));
    let verdict = match_store(ref_day, record.store_id.and_then(|id| master.spec_of(id)));
    let store_name = record
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| store.map(|s| s.name.clone()))
        .unwrap_or_default();

    ReportRow {
        verdict,
        store_id: record.store_id,
        store_name,
        zone: store.map(|s| s.zone.clone()),
        delivery_spec: store.map(|s| s.delivery_spec.clone()),
        date: record.date,
        shipment_id: record.shipment_id.clone(),
        trip_id: record.trip_id.clone(),
    }
}
