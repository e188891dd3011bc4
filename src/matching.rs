use crate::delivery_spec::DeliverySpec;
use crate::weekday::WeekdayCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome for one store in one validation run.
///
/// `Match` names the allowed day that satisfied the run; `MatchCarryover`
/// means the store allows both the reference day and the following Monday.
/// `NotPlanned` is only produced by reconciliation for master stores that
/// were expected but absent from the planning table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchVerdict {
    NotInMaster,
    Match { day: WeekdayCode },
    MatchCarryover { day: WeekdayCode },
    NoMatch,
    NotPlanned,
}

impl MatchVerdict {
    pub fn is_match(&self) -> bool {
        matches!(
            self,
            MatchVerdict::Match { .. } | MatchVerdict::MatchCarryover { .. }
        )
    }

    /// Detailed label naming which day matched.
    pub fn label(&self) -> String {
        match self {
            MatchVerdict::NotInMaster => "No está en maestro".to_string(),
            MatchVerdict::Match { day } => format!("Corresponde ({})", day.spanish_name()),
            MatchVerdict::MatchCarryover { day } => format!(
                "Corresponde ({} y {})",
                day.spanish_name(),
                WeekdayCode::Mon.spanish_name()
            ),
            MatchVerdict::NoMatch => "No corresponde".to_string(),
            MatchVerdict::NotPlanned => "Falta en planning".to_string(),
        }
    }

    /// Coarse label: every match collapses to "Corresponde" and a store
    /// unknown to the master collapses to "No corresponde".
    pub fn collapsed_label(&self) -> &'static str {
        match self {
            MatchVerdict::Match { .. } | MatchVerdict::MatchCarryover { .. } => "Corresponde",
            MatchVerdict::NotInMaster | MatchVerdict::NoMatch => "No corresponde",
            MatchVerdict::NotPlanned => "Falta en planning",
        }
    }
}

impl fmt::Display for MatchVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Decide the verdict for one planned store. `spec` is `None` when the store
/// has no row in the master table.
///
/// Friday and Saturday runs apply the weekend carry-over rule: a Monday
/// allowance satisfies the run, and on Friday a Saturday allowance does too.
/// Rules are checked in order and the first one that applies wins.
pub fn match_store(ref_day: WeekdayCode, spec: Option<&DeliverySpec>) -> MatchVerdict {
    let Some(spec) = spec else {
        return MatchVerdict::NotInMaster;
    };

    if ref_day.is_weekend_run() {
        let has_ref = spec.contains(ref_day);
        let has_monday = spec.contains(WeekdayCode::Mon);

        if has_ref && has_monday {
            return MatchVerdict::MatchCarryover { day: ref_day };
        }
        if has_ref {
            return MatchVerdict::Match { day: ref_day };
        }
        if has_monday {
            return MatchVerdict::Match {
                day: WeekdayCode::Mon,
            };
        }
        // Saturday may cover a Friday run; there is no look-ahead from Saturday.
        if ref_day == WeekdayCode::Fri && spec.contains(WeekdayCode::Sat) {
            return MatchVerdict::Match {
                day: WeekdayCode::Sat,
            };
        }
        return MatchVerdict::NoMatch;
    }

    if spec.contains(ref_day) {
        MatchVerdict::Match { day: ref_day }
    } else {
        MatchVerdict::NoMatch
    }
}

/// Days whose allowance makes a master store expected in a run on `ref_day`.
pub fn applicable_days(ref_day: WeekdayCode) -> DeliverySpec {
    let mut days = vec![ref_day];
    if ref_day.is_weekend_run() {
        days.push(WeekdayCode::Mon);
    }
    if ref_day == WeekdayCode::Fri {
        days.push(WeekdayCode::Sat);
    }
    DeliverySpec::from_days(days)
}
