use crate::weekday::WeekdayCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Set of weekdays on which a store accepts deliveries.
///
/// Parsing is lenient: input is uppercased, whitespace and commas are
/// stripped, and any remaining character that is not a weekday letter is
/// ignored. A blank input (or a spreadsheet `NaN`) yields an empty spec that
/// matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySpec {
    days: BTreeSet<WeekdayCode>,
}

impl DeliverySpec {
    pub fn parse(raw: &str) -> Self {
        let days = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .filter_map(WeekdayCode::from_letter)
            .collect();
        Self { days }
    }

    pub fn from_days<I>(days: I) -> Self
    where
        I: IntoIterator<Item = WeekdayCode>,
    {
        Self {
            days: days.into_iter().collect(),
        }
    }

    pub fn contains(&self, day: WeekdayCode) -> bool {
        self.days.contains(&day)
    }

    pub fn intersects(&self, other: &DeliverySpec) -> bool {
        self.days.iter().any(|day| other.contains(*day))
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = WeekdayCode> + '_ {
        self.days.iter().copied()
    }
}

impl fmt::Display for DeliverySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for day in &self.days {
            write!(f, "{}", day.letter())?;
        }
        Ok(())
    }
}
