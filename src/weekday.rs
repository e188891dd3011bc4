use crate::error::{ValidatorError, ValidatorResult};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Weekday as used by delivery schedules. Letters are positional by ISO
/// weekday index (Monday = 0), not mnemonic: `X` is Wednesday and `M` is
/// Tuesday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeekdayCode {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl WeekdayCode {
    pub const ALL: [WeekdayCode; 7] = [
        WeekdayCode::Mon,
        WeekdayCode::Tue,
        WeekdayCode::Wed,
        WeekdayCode::Thu,
        WeekdayCode::Fri,
        WeekdayCode::Sat,
        WeekdayCode::Sun,
    ];

    const LETTERS: [char; 7] = ['L', 'M', 'X', 'J', 'V', 'S', 'D'];

    /// Weekday code of a calendar date. Total over all valid dates.
    pub fn of(date: NaiveDate) -> Self {
        Self::from(date.weekday())
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn letter(self) -> char {
        Self::LETTERS[self.index()]
    }

    /// Case-insensitive lookup of a single-letter code.
    pub fn from_letter(letter: char) -> Option<Self> {
        let upper = letter.to_ascii_uppercase();
        Self::LETTERS
            .iter()
            .position(|&l| l == upper)
            .map(|idx| Self::ALL[idx])
    }

    pub fn spanish_name(self) -> &'static str {
        match self {
            WeekdayCode::Mon => "Lunes",
            WeekdayCode::Tue => "Martes",
            WeekdayCode::Wed => "Miércoles",
            WeekdayCode::Thu => "Jueves",
            WeekdayCode::Fri => "Viernes",
            WeekdayCode::Sat => "Sábado",
            WeekdayCode::Sun => "Domingo",
        }
    }

    pub fn is_weekend_run(self) -> bool {
        matches!(self, WeekdayCode::Fri | WeekdayCode::Sat)
    }
}

/// Weekday code of an upstream-parsed date; `None` means the date could not
/// be parsed and no reference day can be derived.
pub fn day_code_of(date: Option<NaiveDate>, raw: &str) -> ValidatorResult<WeekdayCode> {
    date.map(WeekdayCode::of)
        .ok_or_else(|| ValidatorError::InvalidDate {
            value: raw.to_string(),
        })
}

impl From<Weekday> for WeekdayCode {
    fn from(value: Weekday) -> Self {
        Self::ALL[value.num_days_from_monday() as usize]
    }
}

impl From<WeekdayCode> for Weekday {
    fn from(value: WeekdayCode) -> Self {
        match value {
            WeekdayCode::Mon => Weekday::Mon,
            WeekdayCode::Tue => Weekday::Tue,
            WeekdayCode::Wed => Weekday::Wed,
            WeekdayCode::Thu => Weekday::Thu,
            WeekdayCode::Fri => Weekday::Fri,
            WeekdayCode::Sat => Weekday::Sat,
            WeekdayCode::Sun => Weekday::Sun,
        }
    }
}

impl fmt::Display for WeekdayCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl Serialize for WeekdayCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.letter())
    }
}

impl<'de> Deserialize<'de> for WeekdayCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let mut chars = raw.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Self::from_letter(letter).ok_or_else(|| {
                serde::de::Error::custom(format!("unknown weekday code '{raw}'"))
            }),
            _ => Err(serde::de::Error::custom(format!(
                "weekday code must be a single letter, got '{raw}'"
            ))),
        }
    }
}
