use time::{Date, Month};

use crate::Error;

/// A residential complex as listed in the reference roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complex {
    pub code: String,
    pub name: String,
    /// Approval date exactly as it appears in the roster.
    pub approval_date: String,
}

impl Complex {
    pub fn new(code: impl Into<String>, name: impl Into<String>, approval_date: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            approval_date: approval_date.into(),
        }
    }

    pub fn approval(&self) -> Result<Date, Error> {
        parse_approval_date(&self.approval_date)
    }
}

/// Parse a roster approval date.
///
/// Rosters carry the date as `YYYYMMDD`, either as text or as a number; a
/// numeric column with blanks is rendered as a float (`20200115.0`), so an
/// all-zero fractional part is accepted.
pub fn parse_approval_date(raw: &str) -> Result<Date, Error> {
    let invalid = || Error::InvalidDate(raw.to_string());

    let trimmed = raw.trim();
    let digits = match trimmed.split_once('.') {
        Some((int, frac)) if frac.chars().all(|c| c == '0') => int,
        Some(_) => return Err(invalid()),
        None => trimmed,
    };

    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = digits[..4].parse().map_err(|_| invalid())?;
    let month: u8 = digits[4..6].parse().map_err(|_| invalid())?;
    let day: u8 = digits[6..].parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;

    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

/// Categorical attributes of a complex used by the efficiency model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexProfile {
    pub code: String,
    pub name: String,
    pub classification: String,
    pub approval_date: String,
    pub heating_method: String,
    pub building_structure: String,
    pub water_supply: String,
}
