use std::{fmt, str::FromStr};

use time::Date;

use crate::Error;

/// A calendar month as requested from the energy usage API.
///
/// The canonical textual form is the 6-digit `YYYYMM` token used both as the
/// API `reqDate` parameter and as the `requestMonth` column of energy files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestMonth {
    year: i32,
    month: u8,
}

impl RequestMonth {
    pub fn new(year: i32, month: u8) -> Result<Self, Error> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(Error::InvalidMonth(format!("{year:04}{month:02}")));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// The following month; December rolls into January of the next year.
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn pred(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Every month from `start` to `end` inclusive, ascending.
    ///
    /// Empty when `start > end`.
    pub fn range_inclusive(start: Self, end: Self) -> Vec<Self> {
        let mut months = Vec::new();
        let mut current = start;
        while current <= end {
            months.push(current);
            current = current.succ();
        }
        months
    }

    /// Parse a month as it may appear in a persisted file.
    ///
    /// Besides the canonical `YYYYMM` token this accepts surrounding whitespace
    /// and a float rendering such as `202001.0`, which spreadsheet tools emit
    /// for numeric columns that contain blanks.
    pub fn parse_lenient(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        let digits = match trimmed.split_once('.') {
            Some((int, frac)) if frac.chars().all(|c| c == '0') => int,
            Some(_) => return Err(Error::InvalidMonth(raw.to_string())),
            None => trimmed,
        };
        digits.parse()
    }
}

impl fmt::Display for RequestMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for RequestMonth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidMonth(s.to_string()));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|_| Error::InvalidMonth(s.to_string()))?;
        let month: u8 = s[4..]
            .parse()
            .map_err(|_| Error::InvalidMonth(s.to_string()))?;
        Self::new(year, month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn m(s: &str) -> RequestMonth {
        s.parse().unwrap()
    }

    #[test]
    fn range_rolls_over_year_boundary() {
        let months = RequestMonth::range_inclusive(m("202411"), m("202502"));
        let rendered: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["202411", "202412", "202501", "202502"]);
    }

    #[test]
    fn range_is_empty_when_start_after_end() {
        assert!(RequestMonth::range_inclusive(m("202503"), m("202502")).is_empty());
    }

    #[test]
    fn range_length_matches_month_distance() {
        let months = RequestMonth::range_inclusive(m("201907"), m("202406"));
        assert_eq!(months.len(), 60);
        assert!(months.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn pred_of_january_is_previous_december() {
        assert_eq!(m("202501").pred(), m("202412"));
        assert_eq!(m("202412").succ(), m("202501"));
    }

    #[test]
    fn from_date_takes_year_and_month() {
        assert_eq!(RequestMonth::from_date(date!(2020 - 01 - 15)), m("202001"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!("20201".parse::<RequestMonth>().is_err());
        assert!("202013".parse::<RequestMonth>().is_err());
        assert!("2020a1".parse::<RequestMonth>().is_err());
        assert!("202000".parse::<RequestMonth>().is_err());
    }

    #[test]
    fn lenient_parse_accepts_float_rendering() {
        assert_eq!(RequestMonth::parse_lenient(" 202003.0 ").unwrap(), m("202003"));
        assert_eq!(RequestMonth::parse_lenient("202003").unwrap(), m("202003"));
        assert!(RequestMonth::parse_lenient("202003.5").is_err());
    }
}
