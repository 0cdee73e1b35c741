//! The configured processing month, written `MMM'YY` (e.g. `Aug'25`).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Month + two-digit year used to disambiguate day/month order in dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpectedMonth {
    month: u32,
    year: i32,
}

impl ExpectedMonth {
    pub fn new(month: u32, year: i32) -> Result<Self, ConfigurationError> {
        if !(1..=12).contains(&month) || !(2000..=2099).contains(&year) {
            return Err(ConfigurationError::ExpectedMonth(format!("{month}/{year}")));
        }
        Ok(Self { month, year })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            year: date.year(),
        }
    }

    /// Month number, 1-12.
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Four-digit year.
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn abbreviation(&self) -> &'static str {
        MONTHS[(self.month - 1) as usize]
    }
}

impl fmt::Display for ExpectedMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'{:02}", self.abbreviation(), self.year % 100)
    }
}

impl FromStr for ExpectedMonth {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigurationError::ExpectedMonth(s.to_string());
        let (name, yy) = s.trim().split_once(['\'', '\u{2019}']).ok_or_else(bad)?;

        let month = MONTHS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(bad)? as u32
            + 1;

        let yy = yy.trim();
        if yy.len() != 2 || !yy.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let year = 2000 + yy.parse::<i32>().map_err(|_| bad())?;

        Ok(Self { month, year })
    }
}

impl TryFrom<String> for ExpectedMonth {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExpectedMonth> for String {
    fn from(value: ExpectedMonth) -> Self {
        value.to_string()
    }
}
