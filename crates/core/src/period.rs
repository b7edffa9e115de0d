use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month. Ordering is chronological (year, then month), so
/// `2025-09 < 2025-10` even though the text `"2025-9"` sorts after `"2025-10"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(YearMonth { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Accepts `YYYY-MM` and `YYYY-M`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid year-month: '{s}'"))?;
        let year = y
            .parse::<i32>()
            .map_err(|_| format!("Invalid year in '{s}'"))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| format!("Invalid month in '{s}'"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("Month out of range in '{s}'"))
    }
}
