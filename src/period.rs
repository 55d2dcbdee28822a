//! Reporting periods and the period keys stamped on ledger entries

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{LedgerEntry, LedgerError, LedgerResult, ReturnKind};

/// Period keys derived from a ledger date
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodKeys {
    /// `YYYY-MM`
    pub month: String,
    /// `YYYY-Qn`
    pub quarter: String,
    /// `YYYY`
    pub year: String,
}

impl PeriodKeys {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: Period::month_of(date).to_string(),
            quarter: Period::quarter_of(date).to_string(),
            year: Period::Year(date.year()).to_string(),
        }
    }
}

/// A month, quarter or year, rendered as its ledger key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year(i32),
}

impl Period {
    pub fn month(year: i32, month: u32) -> LedgerResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::Validation(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        Ok(Period::Month { year, month })
    }

    pub fn quarter(year: i32, quarter: u32) -> LedgerResult<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(LedgerError::Validation(format!(
                "Quarter must be between 1 and 4, got {}",
                quarter
            )));
        }
        Ok(Period::Quarter { year, quarter })
    }

    pub fn month_of(date: NaiveDate) -> Self {
        Period::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn quarter_of(date: NaiveDate) -> Self {
        Period::Quarter {
            year: date.year(),
            quarter: date.month0() / 3 + 1,
        }
    }

    /// Month containing today's date (UTC)
    pub fn current_month() -> Self {
        Self::month_of(chrono::Utc::now().date_naive())
    }

    pub fn current_quarter() -> Self {
        Self::quarter_of(chrono::Utc::now().date_naive())
    }

    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Exact key match against the entry field of the same granularity
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        let key = self.key();
        match self {
            Period::Month { .. } => entry.month == key,
            Period::Quarter { .. } => entry.quarter == key,
            Period::Year(_) => entry.year == key,
        }
    }

    /// Return frequency for this period; years are not filed
    pub fn return_kind(&self) -> Option<ReturnKind> {
        match self {
            Period::Month { .. } => Some(ReturnKind::Monthly),
            Period::Quarter { .. } => Some(ReturnKind::Quarterly),
            Period::Year(_) => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
            Period::Quarter { year, quarter } => write!(f, "{:04}-Q{}", year, quarter),
            Period::Year(year) => write!(f, "{:04}", year),
        }
    }
}

impl FromStr for Period {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::Validation(format!("Invalid period key: '{}'", s));
        let parse_year = |y: &str| -> LedgerResult<i32> {
            if y.len() != 4 {
                return Err(invalid());
            }
            y.parse::<i32>().map_err(|_| invalid())
        };

        match s.split_once('-') {
            None => Ok(Period::Year(parse_year(s)?)),
            Some((year, rest)) => {
                let year = parse_year(year)?;
                if let Some(q) = rest.strip_prefix('Q') {
                    let quarter = q.parse::<u32>().map_err(|_| invalid())?;
                    Period::quarter(year, quarter)
                } else {
                    if rest.len() != 2 {
                        return Err(invalid());
                    }
                    let month = rest.parse::<u32>().map_err(|_| invalid())?;
                    Period::month(year, month)
                }
            }
        }
    }
}

impl TryFrom<String> for Period {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}
