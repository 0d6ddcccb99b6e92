//! Reporting periods.
//!
//! A Period is the (facility, year, month) triple every computation is
//! scoped to. Month names arrive as free text from the import side, in
//! English or Turkish, so parsing goes through `fold_label`.

use crate::{
    error::{RosterError, RosterResult},
    normalize::fold_label,
    types::FacilityId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

const MONTH_NAMES: [[&str; 3]; 12] = [
    ["JANUARY", "JAN", "OCAK"],
    ["FEBRUARY", "FEB", "SUBAT"],
    ["MARCH", "MAR", "MART"],
    ["APRIL", "APR", "NISAN"],
    ["MAY", "MAY", "MAYIS"],
    ["JUNE", "JUN", "HAZIRAN"],
    ["JULY", "JUL", "TEMMUZ"],
    ["AUGUST", "AUG", "AGUSTOS"],
    ["SEPTEMBER", "SEP", "EYLUL"],
    ["OCTOBER", "OCT", "EKIM"],
    ["NOVEMBER", "NOV", "KASIM"],
    ["DECEMBER", "DEC", "ARALIK"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YearMonth {
    pub year:  i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> RosterResult<Self> {
        if !(1..=12).contains(&month) || year <= 0 {
            return Err(RosterError::InvalidPeriod {
                year,
                month: month.to_string(),
            });
        }
        Ok(Self { year, month })
    }

    /// Parse a month given by name ("March", "Mar", "MART") or number ("3", "03").
    pub fn parse(year: i32, month: &str) -> RosterResult<Self> {
        let folded = fold_label(month);
        let invalid = || RosterError::InvalidPeriod {
            year,
            month: month.to_string(),
        };

        if let Ok(n) = folded.parse::<u32>() {
            return Self::new(year, n).map_err(|_| invalid());
        }

        MONTH_NAMES
            .iter()
            .position(|names| names.contains(&folded.as_str()))
            .ok_or_else(invalid)
            .and_then(|idx| Self::new(year, idx as u32 + 1))
    }

    /// The immediately preceding month (January rolls back a year).
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// The unit of aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub facility: FacilityId,
    pub month:    YearMonth,
}

impl Period {
    pub fn new(facility: impl Into<FacilityId>, month: YearMonth) -> Self {
        Self {
            facility: facility.into(),
            month,
        }
    }

    /// Same facility, preceding month.
    pub fn previous(&self) -> Self {
        Self {
            facility: self.facility.clone(),
            month:    self.month.previous(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.facility, self.month)
    }
}
