// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Releases and episodes stored in the mirror.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A release (album, single...) or a podcast episode.
///
/// Only `id`, dates and the parent link are typed; every other field the
/// catalog returned is kept as-is in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseItem {
    pub id: String,
    /// Artist id for releases, show id for episodes
    pub parent_entity_id: String,
    #[serde(default)]
    pub name: String,
    pub release_date: String,
    pub release_date_precision: DatePrecision,
    /// UTC seconds at midnight of the first day the release date denotes
    pub release_date_timestamp: i64,
    /// UTC seconds when the item entered the mirror
    pub added_date_timestamp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReleaseItem {
    /// The timestamp used for date queries and feed ordering.
    pub fn timestamp_for(&self, sorting: DateSorting) -> i64 {
        match sorting {
            DateSorting::ReleaseDate => self.release_date_timestamp,
            DateSorting::AddedDate => self.added_date_timestamp,
        }
    }
}

/// Granularity of a catalog release date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Day,
    Month,
    Year,
}

impl DatePrecision {
    /// Parse a release date string written at this precision.
    ///
    /// `month` and `year` dates resolve to the first day of the period.
    pub fn parse_date(self, value: &str) -> Option<NaiveDate> {
        match self {
            DatePrecision::Day => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
            DatePrecision::Month => {
                NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d").ok()
            }
            DatePrecision::Year => value
                .parse::<i32>()
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        }
    }
}

impl FromStr for DatePrecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(DatePrecision::Day),
            "month" => Ok(DatePrecision::Month),
            "year" => Ok(DatePrecision::Year),
            other => Err(format!("unknown release date precision '{}'", other)),
        }
    }
}

/// Which timestamp date queries and listings are keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DateSorting {
    #[default]
    #[serde(rename = "release_date_timestamp")]
    ReleaseDate,
    #[serde(rename = "added_date_timestamp")]
    AddedDate,
}

impl FromStr for DateSorting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release_date_timestamp" => Ok(DateSorting::ReleaseDate),
            "added_date_timestamp" => Ok(DateSorting::AddedDate),
            other => Err(format!(
                "'{}' is not one of release_date_timestamp, added_date_timestamp",
                other
            )),
        }
    }
}

impl fmt::Display for DateSorting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateSorting::ReleaseDate => write!(f, "release_date_timestamp"),
            DateSorting::AddedDate => write!(f, "added_date_timestamp"),
        }
    }
}

/// Which item collection an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Releases,
    Episodes,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Releases => write!(f, "releases"),
            ItemKind::Episodes => write!(f, "episodes"),
        }
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "releases" => Ok(ItemKind::Releases),
            "episodes" => Ok(ItemKind::Episodes),
            other => Err(format!("unknown item kind '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_day_precision() {
        let date = DatePrecision::Day.parse_date("2024-03-15");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn test_parse_month_precision_uses_first_day() {
        let date = DatePrecision::Month.parse_date("2024-03");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn test_parse_year_precision_uses_first_of_january() {
        let date = DatePrecision::Year.parse_date("1999");
        assert_eq!(date, NaiveDate::from_ymd_opt(1999, 1, 1));
    }

    #[test]
    fn test_precision_mismatch_is_rejected() {
        assert!(DatePrecision::Day.parse_date("2024-03").is_none());
        assert!(DatePrecision::Year.parse_date("2024-03-15").is_none());
    }

    #[test]
    fn test_sorting_parses_config_values() {
        assert_eq!(
            "added_date_timestamp".parse::<DateSorting>(),
            Ok(DateSorting::AddedDate)
        );
        assert!("newest".parse::<DateSorting>().is_err());
    }
}
