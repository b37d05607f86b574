//! Core enumerations shared by the query engine and its collaborators

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DatumError;

/// Time granularity at which datum are rolled up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    None,
    Hour,
    Day,
    Month,
    Year,
    RunningTotal,
}

impl Aggregation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Hour => "Hour",
            Self::Day => "Day",
            Self::Month => "Month",
            Self::Year => "Year",
            Self::RunningTotal => "RunningTotal",
        }
    }

    /// Ordinal of a calendar level, `None` for levels without a fixed period.
    pub fn level(&self) -> Option<u8> {
        match self {
            Self::Hour => Some(1),
            Self::Day => Some(2),
            Self::Month => Some(3),
            Self::Year => Some(4),
            Self::None | Self::RunningTotal => None,
        }
    }

    /// True if every period of `other` lies within exactly one period of `self`.
    pub fn contains(&self, other: Aggregation) -> bool {
        match (self.level(), other.level()) {
            (Some(coarse), Some(fine)) => coarse > fine,
            _ => false,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Aggregation {
    type Err = DatumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "runningtotal" => Ok(Self::RunningTotal),
            _ => Err(DatumError::UnsupportedAggregation(s.to_string())),
        }
    }
}

/// Rule for merging several physical streams into one virtual stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombiningType {
    Average,
    Sum,
    Difference,
}

impl CombiningType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Average => "Average",
            Self::Sum => "Sum",
            Self::Difference => "Difference",
        }
    }

    /// Short key, also used to name the embedded CTE templates.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Average => "avg",
            Self::Sum => "sum",
            Self::Difference => "diff",
        }
    }
}

impl fmt::Display for CombiningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CombiningType {
    type Err = DatumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "average" | "avg" => Ok(Self::Average),
            "sum" => Ok(Self::Sum),
            "difference" | "diff" => Ok(Self::Difference),
            _ => Err(DatumError::UnsupportedCombiningType(s.to_string())),
        }
    }
}

/// Kind of object a stream is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectDatumKind {
    #[default]
    Node,
    Location,
}

impl ObjectDatumKind {
    pub fn key(&self) -> char {
        match self {
            Self::Node => 'n',
            Self::Location => 'l',
        }
    }

    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'n' => Some(Self::Node),
            'l' => Some(Self::Location),
            _ => None,
        }
    }
}

/// Sample kinds; the first three partition a stream's property names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatumSamplesType {
    Instantaneous,
    Accumulating,
    Status,
    Tag,
}

impl DatumSamplesType {
    pub fn key(&self) -> char {
        match self {
            Self::Instantaneous => 'i',
            Self::Accumulating => 'a',
            Self::Status => 's',
            Self::Tag => 't',
        }
    }
}

/// One ordering term of a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDescriptor {
    pub sort_key: String,
    #[serde(default)]
    pub descending: bool,
}

impl SortDescriptor {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            sort_key: key.into(),
            descending: false,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            sort_key: key.into(),
            descending: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_containment() {
        assert!(Aggregation::Year.contains(Aggregation::Month));
        assert!(Aggregation::Year.contains(Aggregation::Hour));
        assert!(Aggregation::Day.contains(Aggregation::Hour));
        assert!(!Aggregation::Day.contains(Aggregation::Day));
        assert!(!Aggregation::Hour.contains(Aggregation::Day));
        assert!(!Aggregation::RunningTotal.contains(Aggregation::Hour));
        assert!(!Aggregation::Month.contains(Aggregation::None));
    }

    #[test]
    fn aggregation_parse() {
        assert_eq!("day".parse::<Aggregation>().unwrap(), Aggregation::Day);
        assert_eq!(
            "RunningTotal".parse::<Aggregation>().unwrap(),
            Aggregation::RunningTotal
        );
        let err = "Fortnight".parse::<Aggregation>().unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_AGGREGATION");
        assert!(err.to_string().contains("Fortnight"));
    }

    #[test]
    fn combining_type_parse() {
        assert_eq!("avg".parse::<CombiningType>().unwrap(), CombiningType::Average);
        assert_eq!("Sum".parse::<CombiningType>().unwrap(), CombiningType::Sum);
        assert_eq!(
            "difference".parse::<CombiningType>().unwrap(),
            CombiningType::Difference
        );
        assert!(matches!(
            "median".parse::<CombiningType>(),
            Err(DatumError::UnsupportedCombiningType(v)) if v == "median"
        ));
    }

    #[test]
    fn object_kind_keys() {
        assert_eq!(ObjectDatumKind::from_key('n'), Some(ObjectDatumKind::Node));
        assert_eq!(ObjectDatumKind::from_key('l'), Some(ObjectDatumKind::Location));
        assert_eq!(ObjectDatumKind::from_key('x'), None);
        assert_eq!(ObjectDatumKind::default().key(), 'n');
    }
}
