use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ImfError;

/// The two releases the WEO database is published in each year.
///
/// Declaration order is release order: `April` sorts before `October`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReleaseMonth {
    April,
    October,
}

impl ReleaseMonth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseMonth::April => "April",
            ReleaseMonth::October => "October",
        }
    }
}

impl fmt::Display for ReleaseMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReleaseMonth {
    type Err = ImfError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "april" => Ok(ReleaseMonth::April),
            "october" => Ok(ReleaseMonth::October),
            _ => Err(ImfError::InvalidVersion(format!(
                "invalid month {value:?}, must be `April` or `October`"
            ))),
        }
    }
}

/// One published WEO release. Ordered by year, then release month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    year: i32,
    month: ReleaseMonth,
}

impl Version {
    pub fn new(month: ReleaseMonth, year: i32) -> Result<Self, ImfError> {
        if year <= 0 {
            return Err(ImfError::InvalidVersion(format!(
                "year must be positive, got {year}"
            )));
        }
        Ok(Self { year, month })
    }

    pub(crate) fn from_calendar(month: ReleaseMonth, year: i32) -> Self {
        Self { year, month }
    }

    pub fn month(&self) -> ReleaseMonth {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn cache_key(&self) -> String {
        format!("weo_data_{}_{}", self.month, self.year)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month, self.year)
    }
}

impl FromStr for Version {
    type Err = ImfError;

    /// Accepts `"April 2024"`, `"october-2024"` or `"April,2024"`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .split(|ch: char| ch.is_whitespace() || ch == ',' || ch == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();
        match parts.as_slice() {
            [month, year] => crate::version::normalize(month, year),
            _ => Err(ImfError::InvalidVersion(format!(
                "expected a month and a year, got {value:?}"
            ))),
        }
    }
}

/// What a caller asks for: a pinned release or whatever is newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionRequest {
    #[default]
    Latest,
    Specific(Version),
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRequest::Latest => write!(f, "latest"),
            VersionRequest::Specific(version) => write!(f, "{version}"),
        }
    }
}

impl FromStr for VersionRequest {
    type Err = ImfError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("latest") {
            return Ok(VersionRequest::Latest);
        }
        Ok(VersionRequest::Specific(value.parse()?))
    }
}

impl From<Version> for VersionRequest {
    fn from(version: Version) -> Self {
        VersionRequest::Specific(version)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn versions_order_by_year_then_month() {
        let april_24 = Version::new(ReleaseMonth::April, 2024).unwrap();
        let october_23 = Version::new(ReleaseMonth::October, 2023).unwrap();
        let october_24 = Version::new(ReleaseMonth::October, 2024).unwrap();
        assert!(october_23 < april_24);
        assert!(april_24 < october_24);
    }

    #[test]
    fn parse_version_string() {
        let version: Version = "october-2023".parse().unwrap();
        assert_eq!(version.month(), ReleaseMonth::October);
        assert_eq!(version.year(), 2023);
        assert_eq!(version.to_string(), "October 2023");
    }

    #[test]
    fn parse_version_request() {
        assert_eq!(
            " Latest ".parse::<VersionRequest>().unwrap(),
            VersionRequest::Latest
        );
        assert_matches!(
            "April 2024".parse::<VersionRequest>(),
            Ok(VersionRequest::Specific(_))
        );
        assert_matches!(
            "2024".parse::<VersionRequest>(),
            Err(ImfError::InvalidVersion(_))
        );
    }

    #[test]
    fn cache_key_names_release() {
        let version = Version::new(ReleaseMonth::April, 2025).unwrap();
        assert_eq!(version.cache_key(), "weo_data_April_2025");
    }
}
