//! Release resolution for the WEO database.
//!
//! The agency publishes twice a year, in April and October. These functions
//! are pure: the current date is always passed in.

use chrono::{Datelike, NaiveDate};
use serde_json::Value;
use tracing::info;

use crate::domain::{ReleaseMonth, Version, VersionRequest};
use crate::error::ImfError;

/// Calendar month from which the April release is expected to be out.
pub const APRIL_RELEASE_MONTH: u32 = 4;
/// Calendar month from which the October release is expected to be out.
pub const OCTOBER_RELEASE_MONTH: u32 = 10;

/// Validates a user supplied `(month, year)` pair.
///
/// The month is matched case-insensitively after trimming; the year must be
/// an integer once surrounding whitespace is removed.
pub fn normalize(month: &str, year: &str) -> Result<Version, ImfError> {
    let month: ReleaseMonth = month.parse()?;
    let year = year.trim().parse::<i32>().map_err(|_| {
        ImfError::InvalidVersion(format!("invalid year {year:?}, must be an integer"))
    })?;
    Version::new(month, year)
}

/// Validates a loosely typed version: a two element array of a month string
/// and a year given either as a number or a numeric string.
pub fn normalize_value(raw: &Value) -> Result<Version, ImfError> {
    let items = raw
        .as_array()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| {
            ImfError::InvalidVersion(format!("expected a [month, year] pair, got {raw}"))
        })?;
    let (month, year) = (&items[0], &items[1]);

    let month = month.as_str().ok_or_else(|| {
        ImfError::InvalidVersion(format!("month must be a string, got {month}"))
    })?;
    let year = match year {
        Value::Number(number) => number
            .as_i64()
            .and_then(|value| i32::try_from(value).ok())
            .map(|value| value.to_string()),
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
    .ok_or_else(|| ImfError::InvalidVersion(format!("invalid year {year}, must be an integer")))?;

    normalize(month, &year)
}

/// Interprets `"latest"` or a `[month, year]` pair.
pub fn request_from_value(raw: &Value) -> Result<VersionRequest, ImfError> {
    match raw {
        Value::String(text) if text.trim().eq_ignore_ascii_case("latest") => {
            Ok(VersionRequest::Latest)
        }
        Value::String(text) => Ok(VersionRequest::Specific(text.parse()?)),
        other => Ok(VersionRequest::Specific(normalize_value(other)?)),
    }
}

/// The release that should be the newest one on `today`.
pub fn latest_expected(today: NaiveDate) -> Version {
    let year = today.year();
    let month = today.month();
    if month < APRIL_RELEASE_MONTH {
        Version::from_calendar(ReleaseMonth::October, year - 1)
    } else if month < OCTOBER_RELEASE_MONTH {
        Version::from_calendar(ReleaseMonth::April, year)
    } else {
        Version::from_calendar(ReleaseMonth::October, year)
    }
}

/// The release published immediately before `version`.
pub fn rollback(version: Version) -> Result<Version, ImfError> {
    let previous = match version.month() {
        ReleaseMonth::October => Version::new(ReleaseMonth::April, version.year())?,
        ReleaseMonth::April => Version::new(ReleaseMonth::October, version.year() - 1)?,
    };
    info!("Rolling back version to {previous}");
    Ok(previous)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn version(month: ReleaseMonth, year: i32) -> Version {
        Version::new(month, year).unwrap()
    }

    fn date(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    #[test]
    fn normalize_accepts_mixed_case_and_whitespace() {
        assert_eq!(
            normalize(" apRil ", "2024").unwrap(),
            version(ReleaseMonth::April, 2024)
        );
        assert_eq!(
            normalize("october", " 2024 ").unwrap(),
            version(ReleaseMonth::October, 2024)
        );
    }

    #[test]
    fn normalize_rejects_unknown_month_and_bad_year() {
        assert_matches!(normalize("March", "2024"), Err(ImfError::InvalidVersion(_)));
        assert_matches!(normalize("Apr", "2024"), Err(ImfError::InvalidVersion(_)));
        assert_matches!(
            normalize("April", "twenty twenty four"),
            Err(ImfError::InvalidVersion(_))
        );
        assert_matches!(normalize("April", "-3"), Err(ImfError::InvalidVersion(_)));
    }

    #[test]
    fn normalize_value_checks_shape() {
        assert_eq!(
            normalize_value(&json!(["April", 2024])).unwrap(),
            version(ReleaseMonth::April, 2024)
        );
        assert_eq!(
            normalize_value(&json!([" october ", "2023"])).unwrap(),
            version(ReleaseMonth::October, 2023)
        );
        assert_matches!(
            normalize_value(&json!("April 2024")),
            Err(ImfError::InvalidVersion(_))
        );
        assert_matches!(
            normalize_value(&json!(["April"])),
            Err(ImfError::InvalidVersion(_))
        );
        assert_matches!(
            normalize_value(&json!(["April", 2024, 1])),
            Err(ImfError::InvalidVersion(_))
        );
        assert_matches!(
            normalize_value(&json!(["April", 2024.5])),
            Err(ImfError::InvalidVersion(_))
        );
    }

    #[test]
    fn request_from_value_handles_latest() {
        assert_eq!(
            request_from_value(&json!("LATEST")).unwrap(),
            VersionRequest::Latest
        );
        assert_eq!(
            request_from_value(&json!(["April", 2022])).unwrap(),
            VersionRequest::Specific(version(ReleaseMonth::April, 2022))
        );
    }

    #[test]
    fn latest_expected_follows_release_calendar() {
        assert_eq!(
            latest_expected(date(2024, 1)),
            version(ReleaseMonth::October, 2023)
        );
        assert_eq!(
            latest_expected(date(2024, 3)),
            version(ReleaseMonth::October, 2023)
        );
        for month in 4..=9 {
            assert_eq!(
                latest_expected(date(2024, month)),
                version(ReleaseMonth::April, 2024)
            );
        }
        for month in 10..=12 {
            assert_eq!(
                latest_expected(date(2024, month)),
                version(ReleaseMonth::October, 2024)
            );
        }
    }

    #[test]
    fn rollback_steps_to_previous_release() {
        assert_eq!(
            rollback(version(ReleaseMonth::October, 2024)).unwrap(),
            version(ReleaseMonth::April, 2024)
        );
        assert_eq!(
            rollback(version(ReleaseMonth::April, 2024)).unwrap(),
            version(ReleaseMonth::October, 2023)
        );
    }

    #[test]
    fn double_rollback_is_not_identity() {
        let start = version(ReleaseMonth::April, 2024);
        let twice = rollback(rollback(start).unwrap()).unwrap();
        assert_eq!(twice, version(ReleaseMonth::April, 2023));
    }

    #[test]
    fn rollback_before_year_one_is_invalid() {
        assert_matches!(
            rollback(version(ReleaseMonth::April, 1)),
            Err(ImfError::InvalidVersion(_))
        );
    }
}
