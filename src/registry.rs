//! Releases listed by the agency's SDMX 3.0 structure API, and the dataflow
//! version that carries each of them.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use crate::api::ApiClient;
use crate::domain::{ReleaseMonth, Version};
use crate::error::ImfError;

const LAST_UPDATED_ANNOTATION: &str = "lastUpdatedAt";

/// Releases updated before July belong to the April round.
const OCTOBER_ROUND_FROM_MONTH: u32 = 7;

/// Maps each release to the dataflow version string that carries it.
/// Dataflows without a readable `lastUpdatedAt` annotation are skipped.
pub fn parse_version_mapping(listing: &Value) -> BTreeMap<Version, String> {
    let mut mapping = BTreeMap::new();
    let dataflows = listing
        .get("data")
        .and_then(|data| data.get("dataflows"))
        .and_then(Value::as_array);

    for dataflow in dataflows.into_iter().flatten() {
        let Some(api_version) = dataflow.get("version").and_then(Value::as_str) else {
            continue;
        };
        let updated = dataflow
            .get("annotations")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|annotation| {
                annotation.get("id").and_then(Value::as_str) == Some(LAST_UPDATED_ANNOTATION)
            })
            .filter_map(|annotation| annotation.get("value").and_then(Value::as_str))
            .filter_map(parse_timestamp)
            .last();
        let Some(updated) = updated else {
            debug!(api_version, "dataflow has no lastUpdatedAt annotation");
            continue;
        };

        let month = if updated.month() < OCTOBER_ROUND_FROM_MONTH {
            ReleaseMonth::April
        } else {
            ReleaseMonth::October
        };
        match Version::new(month, updated.year()) {
            Ok(version) => {
                mapping.insert(version, api_version.to_string());
            }
            Err(err) => debug!(%err, api_version, "skipping dataflow"),
        }
    }
    mapping
}

fn parse_timestamp(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Newest release first.
pub fn sorted_versions(mapping: &BTreeMap<Version, String>) -> Vec<Version> {
    mapping.keys().rev().copied().collect()
}

/// Releases the REST API currently serves.
pub struct WeoRegistry<C: ApiClient> {
    client: C,
}

impl<C: ApiClient> WeoRegistry<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn version_mapping(&self) -> Result<BTreeMap<Version, String>, ImfError> {
        Ok(parse_version_mapping(&self.client.dataflows()?))
    }

    pub fn available_versions(&self) -> Result<Vec<Version>, ImfError> {
        Ok(sorted_versions(&self.version_mapping()?))
    }
}
