//! World Economic Outlook retrieval through the agency's SDMX 3.0 REST API:
//! a CSV data pull per dataflow version, labelled from cached codelists and
//! aligned to the columns the SDMX bundles produce.

use std::collections::HashMap;
use std::time::Duration;

use csv::ReaderBuilder;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{DEFAULT_TTL, TableCache};
use crate::domain::Version;
use crate::error::ImfError;
use crate::http::HttpClient;
use crate::registry::WeoRegistry;
use crate::table::{Column, ColumnValues, Table, parse_float, parse_integer};
use crate::weo::WeoSource;

pub const API_BASE_URL: &str = "https://api.imf.org/external/sdmx/3.0";

/// `(api column, field, codelist agency, codelist id)` for each coded column,
/// in output order.
pub const CODED_FIELDS: &[(&str, &str, &str, &str)] = &[
    ("UNIT", "UNIT", "IMF", "CL_UNIT"),
    ("INDICATOR", "CONCEPT", "IMF.RES", "CL_WEO_INDICATOR"),
    ("COUNTRY", "REF_AREA", "IMF.RES", "CL_WEO_COUNTRY"),
    ("FREQUENCY", "FREQ", "IMF", "CL_FREQ"),
];

const SCALE_COLUMN: &str = "SCALE";
const TIME_PERIOD_COLUMN: &str = "TIME_PERIOD";
const OBS_VALUE_COLUMN: &str = "OBS_VALUE";

/// Scale exponent to `(multiplier, label)`.
const SCALES: &[(i64, i64, &str)] = &[
    (0, 1, "Units"),
    (6, 1_000_000, "Millions"),
    (9, 1_000_000_000, "Billions"),
];

/// Network side of the REST API.
pub trait ApiClient: Send + Sync {
    /// Full dataflow listing for the WEO.
    fn dataflows(&self) -> Result<Value, ImfError>;
    /// Every observation of one dataflow version, as CSV.
    fn data_csv(&self, dataflow_version: &str) -> Result<String, ImfError>;
    fn codelist(&self, agency: &str, id: &str) -> Result<Value, ImfError>;
}

impl<T: ApiClient + ?Sized> ApiClient for &T {
    fn dataflows(&self) -> Result<Value, ImfError> {
        (**self).dataflows()
    }

    fn data_csv(&self, dataflow_version: &str) -> Result<String, ImfError> {
        (**self).data_csv(dataflow_version)
    }

    fn codelist(&self, agency: &str, id: &str) -> Result<Value, ImfError> {
        (**self).codelist(agency, id)
    }
}

pub struct ApiHttpClient {
    http: HttpClient,
    base_url: String,
}

impl ApiHttpClient {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn dataflows_url(&self) -> String {
        format!("{}/structure/dataflow/IMF.RES/WEO/*?detail=full", self.base())
    }

    pub fn data_url(&self, dataflow_version: &str) -> String {
        format!("{}/data/dataflow/IMF.RES/WEO/{dataflow_version}/*", self.base())
    }

    pub fn codelist_url(&self, agency: &str, id: &str) -> String {
        format!("{}/structure/codelist/{agency}/{id}", self.base())
    }

    fn get_json(&self, url: &str) -> Result<Value, ImfError> {
        let body = self.http.get_text(url)?;
        serde_json::from_str(&body).map_err(|err| ImfError::InvalidResponse {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

impl ApiClient for ApiHttpClient {
    fn dataflows(&self) -> Result<Value, ImfError> {
        self.get_json(&self.dataflows_url())
    }

    fn data_csv(&self, dataflow_version: &str) -> Result<String, ImfError> {
        self.http
            .get_text_accepting(&self.data_url(dataflow_version), "text/csv")
    }

    fn codelist(&self, agency: &str, id: &str) -> Result<Value, ImfError> {
        self.get_json(&self.codelist_url(agency, id))
    }
}

/// `code`, `label` from the newest codelist in a structure response. A code
/// without an English name gets an empty label.
pub fn parse_codelist(response: &Value) -> Result<Table, ImfError> {
    let newest = response
        .get("data")
        .and_then(|data| data.get("codelists"))
        .and_then(Value::as_array)
        .and_then(|codelists| codelists.last());

    let mut codes = Vec::new();
    let mut labels = Vec::new();
    let entries = newest
        .and_then(|codelist| codelist.get("codes"))
        .and_then(Value::as_array);
    for code in entries.into_iter().flatten() {
        let Some(id) = code.get("id").and_then(Value::as_str) else {
            continue;
        };
        let label = code
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| {
                code.get("names")
                    .and_then(|names| names.get("en"))
                    .and_then(Value::as_str)
            })
            .unwrap_or_default();
        codes.push(Some(id.to_string()));
        labels.push(Some(label.to_string()));
    }

    Table::from_columns(vec![
        Column::new("code", ColumnValues::String(codes)),
        Column::new("label", ColumnValues::String(labels)),
    ])
}

fn label_lookup(codelist: &Table) -> Result<HashMap<String, String>, ImfError> {
    let lookup = codelist
        .strings("code")?
        .iter()
        .zip(codelist.strings("label")?)
        .filter_map(|(code, label)| Some((code.clone()?, label.clone()?)))
        .collect();
    Ok(lookup)
}

/// Code to label lookups, one per entry of [`CODED_FIELDS`].
pub type Labels = Vec<HashMap<String, String>>;

/// Reshapes the API's CSV to the SDMX bundle layout: `_CODE`/`_LABEL` pairs,
/// observations stated in the series' scale, and the scale exponent replaced
/// by its multiplier. `LASTACTUALDATE` and `NOTES` are absent from the API
/// and stay missing.
pub fn align(csv_text: &str, labels: &Labels) -> Result<Table, ImfError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| ImfError::Delimited(err.to_string()))?
        .clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| ImfError::MissingColumn(name.to_string()))
    };
    let coded = CODED_FIELDS
        .iter()
        .map(|(api_column, ..)| position(*api_column))
        .collect::<Result<Vec<_>, _>>()?;
    let scale_at = position(SCALE_COLUMN)?;
    let time_at = position(TIME_PERIOD_COLUMN)?;
    let value_at = position(OBS_VALUE_COLUMN)?;

    let mut codes: Vec<Vec<Option<String>>> = vec![Vec::new(); CODED_FIELDS.len()];
    let mut scale_codes = Vec::new();
    let mut scale_labels = Vec::new();
    let mut periods = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ImfError::Delimited(err.to_string()))?;
        let cell = |index: usize| record.get(index).filter(|value| !value.is_empty());

        for (column, index) in codes.iter_mut().zip(&coded) {
            column.push(cell(*index).map(str::to_string));
        }

        let exponent = cell(scale_at).and_then(parse_integer);
        let scale = exponent.and_then(|exp| SCALES.iter().find(|(known, ..)| *known == exp));
        scale_codes.push(scale.map(|(_, multiplier, _)| *multiplier));
        scale_labels.push(scale.map(|(.., label)| label.to_string()));

        let value = cell(value_at).and_then(parse_float);
        values.push(match exponent {
            Some(exp) if exp > 0 => value.map(|value| value / 10f64.powi(exp as i32)),
            _ => value,
        });
        periods.push(cell(time_at).and_then(parse_integer));
    }
    let n_rows = values.len();
    debug!(rows = n_rows, "aligned API observations");

    let mut columns = Vec::new();
    let mut label_columns = Vec::new();
    for (index, ((_, field, ..), field_codes)) in CODED_FIELDS.iter().zip(codes).enumerate() {
        let lookup = labels.get(index);
        let mapped = field_codes
            .iter()
            .map(|code| code.as_deref().and_then(|code| lookup?.get(code).cloned()))
            .collect();
        label_columns.push(Column::new(
            format!("{field}_LABEL"),
            ColumnValues::String(mapped),
        ));
        columns.push(Column::new(
            format!("{field}_CODE"),
            ColumnValues::String(field_codes),
        ));
    }
    columns.push(Column::new(
        "LASTACTUALDATE",
        ColumnValues::Integer(vec![None; n_rows]),
    ));
    columns.push(Column::new("SCALE_CODE", ColumnValues::Integer(scale_codes)));
    columns.push(Column::new("NOTES", ColumnValues::String(vec![None; n_rows])));
    columns.push(Column::new(TIME_PERIOD_COLUMN, ColumnValues::Integer(periods)));
    columns.push(Column::new(OBS_VALUE_COLUMN, ColumnValues::Float(values)));
    columns.extend(label_columns);
    columns.push(Column::new("SCALE_LABEL", ColumnValues::String(scale_labels)));

    Table::from_columns(columns)
}

/// Fetches a release from the REST API. Releases the dataflow listing does
/// not carry are reported as [`ImfError::NoData`], so the latest-release
/// rollback applies to this source as well.
pub struct ApiSource<C: ApiClient, K: TableCache> {
    client: C,
    cache: K,
    ttl: Option<Duration>,
}

impl<C: ApiClient, K: TableCache> ApiSource<C, K> {
    pub fn new(client: C, cache: K) -> Self {
        Self {
            client,
            cache,
            ttl: Some(DEFAULT_TTL),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Code to label lookup for one codelist, cached as a two-column table.
    pub fn codelist(&self, agency: &str, id: &str) -> Result<HashMap<String, String>, ImfError> {
        let key = format!("codelist_{agency}_{id}");
        match self.cache.get(&key) {
            Ok(Some(table)) => {
                debug!(agency, id, "cache hit for codelist");
                return label_lookup(&table);
            }
            Ok(None) => {}
            Err(err) => warn!(%err, %key, "cache read failed, fetching from source"),
        }
        let table = parse_codelist(&self.client.codelist(agency, id)?)?;
        if let Err(err) = self.cache.set(&key, &table, self.ttl) {
            warn!(%err, %key, "unable to cache fetched data");
        }
        label_lookup(&table)
    }
}

impl<C: ApiClient, K: TableCache> WeoSource for ApiSource<C, K> {
    fn fetch(&self, version: Version) -> Result<Table, ImfError> {
        let mapping = WeoRegistry::new(&self.client).version_mapping()?;
        let Some(dataflow_version) = mapping.get(&version) else {
            let available = mapping
                .keys()
                .rev()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ImfError::NoData(format!(
                "version {version} not available. Available: {available}"
            )));
        };

        info!("Fetching WEO data from API: {version}");
        let csv_text = self.client.data_csv(dataflow_version)?;
        let labels = CODED_FIELDS
            .iter()
            .map(|(_, _, agency, id)| self.codelist(agency, id))
            .collect::<Result<Labels, _>>()?;
        align(&csv_text, &labels)
    }
}
