//! World Economic Outlook retrieval: one release at a time from the agency's
//! SDMX bundles, and the "latest with one rollback" orchestration on top.

use std::time::Duration;

use chrono::{Local, NaiveDate};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::archive::ZipBundle;
use crate::assemble::assemble;
use crate::cache::{DEFAULT_TTL, TableCache};
use crate::domain::{Version, VersionRequest};
use crate::error::ImfError;
use crate::http::HttpClient;
use crate::table::{NumericKind, Table};
use crate::version;

pub const WEO_BASE_URL: &str = "https://www.imf.org/";

pub const SDMX_LINK_TEXT: &str = "SDMX Data";

/// Code columns and the schema classification that labels each of them.
pub const FIELDS_TO_MAP: &[(&str, &str)] = &[
    ("UNIT", "IMF.CL_WEO_UNIT.1.0"),
    ("CONCEPT", "IMF.CL_WEO_CONCEPT.1.0"),
    ("REF_AREA", "IMF.CL_WEO_REF_AREA.1.0"),
    ("FREQ", "IMF.CL_FREQ.1.0"),
    ("SCALE", "IMF.CL_WEO_SCALE.1.0"),
];

pub const NUMERIC_COLUMNS: &[(&str, NumericKind)] = &[
    ("REF_AREA_CODE", NumericKind::Integer),
    ("OBS_VALUE", NumericKind::Float),
    ("SCALE_CODE", NumericKind::Integer),
    ("LASTACTUALDATE", NumericKind::Integer),
    ("TIME_PERIOD", NumericKind::Integer),
];

/// Network side of a single release fetch.
pub trait WeoClient: Send + Sync {
    /// HTML of the release's "download entire database" page.
    fn release_page(&self, version: Version) -> Result<String, ImfError>;
    fn download(&self, url: &str) -> Result<Vec<u8>, ImfError>;
    /// Site that relative links on release pages point into.
    fn base_url(&self) -> &str {
        WEO_BASE_URL
    }
}

impl<T: WeoClient + ?Sized> WeoClient for &T {
    fn release_page(&self, version: Version) -> Result<String, ImfError> {
        (**self).release_page(version)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, ImfError> {
        (**self).download(url)
    }

    fn base_url(&self) -> &str {
        (**self).base_url()
    }
}

pub struct WeoHttpClient {
    http: HttpClient,
    base_url: String,
}

impl WeoHttpClient {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: WEO_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn release_page_url(&self, version: Version) -> String {
        format!(
            "{}/en/Publications/WEO/weo-database/{}/{}/download-entire-database",
            self.base_url.trim_end_matches('/'),
            version.year(),
            version.month()
        )
    }
}

impl WeoClient for WeoHttpClient {
    fn release_page(&self, version: Version) -> Result<String, ImfError> {
        let url = self.release_page_url(version);
        debug!(%url, "fetching release page");
        // The agency answers 404 for releases it has not published yet.
        self.http.get_text(&url).map_err(|err| match err {
            ImfError::HttpStatus { status: 404, .. } => {
                ImfError::NoData(format!("no release page for {version}"))
            }
            other => other,
        })
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, ImfError> {
        self.http.get_bytes(url)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Finds the "SDMX Data" anchor and resolves it against `base_url`.
pub fn find_sdmx_link(html: &str, base_url: &str) -> Result<String, ImfError> {
    let selector = Selector::parse("a").map_err(|err| ImfError::Html(err.to_string()))?;
    let base = Url::parse(base_url)
        .map_err(|err| ImfError::Html(format!("invalid base URL {base_url:?}: {err}")))?;
    let document = Html::parse_document(html);

    let href = document
        .select(&selector)
        .find(|anchor| anchor.text().collect::<String>().trim() == SDMX_LINK_TEXT)
        .and_then(|anchor| anchor.value().attr("href"))
        .ok_or_else(|| ImfError::NoData("SDMX Data link not found".to_string()))?;

    let url = base
        .join(href)
        .map_err(|err| ImfError::Html(format!("invalid SDMX link {href:?}: {err}")))?;
    debug!("SDMX URL found");
    Ok(url.to_string())
}

/// Fetches and assembles exactly one release.
pub trait WeoSource {
    fn fetch(&self, version: Version) -> Result<Table, ImfError>;
}

impl<T: WeoSource + ?Sized> WeoSource for &T {
    fn fetch(&self, version: Version) -> Result<Table, ImfError> {
        (**self).fetch(version)
    }
}

pub struct SdmxSource<C: WeoClient> {
    client: C,
}

impl<C: WeoClient> SdmxSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: WeoClient> WeoSource for SdmxSource<C> {
    fn fetch(&self, version: Version) -> Result<Table, ImfError> {
        let page = self.client.release_page(version)?;
        let link = find_sdmx_link(&page, self.client.base_url())?;
        let bytes = self.client.download(&link)?;
        let mut bundle = ZipBundle::from_bytes(bytes)?;
        bundle.validate()?;
        assemble(bundle, FIELDS_TO_MAP, NUMERIC_COLUMNS)
    }
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

/// Resolves a [`VersionRequest`] to a table, trying the cache before the
/// source. A request for the latest release falls back to the previous
/// release exactly once when the expected one is not published yet.
pub struct Weo<S: WeoSource, K: TableCache> {
    source: S,
    cache: K,
    ttl: Option<Duration>,
    today: fn() -> NaiveDate,
    last_version_fetched: Option<Version>,
}

impl<S: WeoSource, K: TableCache> Weo<S, K> {
    pub fn new(source: S, cache: K) -> Self {
        Self {
            source,
            cache,
            ttl: Some(DEFAULT_TTL),
            today: local_today,
            last_version_fetched: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// The version of the most recent successful fetch.
    pub fn last_version_fetched(&self) -> Option<Version> {
        self.last_version_fetched
    }

    pub fn fetch_data(&mut self, request: VersionRequest) -> Result<Table, ImfError> {
        match request {
            VersionRequest::Specific(version) => self.fetch_version(version),
            VersionRequest::Latest => {
                let target = version::latest_expected((self.today)());
                match self.fetch_version(target) {
                    Err(ImfError::NoData(_)) => {
                        warn!("No data found for expected latest version {target}.");
                        let fallback = version::rollback(target)?;
                        self.fetch_version(fallback).map_err(|err| match err {
                            ImfError::NoData(reason) => ImfError::NoData(format!(
                                "neither {target} nor {fallback} is available: {reason}"
                            )),
                            other => other,
                        })
                    }
                    other => other,
                }
            }
        }
    }

    /// Empties the table cache. The last fetched version is kept.
    pub fn clear_cache(&self) -> Result<(), ImfError> {
        self.cache.clear()?;
        info!("Cache cleared");
        Ok(())
    }

    fn fetch_version(&mut self, version: Version) -> Result<Table, ImfError> {
        let key = version.cache_key();
        let cached = self.cache.get(&key).unwrap_or_else(|err| {
            warn!(%err, %key, "cache read failed, fetching from source");
            None
        });
        let table = match cached {
            Some(table) => {
                debug!(%version, "using cached data");
                table
            }
            None => {
                let table = self.source.fetch(version)?;
                if let Err(err) = self.cache.set(&key, &table, self.ttl) {
                    warn!(%err, %key, "unable to cache fetched data");
                }
                table
            }
        };
        info!("Data fetched successfully for version {version}");
        self.last_version_fetched = Some(version);
        Ok(table)
    }
}
