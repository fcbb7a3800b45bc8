//! Special Drawing Rights tables published by the agency: monthly holdings and
//! allocations announcements, the SDR valuation and the SDR interest rate.

pub mod announcements;
pub mod exchange_rate;
pub mod interest_rate;

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim};
use tracing::{info, warn};

use crate::cache::{DEFAULT_TTL, TableCache};
use crate::error::ImfError;
use crate::http::HttpClient;
use crate::table::{Column, ColumnValues, Table};

pub const ANNOUNCEMENTS_BASE_URL: &str = "https://www.imf.org/external/np/fin/tad/";
pub const ANNOUNCEMENTS_PAGE_URL: &str = "https://www.imf.org/external/np/fin/tad/extsdr1.aspx";
pub const EXCHANGE_RATES_URL: &str = "https://www.imf.org/external/np/fin/data/rms_sdrv.aspx";
pub const INTEREST_RATES_URL: &str = "https://www.imf.org/external/np/fin/data/sdr_ir.aspx";

/// Form post that makes the valuation pages answer with their TSV export.
pub const TSV_EXPORT_FORM: &[(&str, &str)] = &[("__EVENTTARGET", "lbnTSV")];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%m/%d/%Y", "%d-%b-%Y"];

/// Which side of the exchange rate is one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnitBasis {
    /// Value of SDR 1 in US dollars.
    #[default]
    Sdr,
    /// Value of US$1 in SDR.
    Usd,
}

impl UnitBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitBasis::Sdr => "SDR",
            UnitBasis::Usd => "USD",
        }
    }

    /// Row label of the rate in the valuation export.
    pub fn row_label(&self) -> &'static str {
        match self {
            UnitBasis::Sdr => "SDR1 = US$",
            UnitBasis::Usd => "U.S.$1.00 = SDR",
        }
    }
}

impl fmt::Display for UnitBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UnitBasis {
    type Err = ImfError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SDR" => Ok(UnitBasis::Sdr),
            "USD" => Ok(UnitBasis::Usd),
            _ => Err(ImfError::InvalidUnitBasis(value.to_string())),
        }
    }
}

/// Network side of the SDR readers.
pub trait SdrClient: Send + Sync {
    /// TSV export of the announcement for `date` (already formatted).
    fn holdings_tsv(&self, date: &str) -> Result<String, ImfError>;
    fn announcements_page(&self) -> Result<String, ImfError>;
    fn exchange_rates_tsv(&self) -> Result<String, ImfError>;
    fn interest_rates_tsv(&self) -> Result<String, ImfError>;
}

impl<T: SdrClient + ?Sized> SdrClient for &T {
    fn holdings_tsv(&self, date: &str) -> Result<String, ImfError> {
        (**self).holdings_tsv(date)
    }

    fn announcements_page(&self) -> Result<String, ImfError> {
        (**self).announcements_page()
    }

    fn exchange_rates_tsv(&self) -> Result<String, ImfError> {
        (**self).exchange_rates_tsv()
    }

    fn interest_rates_tsv(&self) -> Result<String, ImfError> {
        (**self).interest_rates_tsv()
    }
}

pub struct SdrHttpClient {
    http: HttpClient,
}

impl SdrHttpClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn holdings_url(date: &str) -> String {
        format!("{ANNOUNCEMENTS_BASE_URL}extsdr2.aspx?date1key={date}&tsvflag=Y")
    }

    fn post_tsv(&self, url: &str) -> Result<String, ImfError> {
        let body = self.http.post_form(url, TSV_EXPORT_FORM)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl SdrClient for SdrHttpClient {
    fn holdings_tsv(&self, date: &str) -> Result<String, ImfError> {
        self.http.get_text(&Self::holdings_url(date))
    }

    fn announcements_page(&self) -> Result<String, ImfError> {
        self.http.get_text(ANNOUNCEMENTS_PAGE_URL)
    }

    fn exchange_rates_tsv(&self) -> Result<String, ImfError> {
        self.post_tsv(EXCHANGE_RATES_URL)
    }

    fn interest_rates_tsv(&self) -> Result<String, ImfError> {
        self.post_tsv(INTEREST_RATES_URL)
    }
}

/// Splits a TSV export into trimmed cells, dropping blank records. Rows keep
/// their own width; the exports mix headers, data and summary lines.
pub(crate) fn tsv_rows(text: &str) -> Result<Vec<Vec<String>>, ImfError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ImfError::Delimited(err.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Reads the date formats used across the SDR pages; anything else is
/// treated as missing.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

pub(crate) fn date_column(name: &str, raw: &[Option<String>]) -> Column {
    Column::new(
        name,
        ColumnValues::Date(
            raw.iter()
                .map(|value| value.as_deref().and_then(parse_date))
                .collect(),
        ),
    )
}

/// Reads the SDR tables through `client`, keeping results in `cache`.
pub struct Sdr<C: SdrClient, K: TableCache> {
    client: C,
    cache: K,
    ttl: Option<Duration>,
    latest: Mutex<Option<(i32, u32)>>,
}

impl<C: SdrClient, K: TableCache> Sdr<C, K> {
    pub fn new(client: C, cache: K) -> Self {
        Self {
            client,
            cache,
            ttl: Some(DEFAULT_TTL),
            latest: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// `(year, month)` of the most recent announcement. Looked up once and
    /// remembered until [`Sdr::clear_cache`].
    pub fn latest_date(&self) -> Result<(i32, u32), ImfError> {
        let mut latest = self.latest.lock().map_err(|_| poisoned())?;
        if let Some(date) = *latest {
            return Ok(date);
        }
        info!("Fetching latest date");
        let page = self.client.announcements_page()?;
        let date = announcements::parse_latest_date(&page)?;
        *latest = Some(date);
        Ok(date)
    }

    /// Holdings and allocations for `date`, or for the latest announcement.
    pub fn allocations_holdings(&self, date: Option<(i32, u32)>) -> Result<Table, ImfError> {
        let latest = self.latest_date()?;
        let (year, month) = match date {
            Some(requested) if requested > latest => {
                return Err(ImfError::NoData(format!(
                    "SDR data unavailable for: {requested:?}. Latest available: {latest:?}"
                )));
            }
            Some(requested) => requested,
            None => latest,
        };

        let key = format!("sdr_holdings_{year}_{month}");
        self.cached(&key, || {
            let date = announcements::format_date(year, month)?;
            info!("Fetching SDR data for date: {date}");
            let tsv = self.client.holdings_tsv(&date)?;
            announcements::holdings_table(&tsv, &date)
        })
    }

    pub fn exchange_rates(&self, basis: UnitBasis) -> Result<Table, ImfError> {
        self.cached(&format!("sdr_exchange_rates_{basis}"), || {
            info!("Fetching exchange rate data");
            let tsv = self.client.exchange_rates_tsv()?;
            exchange_rate::parse_exchange_rates(&tsv, basis)
        })
    }

    pub fn interest_rates(&self) -> Result<Table, ImfError> {
        self.cached("sdr_interest_rates", || {
            info!("Fetching SDR interest rates");
            let tsv = self.client.interest_rates_tsv()?;
            interest_rate::parse_interest_rates(&tsv)
        })
    }

    /// Forgets every cached table and the remembered latest date.
    pub fn clear_cache(&self) -> Result<(), ImfError> {
        self.cache.clear()?;
        *self.latest.lock().map_err(|_| poisoned())? = None;
        info!("Cache cleared");
        Ok(())
    }

    fn cached<F>(&self, key: &str, load: F) -> Result<Table, ImfError>
    where
        F: FnOnce() -> Result<Table, ImfError>,
    {
        match self.cache.get(key) {
            Ok(Some(table)) => return Ok(table),
            Ok(None) => {}
            Err(err) => warn!(%err, %key, "cache read failed, fetching from source"),
        }
        let table = load()?;
        if let Err(err) = self.cache.set(key, &table, self.ttl) {
            warn!(%err, %key, "unable to cache fetched data");
        }
        Ok(table)
    }
}

fn poisoned() -> ImfError {
    ImfError::CacheIo("latest date lock poisoned".to_string())
}
