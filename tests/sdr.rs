use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use chrono::NaiveDate;

use imf_reader::cache::{DiskCache, MemoryCache};
use imf_reader::error::ImfError;
use imf_reader::sdr::{Sdr, SdrClient, SdrHttpClient, UnitBasis};
use imf_reader::table::{Scalar, ScalarType};

const ANNOUNCEMENTS: &str = r#"<html><body>
  <table><tr><td>header</td></tr></table>
  <table><tr><td>menu</td></tr></table>
  <table><tr><td>search</td></tr></table>
  <table><tr><td>links</td></tr></table>
  <table>
    <tr><th>Date</th><th>Press release</th></tr>
    <tr><td>February 29, 2024</td><td>SDR holdings and allocations</td></tr>
    <tr><td>January 31, 2024</td><td>SDR holdings and allocations</td></tr>
  </table>
</body></html>"#;

const HOLDINGS: &str = "SDR Allocations and Holdings\n\
for all members as of February 29, 2024\n\
(in SDRs)\n\
Members\tSDR Holdings\tSDR Allocations\n\
Afghanistan\t312,164,284\t460,730,060\n\
Albania\t118,525,467\t189,524,002\n\
Algeria\t2,961,247,155\t3,150,906,830\n";

const VALUATION: &str = "SDR Valuations\n\
Report date\tCurrency\tCurrency amount under Rule O-1\tExchange rate\tU.S. dollar equivalent\n\
29-Feb-2024\tChinese yuan\t1.0174\t7.1036\t0.143223\n\
29-Feb-2024\tEuro\t0.37379\t1.0813\t0.404179\n\
U.S.$1.00 = SDR\t0.751879\n\
SDR1 = US$\t1.330000\n";

const INTEREST: &str = "SDR Interest Rate Calculation\n\
Effective from\tEffective to\n\
2/26/2024\t3/3/2024\n\
Floor for SDR Interest Rate\t0.050\n\
SDR Interest Rate\t4.083\n\
Total\t\n";

#[derive(Default)]
struct MockClient {
    calls: Mutex<Vec<&'static str>>,
}

impl MockClient {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|recorded| **recorded == call)
            .count()
    }
}

impl SdrClient for MockClient {
    fn holdings_tsv(&self, date: &str) -> Result<String, ImfError> {
        self.record("holdings");
        assert_eq!(date, "2024-2-29");
        Ok(HOLDINGS.to_string())
    }

    fn announcements_page(&self) -> Result<String, ImfError> {
        self.record("announcements");
        Ok(ANNOUNCEMENTS.to_string())
    }

    fn exchange_rates_tsv(&self) -> Result<String, ImfError> {
        self.record("exchange_rates");
        Ok(VALUATION.to_string())
    }

    fn interest_rates_tsv(&self) -> Result<String, ImfError> {
        self.record("interest_rates");
        Ok(INTEREST.to_string())
    }
}

#[test]
fn latest_holdings_are_melted_with_date() {
    let client = MockClient::default();
    let sdr = Sdr::new(&client, MemoryCache::new());

    assert_eq!(sdr.latest_date().unwrap(), (2024, 2));
    let table = sdr.allocations_holdings(None).unwrap();

    assert_eq!(
        table.column_names(),
        vec!["entity", "indicator", "value", "date"]
    );
    assert_eq!(table.n_rows(), 6);
    assert_eq!(table.cell(0, "value"), Scalar::Float(312_164_284.0));
    assert_eq!(table.cell(3, "indicator"), Scalar::String("allocations"));
    assert_eq!(table.cell(5, "entity"), Scalar::String("Algeria"));
    assert_eq!(
        table.cell(5, "date").as_date(),
        NaiveDate::from_ymd_opt(2024, 2, 29)
    );
    assert_eq!(client.count("announcements"), 1);
}

#[test]
fn future_month_is_unavailable() {
    let client = MockClient::default();
    let sdr = Sdr::new(&client, MemoryCache::new());
    assert_matches!(
        sdr.allocations_holdings(Some((2024, 3))),
        Err(ImfError::NoData(reason)) if reason.contains("Latest available: (2024, 2)")
    );
    assert_eq!(client.count("holdings"), 0);
}

#[test]
fn exchange_rates_are_cached_per_basis() {
    let client = MockClient::default();
    let sdr = Sdr::new(&client, MemoryCache::new());

    let sdr_basis = sdr.exchange_rates(UnitBasis::Sdr).unwrap();
    let again = sdr.exchange_rates(UnitBasis::Sdr).unwrap();
    let usd_basis = sdr.exchange_rates(UnitBasis::Usd).unwrap();

    assert_eq!(sdr_basis, again);
    assert_eq!(sdr_basis.cell(0, "exchange_rate"), Scalar::Float(1.33));
    assert_eq!(usd_basis.cell(0, "exchange_rate"), Scalar::Float(0.751879));
    assert_eq!(
        sdr_basis.column("date").unwrap().scalar_type(),
        ScalarType::Date
    );
    assert_eq!(client.count("exchange_rates"), 2);
}

#[test]
fn interest_rates_drop_floor_and_total_rows() {
    let client = MockClient::default();
    let sdr = Sdr::new(&client, MemoryCache::new());

    let table = sdr.interest_rates().unwrap();

    assert_eq!(table.n_rows(), 1);
    assert_eq!(table.cell(0, "interest_rate"), Scalar::Float(4.083));
    assert_eq!(
        table.cell(0, "effective_to").as_date(),
        NaiveDate::from_ymd_opt(2024, 3, 3)
    );

    sdr.clear_cache().unwrap();
    sdr.interest_rates().unwrap();
    assert_eq!(client.count("interest_rates"), 2);
}

#[test]
fn holdings_url_carries_unpadded_date() {
    assert_eq!(
        SdrHttpClient::holdings_url("2024-2-29"),
        "https://www.imf.org/external/np/fin/tad/extsdr2.aspx?date1key=2024-2-29&tsvflag=Y"
    );
}

#[test]
fn unwritable_cache_does_not_fail_reads() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("cache-file");
    std::fs::write(&blocker, "").unwrap();
    let client = MockClient::default();
    let sdr = Sdr::new(
        &client,
        DiskCache::new_with_root(Utf8PathBuf::from_path_buf(blocker).unwrap()),
    );

    let table = sdr.interest_rates().unwrap();
    sdr.interest_rates().unwrap();

    assert_eq!(table.cell(0, "interest_rate"), Scalar::Float(4.083));
    assert_eq!(client.count("interest_rates"), 2);
}
