use std::time::Duration;

use camino::Utf8PathBuf;

use imf_reader::cache::{DiskCache, TableCache};
use imf_reader::table::{Column, ColumnValues, Table};

fn sample() -> Table {
    Table::from_columns(vec![
        Column::new(
            "REF_AREA_LABEL",
            ColumnValues::String(vec![Some("Germany".to_string()), None]),
        ),
        Column::new("TIME_PERIOD", ColumnValues::Integer(vec![Some(2024), Some(2025)])),
        Column::new("OBS_VALUE", ColumnValues::Float(vec![Some(0.5), None])),
    ])
    .unwrap()
}

fn cache_in(dir: &tempfile::TempDir) -> DiskCache {
    let root = Utf8PathBuf::from_path_buf(dir.path().join("imf-reader")).unwrap();
    DiskCache::new_with_root(root)
}

#[test]
fn disk_cache_round_trips_tables() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir);

    assert!(!cache.has("weo_data_April_2025").unwrap());
    cache
        .set("weo_data_April_2025", &sample(), Some(Duration::from_secs(3600)))
        .unwrap();

    assert!(cache.has("weo_data_April_2025").unwrap());
    assert_eq!(cache.get("weo_data_April_2025").unwrap(), Some(sample()));
    assert!(cache.entry_path("weo_data_April_2025").as_std_path().exists());
}

#[test]
fn expired_entries_read_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir);

    cache
        .set("sdr_interest_rates", &sample(), Some(Duration::ZERO))
        .unwrap();

    assert_eq!(cache.get("sdr_interest_rates").unwrap(), None);
    assert!(!cache.entry_path("sdr_interest_rates").as_std_path().exists());
}

#[test]
fn clear_removes_every_entry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir);
    cache.set("a", &sample(), None).unwrap();
    cache.set("b", &sample(), None).unwrap();

    cache.clear().unwrap();

    assert!(!cache.root().as_std_path().exists());
    assert_eq!(cache.get("a").unwrap(), None);
    cache.clear().unwrap();
}

#[test]
fn unreadable_entries_are_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir);
    cache.set("weo_data_April_2024", &sample(), None).unwrap();
    let path = cache.entry_path("weo_data_April_2024");
    std::fs::write(path.as_std_path(), r#"{"old": 1}"#).unwrap();

    assert_eq!(cache.get("weo_data_April_2024").unwrap(), None);
    assert!(!path.as_std_path().exists());
}

#[test]
fn oversized_ttl_is_stored_without_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let cache = cache_in(&dir);

    cache
        .set("sdr_interest_rates", &sample(), Some(Duration::MAX))
        .unwrap();

    assert_eq!(cache.get("sdr_interest_rates").unwrap(), Some(sample()));
}
