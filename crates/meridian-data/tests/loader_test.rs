//! Integration tests for source loading and identifier export.

use meridian_data::loader::{self, read_csv};
use meridian_data::{DataError, Dataset, EntityId, ExportOutcome, ExportPolicy, write_ids};
use std::fs;
use std::path::PathBuf;

fn scratch_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meridian-data-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

#[test]
fn test_securities_round_trip_from_file() {
    let path = scratch_path("securities.csv");
    fs::write(
        &path,
        "gvkey,iid,datadate,curcdm,prccm,ajexm,trfm,cshom\n\
         001690,01,2021-01-29,USD,131.96,4,1.0,16.7\n\
         001690,01,2021-02-26,USD,,4,1.0,16.7\n",
    )
    .unwrap();

    let frame = read_csv(&path).unwrap();
    let records = loader::price_records(&frame).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].entity_id, Some(EntityId::new("1690")));
    assert_eq!(records[0].issue_id.as_ref().map(|i| i.as_str()), Some("01"));
    assert_eq!(records[0].adjustment_factor, Some(4.0));
    assert_eq!(records[1].close, None);
}

#[test]
fn test_fx_source_without_gbp_column_fails() {
    let path = scratch_path("fx.csv");
    fs::write(&path, "curd,datadate,exratd_toUSD\nEUR,2021-01-04,0.82\n").unwrap();

    let frame = read_csv(&path).unwrap();
    let err = loader::exchange_rates(&frame).unwrap_err();

    assert!(matches!(
        err,
        DataError::MissingColumn { dataset: Dataset::ExchangeRates, ref column } if column == "exratd_toGBP"
    ));
    assert!(err.to_string().contains("exchange rates"));
}

#[test]
fn test_write_ids_deduplicates() {
    let path = scratch_path("gvkeys.txt");
    let values = vec![Some("12"), Some("7"), None, Some("12"), Some("3")];

    let outcome = write_ids(values, &path, ExportPolicy::Enabled).unwrap();

    assert_eq!(
        outcome,
        ExportOutcome::Written {
            path: path.clone(),
            count: 3
        }
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), "12\n7\n3\n");
}

#[test]
fn test_write_ids_suppressed_writes_nothing() {
    let path = scratch_path("suppressed.txt");
    let _ = fs::remove_file(&path);

    let outcome = write_ids(vec![Some(1), Some(2)], &path, ExportPolicy::Disabled).unwrap();

    assert_eq!(outcome, ExportOutcome::Suppressed { path: path.clone() });
    assert!(!path.exists());
}
