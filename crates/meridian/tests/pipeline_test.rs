//! End-to-end pipeline runs over CSV fixtures written to a scratch directory.

use approx::assert_relative_eq;
use meridian::data::{DataError, Dataset, ExportOutcome, ExportPolicy};
use meridian::panel::SecurityColumn;
use meridian::{InputPaths, Pipeline, PipelineConfig, PipelineError, Stage};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meridian_{}_{name}", std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Year and month `offset` months after January 2020.
fn month(offset: i32) -> (i32, u32) {
    let index = 2020 * 12 + offset;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn fixtures(dir: &Path, with_shares: bool) -> InputPaths {
    let mut securities = if with_shares {
        "gvkey,iid,datadate,curcdm,prccm,ajexm,trfm,cshom\n".to_string()
    } else {
        "gvkey,iid,datadate,curcdm,prccm,ajexm,trfm\n".to_string()
    };
    for i in 0..14 {
        let (y, m) = month(i);
        let x = f64::from(i);
        for (issue, close) in [
            ("01", 20.0 + 2.0 * (x * 1.1).sin() + 0.2 * x),
            ("02", 50.0 + 3.0 * (x * 0.7).cos() - 0.1 * x),
        ] {
            write!(securities, "001004,{issue},{y}-{m:02}-28,USD,{close:.4},1,1").unwrap();
            if with_shares {
                securities.push_str(",1000");
            }
            securities.push('\n');
        }
    }

    let mut rates = "curd,datadate,exratd_toUSD,exratd_toGBP\n".to_string();
    let mut market = "datadate,prccm\n".to_string();
    for i in -1..14 {
        let (y, m) = month(i);
        let x = f64::from(i);
        writeln!(rates, "USD,{y}-{m:02}-28,1.0,0.8").unwrap();
        writeln!(market, "{y}{m:02}28,{:.4}", 1000.0 + 40.0 * (x * 1.1).sin() + 3.0 * x).unwrap();
    }

    let fundamentals = "gvkey,fyear,curcd,at,ceq,oiadp,revt\n\
        001004,2019,USD,100,50,10,40\n\
        001004,2020,USD,120,60,12,48\n\
        001004,2020,USD,130,60,12,99\n";
    let emissions = "institutionid,companyid,companyname,gvkey,fiscalyear,periodenddate,scope1\n\
        I1,C1,Acme,001004,2020,2020-12-31,5.5\n\
        I2,C2,Other,002000,2020,2020-12-31,7.0\n\
        I1,C1,Acme,001004,2019,2019-12-31,\n";
    let mapping = "companyid,gvkey,startdate,enddate\nC1,001004,B,E\nC2,002000,X,E\n";

    InputPaths {
        securities: write(dir, "securities.csv", &securities),
        exchange_rates: write(dir, "rates.csv", &rates),
        market_index: write(dir, "market.csv", &market),
        fundamentals: Some(write(dir, "fundamentals.csv", fundamentals)),
        emissions: Some(write(dir, "emissions.csv", emissions)),
        entity_mapping: Some(write(dir, "mapping.csv", mapping)),
    }
}

fn config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig {
        inputs: fixtures(dir, true),
        ..Default::default()
    };
    // Two finalized rows would sit on the quantile bounds
    config.outliers.columns.clear();
    config.output.directory = dir.join("out");
    config
}

#[test]
fn test_full_run_from_csv() {
    let dir = scratch_dir("full_run");
    let pipeline = Pipeline::new(config(&dir));

    let mut stages = Vec::new();
    let output = pipeline.run_with_progress(|stage| stages.push(stage)).unwrap();

    assert_eq!(stages.first(), Some(&Stage::Loading));
    assert_eq!(stages.last(), Some(&Stage::Linking));
    assert!(stages.contains(&Stage::Fundamentals));

    // Beta needs 12 returns (row 13); the guard moves it to row 14
    assert_eq!(output.securities.len(), 2);
    assert_eq!(output.securities.series_count(), 2);
    for record in output.securities.records() {
        assert_eq!(record.entity_id.as_str(), "1004");
        assert_eq!(record.period.to_string(), "2021-02");
        assert_relative_eq!(record.usd_fx_return, 0.0, epsilon = 1e-12);
        assert_relative_eq!(record.usd_return, record.local_return, epsilon = 1e-9);
        assert!(record.beta.is_finite());
    }

    // The first 2020 report wins over the later duplicate
    assert_eq!(output.fundamentals.len(), 1);
    let fundamentals = &output.fundamentals[0];
    assert_eq!(fundamentals.fiscal_year, 2020);
    assert_relative_eq!(fundamentals.revenue, 48.0, epsilon = 1e-9);
    assert_relative_eq!(fundamentals.investment, 20.0, epsilon = 1e-9);
    assert_relative_eq!(fundamentals.operating_profitability, 0.25, epsilon = 1e-12);

    assert_eq!(output.emissions.len(), 1);
    assert_eq!(output.emissions[0].metrics["scope1"], 5.5);

    assert_eq!(output.linked_fundamentals.len(), 2);
    assert_eq!(output.linked_emissions.len(), 2);
    assert!(
        output
            .linked_fundamentals
            .iter()
            .all(|l| l.security.prior_year == l.annual.fiscal_year)
    );

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_missing_required_column_is_fatal() {
    let dir = scratch_dir("missing_column");
    let mut config = config(&dir);
    config.inputs = fixtures(&dir, false);

    let err = Pipeline::new(config).run().unwrap_err();
    match err {
        PipelineError::Data(DataError::MissingColumn { dataset, column }) => {
            assert_eq!(dataset, Dataset::Securities);
            assert_eq!(column, "cshom");
        }
        other => panic!("unexpected error: {other}"),
    }

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_emissions_without_mapping_rejected() {
    let dir = scratch_dir("no_mapping");
    let mut config = config(&dir);
    config.inputs.entity_mapping = None;

    assert!(matches!(
        Pipeline::new(config).run(),
        Err(PipelineError::MissingInput("entity_mapping"))
    ));

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_export_follows_policy() {
    let dir = scratch_dir("export");
    let mut config = config(&dir);
    let output = Pipeline::new(config.clone()).run().unwrap();

    let suppressed = output.export(&config.output).unwrap();
    assert_eq!(suppressed.len(), 2);
    assert!(
        suppressed
            .iter()
            .all(|o| matches!(o, ExportOutcome::Suppressed { .. }))
    );
    assert!(!config.output.directory.exists());

    config.output.export = ExportPolicy::Enabled;
    let written = output.export(&config.output).unwrap();
    assert_eq!(
        written[0],
        ExportOutcome::Written {
            path: config.output.directory.join("securities.csv"),
            count: 2
        }
    );
    let securities = std::fs::read_to_string(config.output.directory.join("securities.csv")).unwrap();
    assert_eq!(securities.lines().count(), 3);
    assert!(
        securities
            .lines()
            .next()
            .unwrap()
            .ends_with(",market_return,beta,data_year,prior_year")
    );
    let content = std::fs::read_to_string(config.output.directory.join("fundamentals.csv")).unwrap();
    assert!(content.starts_with("entity_id,fiscal_year,reporting_currency"));
    assert_eq!(content.lines().count(), 2);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_export_keeps_retained_columns_only() {
    let dir = scratch_dir("export_projection");
    let mut config = config(&dir);
    config.output.keep_columns = Some(vec![SecurityColumn::Beta, SecurityColumn::UsdMarketValue]);
    config.output.export = ExportPolicy::Enabled;
    let output = Pipeline::new(config.clone()).run().unwrap();

    output.export(&config.output).unwrap();
    let content = std::fs::read_to_string(config.output.directory.join("securities.csv")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "entity_id,issue_id,period,beta,usd_market_value");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("1004,01,2021-02,"));
    assert_eq!(lines[1].split(',').count(), 5);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn test_summary_uses_retained_columns() {
    let dir = scratch_dir("summary");
    let mut config = config(&dir);
    config.output.keep_columns = Some(vec![SecurityColumn::Beta, SecurityColumn::UsdMarketValue]);
    let output = Pipeline::new(config.clone()).run().unwrap();

    let summaries = output.summaries(&config.output).unwrap();
    assert_eq!(summaries.len(), 2);
    let securities = &summaries[0];
    assert_eq!(securities.rows, 2);
    assert_eq!(securities.series, 2);
    assert_eq!(securities.columns.len(), 2);
    assert_eq!(securities.first_period.as_deref(), Some("2021-02"));
    assert_eq!(summaries[1].series, 1);

    std::fs::remove_dir_all(dir).ok();
}
