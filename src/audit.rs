use log::{debug, info, warn};

use ballot_audit::*;
use snafu::{prelude::*, Snafu};

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::ReportArgs;
use crate::audit::config_reader::*;
use crate::audit::store::{BatchTable, ResultStore};

pub mod config_reader;
pub mod io_archive;
pub mod io_common;
pub mod io_official;
pub mod store;

#[derive(Debug, Snafu)]
pub enum AuditError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error listing directory {path}"))]
    ReadingDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error opening archive {path}"))]
    OpeningArchive {
        source: zip::result::ZipError,
        path: String,
    },
    #[snafu(display("Error reading entry {index} of archive {path}"))]
    ArchiveEntry {
        source: zip::result::ZipError,
        path: String,
        index: usize,
    },
    #[snafu(display("Error extracting {entry} from archive {path}"))]
    ExtractingEntry {
        source: std::io::Error,
        path: String,
        entry: String,
    },
    #[snafu(display("Error decoding the image of ballot {ballot}"))]
    DecodingImage {
        source: image::ImageError,
        ballot: String,
    },
    #[snafu(display("Cannot read batch {path}: only .zip and .pbm files are supported"))]
    UnknownBatchType { path: String },
    #[snafu(display("The stored batch {path} is corrupted: {reason}"))]
    CorruptedBatch { path: String, reason: String },
    #[snafu(display("Error opening CSV file {path}"))]
    OpeningCsv { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file {path} has no sheet or no rows"))]
    EmptyExcel { path: String },
    #[snafu(display("Cannot read official results {path}: only .csv and .xlsx files are supported"))]
    UnknownOfficialFormat { path: String },
    #[snafu(display("Missing column {column} in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Line {lineno}, column {column}: {content:?} is not a vote count"))]
    InvalidCount {
        lineno: usize,
        column: String,
        content: String,
    },
    #[snafu(display("Missing {name}: it must be set in the configuration file or on the command line"))]
    MissingThreshold { name: String },
    #[snafu(display("Invalid configuration"))]
    InvalidConfig { source: ConfigError },
    #[snafu(display("Reconciliation failed"))]
    Reconcile { source: ReconcileError },
    #[snafu(display("Error starting {jobs} workers"))]
    ThreadPool {
        source: rayon::ThreadPoolBuildError,
        jobs: usize,
    },
    #[snafu(display("Difference detected between the summary and the reference summary {path}"))]
    ReferenceMismatch { path: String },
}

pub type AuditResult<T> = Result<T, AuditError>;
pub type BAuditResult<T> = Result<T, Box<AuditError>>;

/// Writes a table of counts: one row per precinct, one column per key.
/// Keys absent from a precinct are written as 0.
fn table_to_json<K: Ord + Clone + Display>(table: &PrecinctTable<K>) -> JSValue {
    let columns = table.columns();
    let mut rows: JSMap<String, JSValue> = JSMap::new();
    for tally in table.tallies() {
        let mut row: JSMap<String, JSValue> = JSMap::new();
        for c in columns.iter() {
            row.insert(c.to_string(), json!(tally.get(c)));
        }
        rows.insert(tally.precinct.clone(), JSValue::Object(row));
    }
    let column_names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    json!({ "columns": column_names, "precincts": rows })
}

fn thresholds_js(thresholds: &Thresholds) -> JSValue {
    json!({ "lowThreshold": thresholds.low(), "highThreshold": thresholds.high() })
}

fn build_tally_js(
    thresholds: &Thresholds,
    localities: &BTreeMap<String, PrecinctTable<Outcome>>,
) -> JSValue {
    let mut l: JSMap<String, JSValue> = JSMap::new();
    for (locality, table) in localities.iter() {
        l.insert(locality.clone(), table_to_json(table));
    }
    json!({ "config": thresholds_js(thresholds), "localities": l })
}

fn build_reconcile_js(
    thresholds: &Thresholds,
    ward_rules: &WardRules,
    audited: &PrecinctTable<Outcome>,
    rec: &Reconciliation,
) -> JSValue {
    let mut groups: Vec<JSValue> = Vec::new();
    for g in rec.groups.iter() {
        let mut official: JSMap<String, JSValue> = JSMap::new();
        let mut difference: JSMap<String, JSValue> = JSMap::new();
        for (candidate, count) in g.official.iter() {
            official.insert(candidate.clone(), json!(count));
            let audited_count = audited
                .count(&g.precinct, &Outcome::Candidate(candidate.clone()))
                .unwrap_or(0);
            difference.insert(
                candidate.clone(),
                json!(audited_count as i64 - *count as i64),
            );
        }
        let mut audited_counts: JSMap<String, JSValue> = JSMap::new();
        if let Some(t) = audited.get(&g.precinct) {
            for (outcome, count) in t.iter() {
                audited_counts.insert(outcome.to_string(), json!(count));
            }
        }
        groups.push(json!({
            "precinct": g.precinct,
            "wards": g.wards,
            "audited": audited_counts,
            "official": official,
            "difference": difference,
        }));
    }
    let unused: Vec<u32> = rec.unused_wards.iter().cloned().collect();
    json!({
        "config": {
            "lowThreshold": thresholds.low(),
            "highThreshold": thresholds.high(),
            "municipality": ward_rules.municipality,
            "wardUniverse": { "first": ward_rules.first_ward, "last": ward_rules.last_ward },
        },
        "precincts": groups,
        "unusedWards": unused,
    })
}

/// Classifies the ballots of each stored batch.
fn audited_tallies(tables: &[BatchTable], thresholds: &Thresholds) -> BAuditResult<Vec<PrecinctTally>> {
    let mut res: Vec<PrecinctTally> = Vec::new();
    for table in tables.iter() {
        let scans = table.scans()?;
        let tally = tally_precinct(&table.precinct, scans.iter(), thresholds);
        let summary: Vec<String> = tally.iter().map(|(o, c)| format!("{}: {}", o, c)).collect();
        info!(
            "audited_tallies: {}: {} ballots ({})",
            table.precinct,
            tally.total(),
            summary.join(", ")
        );
        res.push(tally);
    }
    Ok(res)
}

fn read_summary(path: &str) -> AuditResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_summary: {:?}", js);
    Ok(js)
}

fn check_reference(pretty_js: &str, path: &str) -> AuditResult<()> {
    let summary_ref = read_summary(path)?;
    let pretty_js_ref = serde_json::to_string_pretty(&summary_ref).context(WritingJsonSnafu {})?;
    if pretty_js_ref != pretty_js {
        warn!("Found differences with the reference summary");
        print_diff(pretty_js_ref.as_str(), pretty_js, "\n");
    }
    ensure!(pretty_js_ref == pretty_js, ReferenceMismatchSnafu { path });
    Ok(())
}

/// Writes the summary to the requested output, then compares it with the
/// reference if one was given.
fn emit_summary(js: &JSValue, report: &ReportArgs) -> BAuditResult<()> {
    let pretty_js = serde_json::to_string_pretty(js).context(WritingJsonSnafu {})?;
    match report.out.as_deref() {
        None | Some("") | Some("stdout") => println!("{}", pretty_js),
        Some(path) => {
            fs::write(path, &pretty_js).context(WritingFileSnafu { path })?;
            info!("emit_summary: summary written to {}", path);
        }
    }
    if let Some(path) = report.reference.as_deref() {
        check_reference(&pretty_js, path)?;
    }
    Ok(())
}

pub fn run_scan(
    input: &str,
    store_path: &str,
    jobs: Option<usize>,
    config_path: Option<&str>,
) -> BAuditResult<()> {
    let config = read_config(config_path)?;
    let settings = config.scan_settings()?;
    info!("run_scan: settings: {:?}", settings);
    let store = ResultStore::open(store_path)?;
    let batches = io_archive::scan_directory(input, &store, jobs.unwrap_or(0), &settings)?;
    info!("run_scan: {} batches in {}", batches.len(), store_path);
    Ok(())
}

pub fn run_tally(store_path: &str, report: &ReportArgs) -> BAuditResult<()> {
    let config = read_config(report.config.as_deref())?;
    let thresholds = config.thresholds(report.low, report.high)?;
    let store = ResultStore::open(store_path)?;
    let tables = store.all_batches()?;
    let tallies = audited_tallies(&tables, &thresholds)?;
    let localities =
        group_by_locality(tallies, LocalityKey::FirstToken).context(ReconcileSnafu {})?;
    emit_summary(&build_tally_js(&thresholds, &localities), report)
}

pub fn run_reconcile(store_path: &str, official_path: &str, report: &ReportArgs) -> BAuditResult<()> {
    let config = read_config(report.config.as_deref())?;
    let thresholds = config.thresholds(report.low, report.high)?;
    let ward_rules = config.ward_rules()?;

    let store = ResultStore::open(store_path)?;
    let tables = store.all_batches()?;
    let tallies = audited_tallies(&tables, &thresholds)?;
    let mut audited =
        group_by_locality(tallies, LocalityKey::FirstToken).context(ReconcileSnafu {})?;
    let audited_local = audited
        .remove(&ward_rules.municipality)
        .unwrap_or_default();

    let official = io_official::read_official_results(official_path)?;
    let mut official_groups = group_by_locality(official.tallies().cloned(), LocalityKey::SecondToken)
        .context(ReconcileSnafu {})?;
    let official_local = official_groups
        .remove(&ward_rules.municipality)
        .unwrap_or_default();
    info!(
        "run_reconcile: {} audited and {} official precincts for {}",
        audited_local.len(),
        official_local.len(),
        ward_rules.municipality
    );

    let rec = reconcile_city_wards(
        &official_local,
        audited_local.precincts().map(|s| s.as_str()),
        &ward_rules,
    )
    .context(ReconcileSnafu {})?;
    if !rec.unused_wards.is_empty() {
        warn!(
            "run_reconcile: wards without an audited precinct: {:?}",
            rec.unused_wards
        );
    }
    emit_summary(
        &build_reconcile_js(&thresholds, &ward_rules, &audited_local, &rec),
        report,
    )
}
