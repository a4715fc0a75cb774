use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use visit_rollup::builder::Builder;
use visit_rollup::*;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_xlsx;
pub mod schema;

use crate::report::config_reader::*;
use crate::report::io_common::*;
use crate::report::io_csv::read_csv_table;
use crate::report::io_xlsx::read_xlsx_table;
use crate::report::schema::*;

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {name} not found in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("The file {path} has no header"))]
    EmptyFile { path: String },
    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing line {lineno} of the CSV file"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the report to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Missing required columns: {columns:?}"))]
    MissingColumns { columns: Vec<String> },
    #[snafu(display("Cannot read the date {value:?} (expected YYYY-MM-DD)"))]
    InvalidDate { value: String },
    #[snafu(display("Reporting period ends ({end}) before it starts ({start})"))]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
    #[snafu(display("Cannot read the stage weights {value}: four non-negative numbers are expected"))]
    InvalidWeights { value: String },
    #[snafu(display("The reporting period must be given (--period-start and --period-end)"))]
    MissingPeriod {},
    #[snafu(display("No visit file: use --visits or a configuration file with visit sources"))]
    NoVisitSource {},
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("The computation failed: {source}"))]
    Engine { source: RollupError },
    #[snafu(display("The report differs from the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReportResult<T> = Result<T, ReportError>;
pub type BReportResult<T> = Result<T, Box<ReportError>>;

/// Everything a run needs, once the command line and the configuration file
/// are merged.
#[derive(PartialEq, Debug, Clone)]
pub struct ReportSettings {
    pub report_name: String,
    pub visit_sources: Vec<FileSource>,
    pub registry_source: Option<FileSource>,
    pub params: ReportingParams,
    /// A file path or `stdout`. Nothing means `stdout`.
    pub output_path: Option<String>,
    pub reference_path: Option<String>,
}

/// Merges the command line options with the configuration file, if any. The
/// command line wins.
pub fn read_settings(args: &Args) -> BReportResult<ReportSettings> {
    let (config, root): (Option<RunConfig>, PathBuf) = match &args.config {
        Some(p) => {
            let config = read_run_config(p)?;
            let root = Path::new(p)
                .parent()
                .context(MissingParentDirSnafu {})?
                .to_path_buf();
            (Some(config), root)
        }
        None => (None, PathBuf::new()),
    };
    debug!("read_settings: config: {:?} root: {:?}", config, root);

    let visit_sources: Vec<FileSource> = match &args.visits {
        Some(p) => vec![FileSource::from_path(
            p,
            args.input_type.clone(),
            args.excel_worksheet_name.clone(),
        )],
        None => config
            .as_ref()
            .map(|c| {
                c.visit_sources
                    .iter()
                    .map(|s| s.relative_to(&root))
                    .collect()
            })
            .unwrap_or_default(),
    };
    if visit_sources.is_empty() {
        return Err(Box::new(ReportError::NoVisitSource {}));
    }

    let registry_source: Option<FileSource> = match &args.registry {
        Some(p) => Some(FileSource::from_path(p, args.input_type.clone(), None)),
        None => config
            .as_ref()
            .and_then(|c| c.registry_source.as_ref())
            .map(|s| s.relative_to(&root)),
    };

    let period = config.as_ref().and_then(|c| c.period.clone());
    let start_s = args
        .period_start
        .clone()
        .or_else(|| period.as_ref().and_then(|p| p.start_date.clone()));
    let end_s = args
        .period_end
        .clone()
        .or_else(|| period.as_ref().and_then(|p| p.end_date.clone()));
    let (period_start, period_end) = match (start_s, end_s) {
        (Some(s), Some(e)) => (parse_date(&s)?, parse_date(&e)?),
        _ => return Err(Box::new(ReportError::MissingPeriod {})),
    };
    if period_end < period_start {
        return Err(Box::new(ReportError::InvalidPeriod {
            start: period_start,
            end: period_end,
        }));
    }

    let weights = match (&args.weights, config.as_ref().and_then(|c| c.stage_weights.as_ref())) {
        (Some(ws), _) => {
            let js: Vec<JSValue> = ws.iter().map(|w| JSValue::String(w.clone())).collect();
            parse_weights(&js)?
        }
        (None, Some(ws)) => parse_weights(ws)?,
        (None, None) => StageWeights::default(),
    };

    let output_settings = config.as_ref().and_then(|c| c.output_settings.clone());
    let output_path = match &args.out {
        Some(p) => Some(p.clone()),
        None => output_settings
            .as_ref()
            .and_then(|o| o.output_path.clone())
            .map(|p| {
                if p == "stdout" {
                    p
                } else {
                    root.join(p).display().to_string()
                }
            }),
    };
    let report_name = output_settings
        .and_then(|o| o.report_name)
        .unwrap_or_else(|| simplify_file_name(&visit_sources[0].file_path));

    Ok(ReportSettings {
        report_name,
        visit_sources,
        registry_source,
        params: ReportingParams {
            period_start,
            period_end,
            weights,
        },
        output_path,
        reference_path: args.reference.clone(),
    })
}

fn read_table(source: &FileSource) -> BReportResult<RawTable> {
    info!("Attempting to read file {:?}", source.file_path);
    match source.provider()? {
        Provider::Csv => read_csv_table(&source.file_path),
        Provider::Xlsx => {
            read_xlsx_table(&source.file_path, source.excel_worksheet_name.as_deref())
        }
    }
}

/// Reads and concatenates the visit files. The log only carries the columns
/// that all the files have.
pub fn read_visit_log(sources: &[FileSource]) -> BReportResult<VisitLog> {
    let mut fields: Option<BTreeSet<VisitField>> = None;
    let mut records: Vec<VisitRecord> = Vec::new();
    for source in sources.iter() {
        let table = read_table(source)?;
        let columns = resolve_columns(&table.headers, &VisitField::ALL, source.columns.as_ref())?;
        let file_name = simplify_file_name(&source.file_path);
        if !columns.missing.is_empty() {
            warn!(
                "read_visit_log: {}: no column found for {:?}",
                file_name, columns.missing
            );
        }
        let mut rows = visits_from_table(&table, &columns);
        if rows.na_rows > 0 {
            info!(
                "read_visit_log: {}: {} rows with N/A values",
                file_name, rows.na_rows
            );
        }
        fields = Some(match fields {
            Some(f) => f.intersection(&rows.fields).cloned().collect(),
            None => rows.fields,
        });
        records.append(&mut rows.records);
    }

    let fields: Vec<VisitField> = fields.unwrap_or_default().into_iter().collect();
    let mut builder = Builder::with_fields(&fields);
    for r in records {
        builder.add_record(r);
    }
    info!("read_visit_log: {} visits", builder.len());
    Ok(builder.build())
}

pub fn read_registry(source: &FileSource) -> BReportResult<ProjectRegistry> {
    let table = read_table(source)?;
    let columns = resolve_columns(&table.headers, &RegistryField::ALL, source.columns.as_ref())?;
    if !columns.missing.is_empty() {
        warn!(
            "read_registry: {}: no column found for {:?}",
            simplify_file_name(&source.file_path),
            columns.missing
        );
    }
    let registry = registry_from_table(&table, &columns)?;
    info!("read_registry: {} projects", registry.len());
    Ok(registry)
}

fn is_discrepancy(note: &DataQualityNote) -> bool {
    matches!(note, DataQualityNote::EnrichmentDiscrepancy { .. })
}

/// Logs the notes. Enrichment discrepancies come one per visit, so they are
/// only counted at the warning level.
fn log_diagnostics(diagnostics: &Diagnostics) -> usize {
    let mut discrepancies = 0;
    for note in diagnostics.notes.iter() {
        if is_discrepancy(note) {
            discrepancies += 1;
            debug!("data quality: {:?}", note);
        } else {
            warn!("data quality: {:?}", note);
        }
    }
    if discrepancies > 0 {
        warn!(
            "data quality: {} visits without a project code could not be matched in the registry",
            discrepancies
        );
    }
    let unspecified = diagnostics
        .record_flags
        .iter()
        .filter(|f| !f.unspecified.is_empty())
        .count();
    let no_date = diagnostics
        .record_flags
        .iter()
        .filter(|f| f.date_not_occurred)
        .count();
    info!(
        "data quality: {} visits with unspecified hierarchy values, {} visits without a date",
        unspecified, no_date
    );
    discrepancies
}

pub fn build_report_js(settings: &ReportSettings, result: &RollupResult) -> ReportResult<JSValue> {
    let c = OutputConfig {
        report: settings.report_name.clone(),
        period_start: settings.params.period_start,
        period_end: settings.params.period_end,
        stage_weights: settings.params.weights.0,
    };
    let fingerprint = result.fingerprint().context(ParsingJsonSnafu {})?;
    Ok(json!({
        "config": c,
        "rows": result.rows,
        "diagnostics": result.diagnostics,
        "fingerprint": fingerprint
    }))
}

/// Reads the inputs and computes the report.
pub fn compute_report(settings: &ReportSettings) -> BReportResult<JSValue> {
    let visits = read_visit_log(&settings.visit_sources)?;
    let registry = match &settings.registry_source {
        Some(source) => Some(read_registry(source)?),
        None => {
            warn!("compute_report: no project registry, no project will carry a plan");
            None
        }
    };
    let ctx = RollupContext {
        visits: &visits,
        registry: registry.as_ref(),
        params: &settings.params,
    };
    let result = run_rollup(&ctx).context(EngineSnafu {})?;
    log_diagnostics(&result.diagnostics);
    let js = build_report_js(settings, &result)?;
    Ok(js)
}

pub fn run_report(args: &Args) -> BReportResult<()> {
    let settings = read_settings(args)?;
    info!("settings: {:?}", settings);

    let report_js = compute_report(&settings)?;
    let pretty_js_report = serde_json::to_string_pretty(&report_js).context(ParsingJsonSnafu {})?;

    match settings.output_path.as_deref() {
        None | Some("") | Some("stdout") => println!("{}", pretty_js_report),
        Some(p) => {
            fs::write(p, &pretty_js_report).context(WritingOutputSnafu { path: p })?;
            info!("report written to {}", p);
        }
    }

    // The reference report, if provided for comparison
    if let Some(reference_p) = &settings.reference_path {
        let reference = read_reference(reference_p)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_report {
            warn!("Found differences with the reference report");
            print_diff(
                pretty_js_reference.as_str(),
                pretty_js_report.as_ref(),
                "\n",
            );
            return Err(Box::new(ReportError::ReferenceMismatch {
                path: reference_p.clone(),
            }));
        }
        info!("the report matches the reference {}", reference_p);
    }
    Ok(())
}
