mod config;
use log::{debug, info};

use std::borrow::Cow;

pub use crate::config::*;

pub mod aggregate;
pub mod builder;
pub mod hierarchy;
pub mod manual;
pub mod metrics;
pub mod rollup;
pub mod stages;

use crate::aggregate::aggregate_leaves;
use crate::hierarchy::{build_hierarchy, check_schema, enrich_project_codes, record_flags};
use crate::metrics::compute_metrics;
use crate::rollup::{check_consistency, rollup, GroupRow};

impl RollupResult {
    /// A digest of the output table. Two runs over the same inputs give the
    /// same fingerprint.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let js = serde_json::to_string(&self.rows)?;
        Ok(sha256::digest(js))
    }

    pub fn rows_at(&self, level: Level) -> impl Iterator<Item = &HierarchyNode> {
        self.rows.iter().filter(move |r| r.level == level)
    }
}

fn to_node(row: &GroupRow, params: &ReportingParams) -> HierarchyNode {
    let segment = |idx: usize| {
        row.prefix
            .get(idx)
            .cloned()
            .unwrap_or_else(|| TOTAL.to_string())
    };
    HierarchyNode {
        level: row.level,
        project: segment(0),
        client: segment(1),
        wave: segment(2),
        region: segment(3),
        dsm: segment(4),
        asm: segment(5),
        rs: segment(6),
        portal: row.meta.portal.clone(),
        start_date: row.meta.start,
        end_date: row.meta.end,
        duration: row.meta.duration,
        figures: row.figures,
        metrics: compute_metrics(&row.figures, &row.meta, params.period_end),
    }
}

fn check_params(params: &ReportingParams) -> Result<(), RollupError> {
    if params.period_end < params.period_start {
        return Err(RollupError::InvalidPeriod {
            start: params.period_start,
            end: params.period_end,
        });
    }
    if params.weights.0.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(RollupError::InvalidWeights(params.weights));
    }
    Ok(())
}

/// Runs the plan/fact computation over a visit log.
///
/// The visits are grouped by hierarchy path, the plan of every path is
/// spread over the stages of its project, the facts are counted, and both
/// are rolled up to the project level. Every row then gets its metrics.
///
/// Arguments:
/// * `ctx` the visit log, the registry snapshot (if any) and the reporting
/// parameters. Without a registry, no project carries a plan.
///
/// ```
/// use visit_rollup::*;
/// use visit_rollup::builder::Builder;
/// use chrono::NaiveDate;
///
/// let mut builder = Builder::new();
/// builder.add_visit_simple(
///     ["P1", "Acme", "Wave 1", "North", "Smith", "Jones", "Brown"],
///     VisitStatus::Completed,
///     NaiveDate::from_ymd_opt(2024, 5, 3),
/// );
/// let log = builder.build();
/// let params = ReportingParams {
///     period_start: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
///     period_end: NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
///     weights: StageWeights::EQUAL,
/// };
/// let res = run_rollup(&RollupContext { visits: &log, registry: None, params: &params })?;
///
/// // One leaf and one row for each of the six levels above it.
/// assert_eq!(res.rows.len(), 7);
/// assert_eq!(res.rows_at(Level::Project).next().unwrap().figures.fact_for_project, 1);
/// # Ok::<(), RollupError>(())
/// ```
pub fn run_rollup(ctx: &RollupContext) -> Result<RollupResult, RollupError> {
    let params = ctx.params;
    info!(
        "run_rollup: processing {} visits, registry: {:?} projects, period: {} to {}, weights: {:?}",
        ctx.visits.records.len(),
        ctx.registry.map(|r| r.len()),
        params.period_start,
        params.period_end,
        params.weights.0
    );
    check_params(params)?;
    check_schema(ctx.visits)?;
    if ctx.visits.records.is_empty() {
        return Err(RollupError::EmptyVisitLog);
    }

    let mut diagnostics = Diagnostics::default();

    let visits: Cow<VisitLog> = match ctx.registry {
        Some(registry) => {
            let (log, stats, notes) = enrich_project_codes(ctx.visits, registry);
            diagnostics.enrichment = stats;
            diagnostics.notes.extend(notes);
            Cow::Owned(log)
        }
        None => Cow::Borrowed(ctx.visits),
    };

    diagnostics.record_flags = record_flags(&visits);
    debug!(
        "run_rollup: {} records raised flags",
        diagnostics.record_flags.len()
    );

    let (hierarchy, notes) = build_hierarchy(&visits, ctx.registry)?;
    diagnostics.notes.extend(notes);

    let leaves = aggregate_leaves(&visits, &hierarchy, params);
    let groups = rollup(&leaves);
    if let Some(note) = check_consistency(&groups) {
        diagnostics.notes.push(note);
    }

    let rows: Vec<HierarchyNode> = groups.iter().map(|g| to_node(g, params)).collect();
    info!(
        "run_rollup: {} rows, {} in focus, {} data quality notes",
        rows.len(),
        rows.iter().filter(|r| r.metrics.focus).count(),
        diagnostics.notes.len()
    );
    Ok(RollupResult { rows, diagnostics })
}
