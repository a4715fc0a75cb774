//! Plan and fact figures for the hierarchy leaves.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;

use crate::config::*;
use crate::hierarchy::{leaf_path, HierarchyRow};
use crate::stages::allocate;

/// Counts of the visit records of one leaf.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct VisitTally {
    /// All the records of the leaf, whatever their status. This is the plan.
    pub planned: u64,
    pub fact_for_period: u64,
    pub fact_for_project: u64,
    pub to_assign: u64,
}

/// A leaf of the hierarchy with its figures.
#[derive(PartialEq, Debug, Clone)]
pub struct LeafRow {
    pub path: HierarchyPath,
    pub meta: ProjectMeta,
    pub figures: Figures,
}

/// Rounds to one decimal place.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn in_period(date: NaiveDate, from: NaiveDate, to: NaiveDate) -> bool {
    from <= date && date <= to
}

/// Counts the records of each leaf in a single pass over the visit log.
///
/// Only completed visits that took place count as facts; the period count is
/// further restricted to the visits dated inside [from, to].
pub fn tally_visits(
    log: &VisitLog,
    from: NaiveDate,
    to: NaiveDate,
) -> BTreeMap<HierarchyPath, VisitTally> {
    let mut res: BTreeMap<HierarchyPath, VisitTally> = BTreeMap::new();
    for r in log.records.iter() {
        let (path, _) = leaf_path(r);
        let t = res.entry(path).or_default();
        t.planned += 1;
        match (r.status, r.visit_date) {
            (VisitStatus::Completed, VisitDate::Occurred(d)) => {
                t.fact_for_project += 1;
                if in_period(d, from, to) {
                    t.fact_for_period += 1;
                }
            }
            (VisitStatus::Assigned, _) => {
                t.to_assign += 1;
            }
            _ => {}
        }
    }
    res
}

/// The plan of one leaf: (plan for the period, plan for the project), both
/// rounded to one decimal place.
pub fn leaf_plan(planned: u64, meta: &ProjectMeta, params: &ReportingParams) -> (f64, f64) {
    let schedule = allocate(planned as f64, meta.window(), &params.weights);
    (
        round1(schedule.plan_within(params.period_start, params.period_end)),
        round1(schedule.plan_total()),
    )
}

/// Computes the plan and fact figures of every leaf of the hierarchy.
pub fn aggregate_leaves(
    log: &VisitLog,
    hierarchy: &[HierarchyRow],
    params: &ReportingParams,
) -> Vec<LeafRow> {
    let tallies = tally_visits(log, params.period_start, params.period_end);
    hierarchy
        .iter()
        .map(|row| {
            let t = tallies.get(&row.path).cloned().unwrap_or_default();
            let (plan_for_period, plan_for_project) = leaf_plan(t.planned, &row.meta, params);
            let figures = Figures {
                plan_for_period,
                plan_for_project,
                fact_for_period: t.fact_for_period,
                fact_for_project: t.fact_for_project,
                to_assign: t.to_assign,
            };
            debug!("aggregate_leaves: {:?} -> {:?}", row.path, figures);
            LeafRow {
                path: row.path.clone(),
                meta: row.meta.clone(),
                figures,
            }
        })
        .collect()
}
