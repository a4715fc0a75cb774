use std::collections::BTreeMap;

use log::{debug, warn};

use crate::aggregate::{round1, LeafRow};
use crate::config::*;

/// The tolerance of the consistency check between the leaves and the
/// projects.
pub const ROLLUP_TOLERANCE: f64 = 0.1;

/// One row of the rolled up table, before the metrics are computed.
#[derive(PartialEq, Debug, Clone)]
pub struct GroupRow {
    pub level: Level,
    /// The path segments that identify the row, project first. Its length is
    /// the depth of the level.
    pub prefix: Vec<String>,
    pub meta: ProjectMeta,
    pub figures: Figures,
}

struct Group<'a> {
    first: &'a ProjectMeta,
    portals: Vec<&'a Portal>,
    figures: Figures,
}

/// The most frequent known portal. Ties go to the portal seen first.
pub fn portal_mode<'a>(portals: impl Iterator<Item = &'a Portal>) -> Portal {
    // (count, first position)
    let mut counts: BTreeMap<&Portal, (usize, usize)> = BTreeMap::new();
    for (idx, p) in portals.filter(|p| !p.is_unknown()).enumerate() {
        let e = counts.entry(p).or_insert((0, idx));
        e.0 += 1;
    }
    counts
        .iter()
        .max_by(|(_, (c1, i1)), (_, (c2, i2))| c1.cmp(c2).then(i2.cmp(i1)))
        .map(|(p, _)| (*p).clone())
        .unwrap_or(Portal::Unknown)
}

/// Groups the leaves by the prefix of one level and sums their figures.
fn rollup_level(leaves: &[LeafRow], level: Level) -> Vec<GroupRow> {
    let mut groups: BTreeMap<Vec<String>, Group> = BTreeMap::new();
    for leaf in leaves.iter() {
        let g = groups.entry(leaf.path.prefix(level)).or_insert(Group {
            first: &leaf.meta,
            portals: Vec::new(),
            figures: Figures::default(),
        });
        g.portals.push(&leaf.meta.portal);
        g.figures += leaf.figures;
    }
    debug!("rollup_level: {:?}: {} groups", level, groups.len());

    groups
        .into_iter()
        .map(|(prefix, g)| {
            let mut figures = g.figures;
            // Sums of rounded values: round again to drop the float noise.
            figures.plan_for_period = round1(figures.plan_for_period);
            figures.plan_for_project = round1(figures.plan_for_project);
            GroupRow {
                level,
                prefix,
                meta: ProjectMeta {
                    portal: portal_mode(g.portals.into_iter()),
                    ..g.first.clone()
                },
                figures,
            }
        })
        .collect()
}

/// Rolls the leaves up through every level of the hierarchy.
///
/// The output starts with the leaves themselves (RS level), followed by one
/// block per coarser level.
pub fn rollup(leaves: &[LeafRow]) -> Vec<GroupRow> {
    let mut res: Vec<GroupRow> = leaves
        .iter()
        .map(|l| GroupRow {
            level: Level::Rs,
            prefix: l.path.prefix(Level::Rs),
            meta: l.meta.clone(),
            figures: l.figures,
        })
        .collect();
    for level in Level::ALL.iter().skip(1) {
        res.extend(rollup_level(leaves, *level));
    }
    res
}

/// Compares the plan for the period summed over the leaves with the same
/// sum over the projects.
pub fn check_consistency(rows: &[GroupRow]) -> Option<DataQualityNote> {
    let total = |level: Level| -> f64 {
        rows.iter()
            .filter(|r| r.level == level)
            .map(|r| r.figures.plan_for_period)
            .sum()
    };
    let leaf_total = total(Level::Rs);
    let root_total = total(Level::Project);
    if (leaf_total - root_total).abs() > ROLLUP_TOLERANCE {
        warn!(
            "check_consistency: plan for the period differs between leaves ({}) and projects ({})",
            leaf_total, root_total
        );
        Some(DataQualityNote::RollupMismatch {
            leaf_total,
            root_total,
        })
    } else {
        None
    }
}
