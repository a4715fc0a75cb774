use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};

use crate::config::*;

/// A distinct hierarchy path observed in the visit log, with the metadata of
/// its project.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct HierarchyRow {
    pub path: HierarchyPath,
    pub meta: ProjectMeta,
}

/// Fails on the first required column that the visit log does not carry.
pub fn check_schema(log: &VisitLog) -> Result<(), RollupError> {
    for field in VisitField::ALL.iter() {
        if !log.fields.contains(field) {
            return Err(RollupError::MissingField(*field));
        }
    }
    Ok(())
}

/// The leaf path of a record. Missing values are replaced by the
/// "unspecified" marker; the second element lists the fields that were.
pub fn leaf_path(record: &VisitRecord) -> (HierarchyPath, Vec<VisitField>) {
    let mut missing: Vec<VisitField> = Vec::new();
    let mut get = |field: VisitField| match record.hierarchy_value(field) {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            missing.push(field);
            UNSPECIFIED.to_string()
        }
    };
    let path = HierarchyPath {
        project: get(VisitField::ProjectCode),
        client: get(VisitField::Client),
        wave: get(VisitField::Wave),
        region: get(VisitField::Region),
        dsm: get(VisitField::Dsm),
        asm: get(VisitField::Asm),
        rs: get(VisitField::Rs),
    };
    (path, missing)
}

/// Resolves the metadata of a project from the registry. The second element
/// is set when the project cannot carry a plan.
pub fn project_meta(
    code: &str,
    registry: Option<&ProjectRegistry>,
) -> (ProjectMeta, Option<DataQualityNote>) {
    let info = match registry.and_then(|r| r.get(code)) {
        Some(x) => x,
        None => {
            return (
                ProjectMeta::UNKNOWN,
                Some(DataQualityNote::ProjectNotInRegistry {
                    project: code.to_string(),
                }),
            )
        }
    };
    let mut meta = ProjectMeta {
        portal: info.portal.clone(),
        start: info.start,
        end: info.end,
        duration: 0,
    };
    let note = match meta.window() {
        None => Some(DataQualityNote::ProjectMissingDates {
            project: code.to_string(),
        }),
        Some(w) if w.duration() == 0 => Some(DataQualityNote::ProjectEndsBeforeStart {
            project: code.to_string(),
        }),
        Some(w) => {
            meta.duration = w.duration();
            None
        }
    };
    (meta, note)
}

/// Extracts the distinct hierarchy paths of the visit log, ordered by path,
/// and attaches the project metadata to each of them.
pub fn build_hierarchy(
    log: &VisitLog,
    registry: Option<&ProjectRegistry>,
) -> Result<(Vec<HierarchyRow>, Vec<DataQualityNote>), RollupError> {
    check_schema(log)?;

    let paths: BTreeSet<HierarchyPath> = log.records.iter().map(|r| leaf_path(r).0).collect();

    let mut metas: BTreeMap<String, ProjectMeta> = BTreeMap::new();
    let mut notes: Vec<DataQualityNote> = Vec::new();
    for path in paths.iter() {
        if metas.contains_key(&path.project) {
            continue;
        }
        let (meta, note) = project_meta(&path.project, registry);
        if let Some(n) = note {
            warn!("build_hierarchy: no plan for project {}: {:?}", path.project, n);
            notes.push(n);
        }
        metas.insert(path.project.clone(), meta);
    }

    let mut rows: Vec<HierarchyRow> = Vec::new();
    for path in paths {
        let meta = metas
            .get(&path.project)
            .cloned()
            .unwrap_or(ProjectMeta::UNKNOWN);
        rows.push(HierarchyRow { path, meta });
    }
    info!(
        "build_hierarchy: {} leaf paths across {} projects",
        rows.len(),
        metas.len()
    );
    Ok((rows, notes))
}

/// The flags raised by each record, skipping the records with none.
pub fn record_flags(log: &VisitLog) -> Vec<RecordFlags> {
    log.records
        .iter()
        .enumerate()
        .filter_map(|(row, r)| {
            let (_, unspecified) = leaf_path(r);
            let date_not_occurred = r.visit_date == VisitDate::NotYet;
            if unspecified.is_empty() && !date_not_occurred {
                None
            } else {
                Some(RecordFlags {
                    row,
                    unspecified,
                    date_not_occurred,
                })
            }
        })
        .collect()
}

/// Fills in the missing project codes by looking up the client and wave of
/// the record in the registry.
///
/// Returns a new visit log. A record is only filled when exactly one
/// registry entry matches.
pub fn enrich_project_codes(
    log: &VisitLog,
    registry: &ProjectRegistry,
) -> (VisitLog, EnrichmentStats, Vec<DataQualityNote>) {
    let mut stats = EnrichmentStats::default();
    let mut notes: Vec<DataQualityNote> = Vec::new();
    let mut records: Vec<VisitRecord> = Vec::with_capacity(log.records.len());

    for (row, r) in log.records.iter().enumerate() {
        let has_code = r
            .project_code
            .as_deref()
            .map(|c| !c.trim().is_empty())
            .unwrap_or(false);
        if has_code {
            records.push(r.clone());
            continue;
        }
        stats.processed += 1;
        let found: Option<String> = match (r.client.as_deref(), r.wave.as_deref()) {
            (Some(client), Some(wave)) => match registry.find_by_client_wave(client, wave).as_slice() {
                [(code, _)] if !code.is_empty() => Some(code.to_string()),
                _ => None,
            },
            _ => None,
        };
        match found {
            Some(code) => {
                debug!("enrich_project_codes: row {} -> {}", row, code);
                stats.filled += 1;
                records.push(VisitRecord {
                    project_code: Some(code),
                    ..r.clone()
                });
            }
            None => {
                stats.unmatched += 1;
                notes.push(DataQualityNote::EnrichmentDiscrepancy {
                    row,
                    client: r.client.clone(),
                    wave: r.wave.clone(),
                });
                records.push(r.clone());
            }
        }
    }
    if stats.processed > 0 {
        info!(
            "enrich_project_codes: processed: {} filled: {} unmatched: {}",
            stats.processed, stats.filled, stats.unmatched
        );
    }
    (
        VisitLog {
            fields: log.fields.clone(),
            records,
        },
        stats,
        notes,
    )
}
