// ********* Input data structures ***********

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::Display;
use std::ops::AddAssign;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

/// Placeholder for a hierarchy value that is missing in a visit record.
pub const UNSPECIFIED: &str = "unspecified";

/// Placeholder for the hierarchy fields below the level of an aggregated row.
pub const TOTAL: &str = "Total";

/// The columns of a visit log that the engine relies on.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VisitField {
    ProjectCode,
    Client,
    Wave,
    Region,
    Dsm,
    Asm,
    Rs,
    Status,
    VisitDate,
}

impl VisitField {
    pub const ALL: [VisitField; 9] = [
        VisitField::ProjectCode,
        VisitField::Client,
        VisitField::Wave,
        VisitField::Region,
        VisitField::Dsm,
        VisitField::Asm,
        VisitField::Rs,
        VisitField::Status,
        VisitField::VisitDate,
    ];

    /// The fields forming a hierarchy path, root first.
    pub const HIERARCHY: [VisitField; 7] = [
        VisitField::ProjectCode,
        VisitField::Client,
        VisitField::Wave,
        VisitField::Region,
        VisitField::Dsm,
        VisitField::Asm,
        VisitField::Rs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VisitField::ProjectCode => "project code",
            VisitField::Client => "client",
            VisitField::Wave => "wave",
            VisitField::Region => "region",
            VisitField::Dsm => "DSM",
            VisitField::Asm => "ASM",
            VisitField::Rs => "RS",
            VisitField::Status => "status",
            VisitField::VisitDate => "visit date",
        }
    }
}

impl Display for VisitField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The status of a visit, normalized once at ingestion.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VisitStatus {
    /// The only status counted as a fact.
    Completed,
    /// The visit still needs to be assigned to a field worker.
    Assigned,
    Other,
}

/// When a visit took place.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum VisitDate {
    Occurred(NaiveDate),
    /// The sentinel for a visit that has not happened yet.
    NotYet,
}

impl VisitDate {
    /// Wraps a calendar date. The surrogate date 1900-01-01 used by the
    /// upstream exports means "not yet occurred".
    pub fn from_date(date: NaiveDate) -> VisitDate {
        if date.year() == 1900 && date.ordinal() == 1 {
            VisitDate::NotYet
        } else {
            VisitDate::Occurred(date)
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            VisitDate::Occurred(d) => Some(*d),
            VisitDate::NotYet => None,
        }
    }
}

/// One planned or actual field visit.
///
/// A hierarchy value set to `None` is replaced by [UNSPECIFIED] when the
/// hierarchy is built.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VisitRecord {
    pub project_code: Option<String>,
    pub client: Option<String>,
    pub wave: Option<String>,
    pub region: Option<String>,
    pub dsm: Option<String>,
    pub asm: Option<String>,
    pub rs: Option<String>,
    pub status: VisitStatus,
    pub visit_date: VisitDate,
}

impl VisitRecord {
    /// Creates a record from the hierarchy values (project first, RS last).
    /// Blank values are treated as missing.
    pub fn new(path: [&str; 7], status: VisitStatus, visit_date: VisitDate) -> VisitRecord {
        let v = |s: &str| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        };
        VisitRecord {
            project_code: v(path[0]),
            client: v(path[1]),
            wave: v(path[2]),
            region: v(path[3]),
            dsm: v(path[4]),
            asm: v(path[5]),
            rs: v(path[6]),
            status,
            visit_date,
        }
    }

    pub fn hierarchy_value(&self, field: VisitField) -> Option<&str> {
        match field {
            VisitField::ProjectCode => self.project_code.as_deref(),
            VisitField::Client => self.client.as_deref(),
            VisitField::Wave => self.wave.as_deref(),
            VisitField::Region => self.region.as_deref(),
            VisitField::Dsm => self.dsm.as_deref(),
            VisitField::Asm => self.asm.as_deref(),
            VisitField::Rs => self.rs.as_deref(),
            VisitField::Status | VisitField::VisitDate => None,
        }
    }
}

/// A collection of visit records together with the columns that were
/// present in the source.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct VisitLog {
    pub fields: BTreeSet<VisitField>,
    pub records: Vec<VisitRecord>,
}

/// The system of record hosting the field data of a project.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub enum Portal {
    Checker,
    Cxway,
    Other(String),
    Unknown,
}

impl Portal {
    pub fn parse(s: &str) -> Portal {
        let t = s.trim();
        match t.to_lowercase().as_str() {
            "" | "unknown" => Portal::Unknown,
            "checker" => Portal::Checker,
            "cxway" => Portal::Cxway,
            _ => Portal::Other(t.to_string()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Portal::Unknown)
    }
}

impl Display for Portal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Portal::Checker => write!(f, "Checker"),
            Portal::Cxway => write!(f, "CXWAY"),
            Portal::Other(s) => write!(f, "{}", s),
            Portal::Unknown => write!(f, "unknown"),
        }
    }
}

impl Serialize for Portal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reference data about a project, as provided by the project registry.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProjectInfo {
    pub portal: Portal,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Client and wave names, used to recover missing project codes.
    pub client: Option<String>,
    pub wave: Option<String>,
}

/// A read-only snapshot of the project registry, keyed by project code.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, ProjectInfo>,
}

impl ProjectRegistry {
    pub fn new() -> ProjectRegistry {
        ProjectRegistry::default()
    }

    /// Registers a project. The first entry for a code wins: returns false
    /// if the code was already present.
    pub fn insert(&mut self, code: &str, info: ProjectInfo) -> bool {
        let key = code.trim().to_string();
        if self.projects.contains_key(&key) {
            return false;
        }
        self.projects.insert(key, info);
        true
    }

    pub fn get(&self, code: &str) -> Option<&ProjectInfo> {
        self.projects.get(code)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProjectInfo)> {
        self.projects.iter()
    }

    /// All the projects registered under exactly this client and wave name.
    pub fn find_by_client_wave(&self, client: &str, wave: &str) -> Vec<(&String, &ProjectInfo)> {
        self.projects
            .iter()
            .filter(|(_, p)| {
                p.client.as_deref().map(str::trim) == Some(client.trim())
                    && p.wave.as_deref().map(str::trim) == Some(wave.trim())
            })
            .collect()
    }
}

// ********* Configuration **********

/// The relative share of the total plan given to each of the four stages.
/// The weights do not need to sum to 1.
#[derive(PartialEq, Debug, Clone, Copy, Serialize)]
pub struct StageWeights(pub [f64; 4]);

impl StageWeights {
    pub const EQUAL: StageWeights = StageWeights([1.0, 1.0, 1.0, 1.0]);
}

impl Default for StageWeights {
    fn default() -> Self {
        StageWeights::EQUAL
    }
}

/// The parameters chosen by the caller for one run.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingParams {
    /// First day of the reporting window (inclusive).
    pub period_start: NaiveDate,
    /// Last day of the reporting window (inclusive).
    pub period_end: NaiveDate,
    pub weights: StageWeights,
}

/// Everything one run of the engine reads. All the inputs are immutable
/// snapshots for the duration of the run.
#[derive(Debug, Clone, Copy)]
pub struct RollupContext<'a> {
    pub visits: &'a VisitLog,
    pub registry: Option<&'a ProjectRegistry>,
    pub params: &'a ReportingParams,
}

// ******** Output data structures *********

/// A level of the organizational hierarchy, from the finest grain to the
/// coarsest.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize)]
pub enum Level {
    #[serde(rename = "RS")]
    Rs,
    #[serde(rename = "ASM")]
    Asm,
    #[serde(rename = "DSM")]
    Dsm,
    Region,
    Wave,
    Client,
    Project,
}

impl Level {
    /// Leaf first.
    pub const ALL: [Level; 7] = [
        Level::Rs,
        Level::Asm,
        Level::Dsm,
        Level::Region,
        Level::Wave,
        Level::Client,
        Level::Project,
    ];

    /// The number of path segments (from the project down) that identify a
    /// row at this level.
    pub fn depth(&self) -> usize {
        match self {
            Level::Project => 1,
            Level::Client => 2,
            Level::Wave => 3,
            Level::Region => 4,
            Level::Dsm => 5,
            Level::Asm => 6,
            Level::Rs => 7,
        }
    }
}

/// The 7-tuple identifying one reporting leaf.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct HierarchyPath {
    pub project: String,
    pub client: String,
    pub wave: String,
    pub region: String,
    pub dsm: String,
    pub asm: String,
    pub rs: String,
}

impl HierarchyPath {
    /// The segments of the path, project first.
    pub fn segments(&self) -> [&str; 7] {
        [
            &self.project,
            &self.client,
            &self.wave,
            &self.region,
            &self.dsm,
            &self.asm,
            &self.rs,
        ]
    }

    pub fn prefix(&self, level: Level) -> Vec<String> {
        self.segments()
            .iter()
            .take(level.depth())
            .map(|s| s.to_string())
            .collect()
    }
}

/// Project metadata attached to a hierarchy row.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProjectMeta {
    pub portal: Portal,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// end - start + 1, or 0 when a date is missing.
    pub duration: u32,
}

impl ProjectMeta {
    pub const UNKNOWN: ProjectMeta = ProjectMeta {
        portal: Portal::Unknown,
        start: None,
        end: None,
        duration: 0,
    };
}

/// The summed plan and fact figures of a row.
#[derive(PartialEq, Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Figures {
    pub plan_for_period: f64,
    pub plan_for_project: f64,
    pub fact_for_period: u64,
    pub fact_for_project: u64,
    /// Visits in the "assigned" status. Not used by the metrics.
    pub to_assign: u64,
}

impl AddAssign for Figures {
    fn add_assign(&mut self, rhs: Figures) {
        self.plan_for_period += rhs.plan_for_period;
        self.plan_for_project += rhs.plan_for_project;
        self.fact_for_period += rhs.fact_for_period;
        self.fact_for_project += rhs.fact_for_project;
        self.to_assign += rhs.to_assign;
    }
}

/// Indicators derived from the figures of a row.
#[derive(PartialEq, Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub percent_of_period: f64,
    pub delta_for_period: f64,
    pub percent_of_project: f64,
    pub delta_for_project: f64,
    pub forecast_quantity: f64,
    pub forecast_percent: f64,
    pub days_spent: u32,
    pub days_remaining: u32,
    pub time_utilization_percent: f64,
    pub daily_plan_for_completion: f64,
    pub focus: bool,
}

/// One row of the output table.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub level: Level,
    pub project: String,
    pub client: String,
    pub wave: String,
    pub region: String,
    pub dsm: String,
    pub asm: String,
    pub rs: String,
    pub portal: Portal,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration: u32,
    #[serde(flatten)]
    pub figures: Figures,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// A finding about the input data that does not stop the run.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataQualityNote {
    ProjectNotInRegistry {
        project: String,
    },
    ProjectMissingDates {
        project: String,
    },
    ProjectEndsBeforeStart {
        project: String,
    },
    #[serde(rename_all = "camelCase")]
    RollupMismatch {
        leaf_total: f64,
        root_total: f64,
    },
    EnrichmentDiscrepancy {
        row: usize,
        client: Option<String>,
        wave: Option<String>,
    },
}

/// Per-record flags, in the order of the visit log.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFlags {
    pub row: usize,
    /// The hierarchy fields replaced by the "unspecified" marker.
    pub unspecified: Vec<VisitField>,
    pub date_not_occurred: bool,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize)]
pub struct EnrichmentStats {
    pub processed: usize,
    pub filled: usize,
    pub unmatched: usize,
}

/// The companion of the output table.
#[derive(PartialEq, Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub notes: Vec<DataQualityNote>,
    /// Only the records with at least one flag raised.
    pub record_flags: Vec<RecordFlags>,
    pub enrichment: EnrichmentStats,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RollupResult {
    /// RS rows first, then each coarser level. Within a level, rows are
    /// ordered by path.
    pub rows: Vec<HierarchyNode>,
    pub diagnostics: Diagnostics,
}

/// Errors that prevent the engine from completing.
#[derive(PartialEq, Debug, Clone)]
pub enum RollupError {
    /// A required column is absent from the visit log.
    MissingField(VisitField),
    EmptyVisitLog,
    InvalidPeriod { start: NaiveDate, end: NaiveDate },
    InvalidWeights(StageWeights),
}

impl Error for RollupError {}

impl Display for RollupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollupError::MissingField(field) => {
                write!(f, "the visit log has no {} column", field)
            }
            RollupError::EmptyVisitLog => write!(f, "the visit log is empty"),
            RollupError::InvalidPeriod { start, end } => {
                write!(f, "reporting period ends ({}) before it starts ({})", end, start)
            }
            RollupError::InvalidWeights(w) => {
                write!(f, "stage weights must be finite and non-negative: {:?}", w.0)
            }
        }
    }
}
