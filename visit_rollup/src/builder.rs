pub use crate::config::*;

use std::collections::BTreeSet;

use chrono::NaiveDate;

/// A builder for assembling a visit log.
///
/// Readers feed it one record at a time; the resulting log is immutable.
///
/// ```
/// use visit_rollup::builder::Builder;
/// use visit_rollup::{VisitField, VisitStatus};
/// use chrono::NaiveDate;
///
/// let mut builder = Builder::new();
/// builder.add_visit_simple(
///     ["P1", "Acme", "Wave 1", "North", "Smith", "Jones", "Brown"],
///     VisitStatus::Completed,
///     NaiveDate::from_ymd_opt(2024, 5, 3),
/// );
/// let log = builder.build();
///
/// assert_eq!(log.records.len(), 1);
/// assert!(log.fields.contains(&VisitField::Rs));
/// ```
pub struct Builder {
    pub(crate) _fields: BTreeSet<VisitField>,
    pub(crate) _records: Vec<VisitRecord>,
}

impl Builder {
    /// A builder for a log that carries every column.
    pub fn new() -> Builder {
        Builder::with_fields(&VisitField::ALL)
    }

    /// A builder for a log that only carries some of the columns, as
    /// resolved from the headers of a file.
    pub fn with_fields(fields: &[VisitField]) -> Builder {
        Builder {
            _fields: fields.iter().cloned().collect(),
            _records: Vec::new(),
        }
    }

    /// Adds a visit given its hierarchy values (project first, RS last).
    ///
    /// A missing date means that the visit has not happened yet.
    pub fn add_visit_simple(
        &mut self,
        path: [&str; 7],
        status: VisitStatus,
        date: Option<NaiveDate>,
    ) {
        let visit_date = match date {
            Some(d) => VisitDate::from_date(d),
            None => VisitDate::NotYet,
        };
        self.add_record(VisitRecord::new(path, status, visit_date));
    }

    pub fn add_record(&mut self, record: VisitRecord) {
        self._records.push(record);
    }

    pub fn len(&self) -> usize {
        self._records.len()
    }

    pub fn is_empty(&self) -> bool {
        self._records.is_empty()
    }

    pub fn build(self) -> VisitLog {
        VisitLog {
            fields: self._fields,
            records: self._records,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}
