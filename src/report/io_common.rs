use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Duration, NaiveDate};

use crate::report::schema::{ColumnMap, RegistryField};
use crate::report::*;

/// Tokens that stand for a missing value in the source files.
pub const NA_TOKENS: [&str; 12] = [
    "н/д", "n/a", "#н/д", "na", "-", "—", "–", "nan", "none", "null", "#n/a", "#value!",
];

/// A cell of an input table, whatever the format of the file.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

/// A table as read from a file: the first row gives the headers.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

fn is_na(s: &str) -> bool {
    let l = s.to_lowercase();
    NA_TOKENS.contains(&l.as_str())
}

/// The text of a cell, trimmed. Blank cells and N/A tokens give None.
pub fn clean_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Text(s) => {
            let t = s.trim();
            if t.is_empty() || is_na(t) {
                None
            } else {
                Some(t.to_string())
            }
        }
        // Codes typed as numbers in a spreadsheet come back as floats.
        Cell::Number(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Some(format!("{}", *f as i64))
        }
        Cell::Number(f) => Some(f.to_string()),
        Cell::Empty => None,
    }
}

/// The serial number of 9999-12-31, the last date Excel knows.
const LAST_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Converts an Excel serial number to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=LAST_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Reads a date written as YYYY-MM-DD, DD.MM.YYYY or DD/MM/YYYY. A time of
/// day after the date is ignored.
pub fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let day_part = s.split_whitespace().next()?;
    let day_part = day_part.split('T').next()?;
    ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y.%m.%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day_part, fmt).ok())
}

/// The date of a cell, if it holds one.
pub fn date_from_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Number(f) => excel_serial_to_date(*f),
        Cell::Text(_) => clean_text(cell).and_then(|s| {
            parse_date_text(&s).or_else(|| s.parse::<f64>().ok().and_then(excel_serial_to_date))
        }),
        Cell::Empty => None,
    }
}

/// The date of a visit. Anything that is not a usable date means that the
/// visit has not taken place.
pub fn visit_date_from_cell(cell: &Cell) -> VisitDate {
    match date_from_cell(cell) {
        Some(d) => VisitDate::from_date(d),
        None => VisitDate::NotYet,
    }
}

pub fn parse_status(s: &str) -> VisitStatus {
    match s.trim().to_lowercase().as_str() {
        "завершено" | "выполнено" | "completed" | "done" => VisitStatus::Completed,
        "назначено" | "назначен" | "assigned" => VisitStatus::Assigned,
        _ => VisitStatus::Other,
    }
}

/// The records of a visit table, with the fields that the table carries.
#[derive(PartialEq, Debug, Clone)]
pub struct VisitRows {
    pub fields: BTreeSet<VisitField>,
    pub records: Vec<VisitRecord>,
    /// Number of rows with at least one N/A token.
    pub na_rows: usize,
}

fn cell_at(row: &[Cell], idx: Option<usize>) -> &Cell {
    idx.and_then(|i| row.get(i)).unwrap_or(&Cell::Empty)
}

fn has_na_token(row: &[Cell]) -> bool {
    row.iter().any(|c| match c {
        Cell::Text(s) => is_na(s.trim()),
        _ => false,
    })
}

pub fn visits_from_table(table: &RawTable, columns: &ColumnMap<VisitField>) -> VisitRows {
    let mut records: Vec<VisitRecord> = Vec::new();
    let mut na_rows = 0;
    for row in table.rows.iter() {
        if row.iter().all(|c| clean_text(c).is_none()) {
            continue;
        }
        if has_na_token(row) {
            na_rows += 1;
        }
        let text = |f: VisitField| clean_text(cell_at(row, columns.get(f)));
        let status = text(VisitField::Status)
            .map(|s| parse_status(&s))
            .unwrap_or(VisitStatus::Other);
        let visit_date = visit_date_from_cell(cell_at(row, columns.get(VisitField::VisitDate)));
        records.push(VisitRecord {
            project_code: text(VisitField::ProjectCode),
            client: text(VisitField::Client),
            wave: text(VisitField::Wave),
            region: text(VisitField::Region),
            dsm: text(VisitField::Dsm),
            asm: text(VisitField::Asm),
            rs: text(VisitField::Rs),
            status,
            visit_date,
        });
    }
    VisitRows {
        fields: columns.indices.keys().cloned().collect(),
        records,
        na_rows,
    }
}

/// Builds the registry. The first row of a project code wins.
pub fn registry_from_table(
    table: &RawTable,
    columns: &ColumnMap<RegistryField>,
) -> ReportResult<ProjectRegistry> {
    if !columns.contains(RegistryField::ProjectCode) {
        return MissingColumnsSnafu {
            columns: vec!["projectCode".to_string()],
        }
        .fail();
    }
    let mut registry = ProjectRegistry::new();
    let mut duplicates = 0;
    for row in table.rows.iter() {
        let text = |f: RegistryField| clean_text(cell_at(row, columns.get(f)));
        let date = |f: RegistryField| date_from_cell(cell_at(row, columns.get(f)));
        let code = match text(RegistryField::ProjectCode) {
            Some(c) => c,
            None => continue,
        };
        let info = ProjectInfo {
            portal: text(RegistryField::Portal)
                .map(|p| Portal::parse(&p))
                .unwrap_or(Portal::Unknown),
            start: date(RegistryField::StartDate),
            end: date(RegistryField::EndDate),
            client: text(RegistryField::Client),
            wave: text(RegistryField::Wave),
        };
        if !registry.insert(&code, info) {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        warn!(
            "registry_from_table: {} duplicate project rows ignored",
            duplicates
        );
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::schema::resolve_columns;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn na_tokens() {
        assert_eq!(clean_text(&text(" Н/Д ")), None);
        assert_eq!(clean_text(&text("nan")), None);
        assert_eq!(clean_text(&text("—")), None);
        assert_eq!(clean_text(&text("  ")), None);
        assert_eq!(clean_text(&text(" Brown ")), Some("Brown".to_string()));
        assert_eq!(clean_text(&Cell::Number(1234.0)), Some("1234".to_string()));
        assert_eq!(
            clean_text(&Cell::Number(1e19)),
            Some("10000000000000000000".to_string())
        );
    }

    #[test]
    fn dates() {
        assert_eq!(excel_serial_to_date(45413.0), Some(d(2024, 5, 1)));
        assert_eq!(excel_serial_to_date(45413.75), Some(d(2024, 5, 1)));
        assert_eq!(excel_serial_to_date(0.0), None);
        assert_eq!(parse_date_text("2024-05-01"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date_text("01.05.2024 10:30"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date_text("01/05/2024"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date_text("2024-05-01T08:00:00"), Some(d(2024, 5, 1)));
        assert_eq!(parse_date_text("soon"), None);
        assert_eq!(excel_serial_to_date(2_958_465.0), Some(d(9999, 12, 31)));
        assert_eq!(excel_serial_to_date(2_958_466.0), None);
    }

    #[test]
    fn huge_serials_are_not_dates() {
        assert_eq!(excel_serial_to_date(1e16), None);
        assert_eq!(date_from_cell(&Cell::Number(1e16)), None);
        assert_eq!(date_from_cell(&text("99999999999999999")), None);
        assert_eq!(
            visit_date_from_cell(&text("99999999999999999")),
            VisitDate::NotYet
        );
        assert_eq!(visit_date_from_cell(&Cell::Number(1e16)), VisitDate::NotYet);
    }

    #[test]
    fn visit_dates() {
        assert_eq!(
            visit_date_from_cell(&text("03.05.2024")),
            VisitDate::Occurred(d(2024, 5, 3))
        );
        assert_eq!(visit_date_from_cell(&text("1900-01-01")), VisitDate::NotYet);
        assert_eq!(visit_date_from_cell(&text("н/д")), VisitDate::NotYet);
        assert_eq!(visit_date_from_cell(&text("garbage")), VisitDate::NotYet);
        assert_eq!(visit_date_from_cell(&Cell::Empty), VisitDate::NotYet);
        assert_eq!(
            visit_date_from_cell(&Cell::Number(45415.0)),
            VisitDate::Occurred(d(2024, 5, 3))
        );
    }

    #[test]
    fn statuses() {
        assert_eq!(parse_status("Завершено"), VisitStatus::Completed);
        assert_eq!(parse_status(" completed "), VisitStatus::Completed);
        assert_eq!(parse_status("Назначено"), VisitStatus::Assigned);
        assert_eq!(parse_status("Отменено"), VisitStatus::Other);
    }

    #[test]
    fn visit_table() {
        let table = RawTable {
            headers: vec!["Код анкеты".to_string(), "ЭМ".to_string(), "Статус".to_string()],
            rows: vec![
                vec![text("P1"), text("Brown"), text("Завершено")],
                vec![text(""), text("Н/Д"), Cell::Empty],
                vec![Cell::Empty, Cell::Empty, Cell::Empty],
            ],
        };
        let cols = resolve_columns(&table.headers, &VisitField::ALL, None).unwrap();
        let rows = visits_from_table(&table, &cols);
        assert_eq!(rows.records.len(), 2);
        assert_eq!(rows.na_rows, 1);
        assert_eq!(rows.fields.len(), 3);
        assert!(!rows.fields.contains(&VisitField::Region));
        assert_eq!(rows.records[0].rs, Some("Brown".to_string()));
        assert_eq!(rows.records[0].status, VisitStatus::Completed);
        assert_eq!(rows.records[1].project_code, None);
        assert_eq!(rows.records[1].rs, None);
        assert_eq!(rows.records[1].status, VisitStatus::Other);
    }

    #[test]
    fn registry_table() {
        let table = RawTable {
            headers: vec![
                "Код проекта".to_string(),
                "Портал".to_string(),
                "Дата старта".to_string(),
                "Дата финиша".to_string(),
            ],
            rows: vec![
                vec![text(" P1 "), text("checker"), text("2024-05-01"), Cell::Number(45443.0)],
                vec![text("P1"), text("CXWAY"), text("2024-06-01"), text("2024-06-30")],
                vec![text("P2"), Cell::Empty, text("н/д"), text("2024-06-30")],
            ],
        };
        let cols = resolve_columns(&table.headers, &RegistryField::ALL, None).unwrap();
        let reg = registry_from_table(&table, &cols).unwrap();
        assert_eq!(reg.len(), 2);
        let p1 = reg.get("P1").unwrap();
        assert_eq!(p1.portal, Portal::Checker);
        assert_eq!(p1.start, Some(d(2024, 5, 1)));
        assert_eq!(p1.end, Some(d(2024, 5, 31)));
        let p2 = reg.get("P2").unwrap();
        assert_eq!(p2.portal, Portal::Unknown);
        assert_eq!(p2.start, None);
    }

    #[test]
    fn registry_without_codes() {
        let table = RawTable {
            headers: vec!["Портал".to_string()],
            rows: vec![],
        };
        let cols = resolve_columns(&table.headers, &RegistryField::ALL, None).unwrap();
        assert!(registry_from_table(&table, &cols).is_err());
    }
}
