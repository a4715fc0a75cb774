// Primitives for reading Excel files.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::report::io_common::{Cell, RawTable};
use crate::report::*;

fn get_range(path: &str, worksheet_name: Option<&str>) -> BReportResult<Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    let wrange_o = match worksheet_name {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    };
    let wrange = wrange_o
        .context(MissingWorksheetSnafu {
            name: worksheet_name.unwrap_or("(first)"),
            path,
        })?
        .context(OpeningExcelSnafu { path })?;
    Ok(wrange)
}

fn read_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::String(s) if s.trim().is_empty() => Cell::Empty,
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::DateTime(f) => Cell::Number(*f),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        _ => Cell::Empty,
    }
}

fn header_text(cell: &DataType) -> String {
    match read_cell(cell) {
        Cell::Text(s) => s,
        Cell::Number(f) => f.to_string(),
        Cell::Empty => String::new(),
    }
}

pub fn read_xlsx_table(path: &str, worksheet_name: Option<&str>) -> BReportResult<RawTable> {
    let wrange = get_range(path, worksheet_name)?;
    let mut iter = wrange.rows();
    let headers: Vec<String> = match iter.next() {
        Some(header) => header.iter().map(header_text).collect(),
        None => {
            return Err(Box::new(ReportError::EmptyFile {
                path: path.to_string(),
            }))
        }
    };
    debug!("read_xlsx_table: header: {:?}", headers);

    let rows: Vec<Vec<Cell>> = iter.map(|row| row.iter().map(read_cell).collect()).collect();
    info!(
        "read_xlsx_table: {}: {} columns, {} rows",
        simplify_file_name(path),
        headers.len(),
        rows.len()
    );
    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(read_cell(&DataType::String(" ".to_string())), Cell::Empty);
        assert_eq!(
            read_cell(&DataType::String("P1".to_string())),
            Cell::Text("P1".to_string())
        );
        assert_eq!(read_cell(&DataType::Int(3)), Cell::Number(3.0));
        assert_eq!(read_cell(&DataType::DateTime(45413.0)), Cell::Number(45413.0));
        assert_eq!(read_cell(&DataType::Empty), Cell::Empty);
        assert_eq!(header_text(&DataType::String("ЭМ".to_string())), "ЭМ");
    }

    #[test]
    fn missing_file() {
        let res = read_xlsx_table("/nonexistent/planfact/visits.xlsx", None);
        assert!(matches!(
            res.map_err(|e| *e),
            Err(ReportError::OpeningExcel { .. })
        ));
    }
}
