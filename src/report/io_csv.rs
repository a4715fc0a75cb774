// Primitives for reading CSV files.

use std::fs;

use crate::report::io_common::{Cell, RawTable};
use crate::report::*;

/// Semicolons are common in files exported with a Russian locale. The
/// separator that appears most often in the header line wins.
fn guess_delimiter(contents: &str) -> u8 {
    let first_line = contents.lines().next().unwrap_or("");
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

pub fn read_csv_table(path: &str) -> BReportResult<RawTable> {
    let contents = fs::read_to_string(path).context(ReadingFileSnafu { path })?;
    let contents = contents.trim_start_matches('\u{feff}');
    let delimiter = guess_delimiter(contents);
    debug!(
        "read_csv_table: path: {:?} delimiter: {:?}",
        path, delimiter as char
    );

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(contents.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu { lineno: 1_usize })?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers.is_empty() {
        return Err(Box::new(ReportError::EmptyFile {
            path: path.to_string(),
        }));
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let row: Vec<Cell> = line
            .iter()
            .map(|s| {
                if s.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(s.to_string())
                }
            })
            .collect();
        rows.push(row);
    }
    info!(
        "read_csv_table: {}: {} columns, {} rows",
        simplify_file_name(path),
        headers.len(),
        rows.len()
    );
    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_tmp(name: &str, contents: &str) -> String {
        let p: PathBuf = std::env::temp_dir().join(format!(
            "planfact-io-csv-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&p, contents).unwrap();
        p.display().to_string()
    }

    #[test]
    fn semicolon_file() {
        let p = write_tmp(
            "semicolon.csv",
            "\u{feff}Код анкеты;ЭМ;Дата визита\nP1;Brown;03.05.2024\nP2;;\n",
        );
        let t = read_csv_table(&p).unwrap();
        assert_eq!(t.headers, vec!["Код анкеты", "ЭМ", "Дата визита"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0][1], Cell::Text("Brown".to_string()));
        assert_eq!(t.rows[1][1], Cell::Empty);
    }

    #[test]
    fn comma_file_with_quotes() {
        let p = write_tmp(
            "comma.csv",
            "project code,client,RS\nP1,\"Acme, Inc.\",Brown\nP1,Acme\n",
        );
        let t = read_csv_table(&p).unwrap();
        assert_eq!(t.rows[0][1], Cell::Text("Acme, Inc.".to_string()));
        // Short lines are accepted.
        assert_eq!(t.rows[1].len(), 2);
    }

    #[test]
    fn missing_file() {
        let res = read_csv_table("/nonexistent/planfact/visits.csv");
        assert!(matches!(
            res.map_err(|e| *e),
            Err(ReportError::ReadingFile { .. })
        ));
    }
}
