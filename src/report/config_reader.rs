use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use crate::report::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "reportName")]
    pub report_name: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
}

/// The description of the report, as written in the output.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub report: String,
    #[serde(rename = "periodStart")]
    pub period_start: NaiveDate,
    #[serde(rename = "periodEnd")]
    pub period_end: NaiveDate,
    #[serde(rename = "stageWeights")]
    pub stage_weights: [f64; 4],
}

/// The type of an input file.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    Csv,
    Xlsx,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    /// Column key (such as `rs` or `startDate`) to the header of the column in the file.
    pub columns: Option<BTreeMap<String, String>>,
}

impl FileSource {
    pub fn from_path(
        path: &str,
        provider: Option<String>,
        excel_worksheet_name: Option<String>,
    ) -> FileSource {
        FileSource {
            provider,
            file_path: path.to_string(),
            excel_worksheet_name,
            columns: None,
        }
    }

    /// The provider, or the one implied by the file extension if none was
    /// given: xlsx for `.xlsx` files, csv otherwise.
    pub fn provider(&self) -> ReportResult<Provider> {
        let p = match self.provider.clone() {
            Some(p) => p.to_lowercase(),
            None => {
                let ext = Path::new(&self.file_path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase());
                match ext.as_deref() {
                    Some("xlsx") => "xlsx".to_string(),
                    _ => "csv".to_string(),
                }
            }
        };
        match p.as_str() {
            "csv" => Ok(Provider::Csv),
            "xlsx" | "excel" => Ok(Provider::Xlsx),
            _ => whatever!(
                "unknown input type {:?} for file {}: use csv or xlsx",
                p,
                self.file_path
            ),
        }
    }

    /// The same source, with its path resolved against the given directory.
    pub fn relative_to(&self, root: &Path) -> FileSource {
        FileSource {
            file_path: root.join(&self.file_path).display().to_string(),
            ..self.clone()
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PeriodConfig {
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    #[serde(rename = "visitSources", default)]
    pub visit_sources: Vec<FileSource>,
    #[serde(rename = "registrySource")]
    pub registry_source: Option<FileSource>,
    pub period: Option<PeriodConfig>,
    #[serde(rename = "stageWeights")]
    pub stage_weights: Option<Vec<JSValue>>,
}

pub fn read_run_config(path: &str) -> BReportResult<RunConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: RunConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

/// Reads a reference report.
pub fn read_reference(path: &str) -> BReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Parses a date of the command line or the configuration file (YYYY-MM-DD).
pub fn parse_date(s: &str) -> ReportResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .context(InvalidDateSnafu { value: s })
}

fn read_js_float(x: &JSValue) -> ReportResult<f64> {
    let f = match x {
        JSValue::Number(n) => n.as_f64(),
        JSValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.context(InvalidWeightsSnafu {
        value: x.to_string(),
    })
}

/// Reads the four stage weights, given either as JSON numbers or as strings.
pub fn parse_weights(xs: &[JSValue]) -> ReportResult<StageWeights> {
    let values = xs
        .iter()
        .map(read_js_float)
        .collect::<ReportResult<Vec<f64>>>()?;
    match values.as_slice() {
        [a, b, c, d] if values.iter().all(|w| w.is_finite() && *w >= 0.0) => {
            Ok(StageWeights([*a, *b, *c, *d]))
        }
        _ => InvalidWeightsSnafu {
            value: format!("{:?}", values),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_config() {
        let js = r#"{
            "outputSettings": {"reportName": "May", "outputPath": "out.json"},
            "visitSources": [
                {"provider": "xlsx", "filePath": "visits.xlsx", "excelWorksheetName": "Sheet1",
                 "columns": {"rs": "Мерчендайзер"}}
            ],
            "registrySource": {"filePath": "registry.csv"},
            "period": {"startDate": "2024-05-01", "endDate": "2024-05-31"},
            "stageWeights": [1, "2", 1.5, 0]
        }"#;
        let c: RunConfig = serde_json::from_str(js).unwrap();
        assert_eq!(c.visit_sources.len(), 1);
        let vs = &c.visit_sources[0];
        assert_eq!(vs.provider().unwrap(), Provider::Xlsx);
        assert_eq!(
            vs.columns.as_ref().unwrap().get("rs"),
            Some(&"Мерчендайзер".to_string())
        );
        let reg = c.registry_source.unwrap();
        assert_eq!(reg.provider().unwrap(), Provider::Csv);
        assert_eq!(
            parse_weights(&c.stage_weights.unwrap()).unwrap(),
            StageWeights([1.0, 2.0, 1.5, 0.0])
        );
    }

    #[test]
    fn minimal_config() {
        let c: RunConfig = serde_json::from_str("{}").unwrap();
        assert!(c.visit_sources.is_empty());
        assert_eq!(c.period, None);
    }

    #[test]
    fn provider_from_extension() {
        let fs = FileSource::from_path("data/Visits.XLSX", None, None);
        assert_eq!(fs.provider().unwrap(), Provider::Xlsx);
        let fs = FileSource::from_path("data/visits.txt", None, None);
        assert_eq!(fs.provider().unwrap(), Provider::Csv);
        let fs = FileSource::from_path("data/visits.txt", Some("ods".to_string()), None);
        assert!(fs.provider().is_err());
    }

    #[test]
    fn relative_paths() {
        let fs = FileSource::from_path("visits.csv", None, None);
        let p = fs.relative_to(Path::new("/data/may"));
        assert_eq!(Path::new(&p.file_path), Path::new("/data/may/visits.csv"));
    }

    #[test]
    fn dates() {
        assert_eq!(
            parse_date(" 2024-05-31").unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()
        );
        assert!(parse_date("31.05.2024").is_err());
    }

    #[test]
    fn invalid_weights() {
        assert!(parse_weights(&[json!(1), json!(1), json!(1)]).is_err());
        assert!(parse_weights(&[json!(1), json!(-1), json!(1), json!(1)]).is_err());
        assert!(parse_weights(&[json!(1), json!("x"), json!(1), json!(1)]).is_err());
        assert!(parse_weights(&[json!(1), json!(true), json!(1), json!(1)]).is_err());
    }
}
