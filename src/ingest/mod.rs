//! Activity input loading
//!
//! Reads CSV or JSON activity exports into `ActivityRecord`s. Source
//! columns are mapped onto the four canonical roles through ordered alias
//! lists, resolved once per file from its header (CSV) or first row (JSON).
//! The first alias present wins.
//!
//! JSON input may be a bare array of row objects, `{"rows": [...]}`, or
//! `{"result": {"rows": [...]}}`.

mod dates;

pub use dates::parse_activity_date;

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::models::ActivityRecord;

pub const USER_ID_ALIASES: &[&str] = &["user_id", "user_wallet", "gamer", "wallet"];
pub const PROJECT_ALIASES: &[&str] = &["project", "game"];
pub const ACTIVITY_DATE_ALIASES: &[&str] = &["activity_date", "day", "date"];
pub const TRANSACTION_COUNT_ALIASES: &[&str] = &[
    "transaction_count",
    "number_of_transactions",
    "daily_transactions",
    "tx_count",
];

/// Errors while loading an activity file
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid CSV in {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid JSON in {origin}: {source}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported layout in {origin}: {reason}")]
    Layout { origin: String, reason: String },

    #[error("Missing required column '{role}' in {origin} (accepted: {accepted})")]
    MissingColumn {
        origin: String,
        role: &'static str,
        accepted: String,
    },

    #[error("{origin} row {row}: cannot parse date '{value}'")]
    BadDate {
        origin: String,
        row: usize,
        value: String,
    },

    #[error("{origin} row {row}: invalid {role} '{value}'")]
    BadValue {
        origin: String,
        row: usize,
        role: &'static str,
        value: String,
    },
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Source column name chosen for each role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub user_id: String,
    pub project: String,
    pub activity_date: String,
    /// `None`: every record counts as one transaction
    pub transaction_count: Option<String>,
}

fn pick(columns: &[String], aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        columns
            .iter()
            .find(|c| c.trim().eq_ignore_ascii_case(alias))
            .cloned()
    })
}

impl ColumnMap {
    pub fn resolve(columns: &[String], origin: &str) -> IngestResult<Self> {
        let require = |role: &'static str, aliases: &[&str]| {
            pick(columns, aliases).ok_or_else(|| IngestError::MissingColumn {
                origin: origin.to_string(),
                role,
                accepted: aliases.join(", "),
            })
        };

        let map = Self {
            user_id: require("user_id", USER_ID_ALIASES)?,
            project: require("project", PROJECT_ALIASES)?,
            activity_date: require("activity_date", ACTIVITY_DATE_ALIASES)?,
            transaction_count: pick(columns, TRANSACTION_COUNT_ALIASES),
        };

        if map.transaction_count.is_none() {
            tracing::debug!("{}: no transaction count column, defaulting to 1 per row", origin);
        }
        Ok(map)
    }
}

/// Load a file, choosing the parser by extension (`.csv`, otherwise JSON).
pub fn load_activity(path: &Path) -> IngestResult<Vec<ActivityRecord>> {
    let origin = path.display().to_string();
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let records = if is_csv {
        let file = fs::File::open(path).map_err(|source| IngestError::Io {
            origin: origin.clone(),
            source,
        })?;
        parse_csv(file, &origin)?
    } else {
        let content = fs::read_to_string(path).map_err(|source| IngestError::Io {
            origin: origin.clone(),
            source,
        })?;
        parse_json(&content, &origin)?
    };

    tracing::info!("Loaded {} activity rows from {}", records.len(), origin);
    Ok(records)
}

pub fn parse_csv<R: Read>(reader: R, origin: &str) -> IngestResult<Vec<ActivityRecord>> {
    let csv_err = |source| IngestError::Csv {
        origin: origin.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(String::from)
        .collect();
    let map = ColumnMap::resolve(&headers, origin)?;
    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();
    let col = |name: &str| index.get(name).copied();

    let user_col = col(&map.user_id);
    let project_col = col(&map.project);
    let date_col = col(&map.activity_date);
    let tx_col = map.transaction_count.as_deref().and_then(col);

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.map_err(csv_err)?;
        let n = i + 1;
        let field = |c: Option<usize>| c.and_then(|c| row.get(c)).unwrap_or("");

        let tx = match tx_col {
            Some(c) => parse_count(row.get(c).unwrap_or(""), n, origin)?,
            None => 1,
        };
        records.push(build_record(
            field(user_col),
            field(project_col),
            field(date_col),
            tx,
            n,
            origin,
        )?);
    }
    Ok(records)
}

pub fn parse_json(content: &str, origin: &str) -> IngestResult<Vec<ActivityRecord>> {
    let value: Value = serde_json::from_str(content).map_err(|source| IngestError::Json {
        origin: origin.to_string(),
        source,
    })?;

    let rows = match &value {
        Value::Array(rows) => rows,
        Value::Object(obj) => obj
            .get("rows")
            .or_else(|| obj.get("result").and_then(|r| r.get("rows")))
            .and_then(Value::as_array)
            .ok_or_else(|| IngestError::Layout {
                origin: origin.to_string(),
                reason: "expected an array of rows, `rows` or `result.rows`".into(),
            })?,
        _ => {
            return Err(IngestError::Layout {
                origin: origin.to_string(),
                reason: "top-level value must be an array or object".into(),
            })
        }
    };

    let Some(first) = rows.first().and_then(Value::as_object) else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    let map = ColumnMap::resolve(&columns, origin)?;

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let n = i + 1;
        let obj = row.as_object().ok_or_else(|| IngestError::Layout {
            origin: origin.to_string(),
            reason: format!("row {n} is not an object"),
        })?;
        let text = |key: &str| obj.get(key).map(value_text).unwrap_or_default();

        let tx = match map.transaction_count.as_deref().and_then(|k| obj.get(k)) {
            None | Some(Value::Null) => 1,
            Some(v) => parse_count(&value_text(v), n, origin)?,
        };
        records.push(build_record(
            &text(&map.user_id),
            &text(&map.project),
            &text(&map.activity_date),
            tx,
            n,
            origin,
        )?);
    }
    Ok(records)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_count(raw: &str, row: usize, origin: &str) -> IngestResult<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(1);
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Ok(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Ok(f.round() as u64),
        _ => Err(IngestError::BadValue {
            origin: origin.to_string(),
            row,
            role: "transaction_count",
            value: raw.to_string(),
        }),
    }
}

fn build_record(
    user_id: &str,
    project: &str,
    date: &str,
    transactions: u64,
    row: usize,
    origin: &str,
) -> IngestResult<ActivityRecord> {
    let bad = |role: &'static str, value: &str| IngestError::BadValue {
        origin: origin.to_string(),
        row,
        role,
        value: value.to_string(),
    };
    let user_id = user_id.trim();
    let project = project.trim();
    if user_id.is_empty() {
        return Err(bad("user_id", user_id));
    }
    if project.is_empty() {
        return Err(bad("project", project));
    }
    let activity_date = parse_activity_date(date).ok_or_else(|| IngestError::BadDate {
        origin: origin.to_string(),
        row,
        value: date.to_string(),
    })?;

    Ok(ActivityRecord::new(user_id, project, activity_date, transactions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_alias_order_wins() {
        let map = ColumnMap::resolve(&cols(&["wallet", "user_wallet", "game", "day"]), "t").unwrap();
        assert_eq!(map.user_id, "user_wallet");
        assert_eq!(map.project, "game");
        assert_eq!(map.activity_date, "day");
        assert_eq!(map.transaction_count, None);
    }

    #[test]
    fn test_missing_column_names_role() {
        let err = ColumnMap::resolve(&cols(&["user_id", "date"]), "t").unwrap_err();
        match err {
            IngestError::MissingColumn { role, .. } => assert_eq!(role, "project"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_csv_with_aliases() {
        let csv = "gamer,game,date,number_of_transactions\n\
                   0xabc,arena,2024-05-01,3\n\
                   0xabc,arena,2024-05-02 13:45:00.000 UTC,\n";
        let records = parse_csv(csv.as_bytes(), "t.csv").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id, "0xabc");
        assert_eq!(records[0].transaction_count, 3);
        assert_eq!(records[1].activity_date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(records[1].transaction_count, 1);
    }

    #[test]
    fn test_json_result_rows() {
        let json = r#"{"result": {"rows": [
            {"user_wallet": "w1", "project": "p", "day": "2024-01-03T10:00:00Z", "daily_transactions": 4},
            {"user_wallet": "w2", "project": "p", "day": "2024-01-04", "daily_transactions": null}
        ]}}"#;
        let records = parse_json(json, "t.json").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].transaction_count, 4);
        assert_eq!(records[1].transaction_count, 1);
        assert_eq!(records[0].activity_date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn test_bad_date_reports_row() {
        let csv = "user_id,project,activity_date\nu,p,2024-01-01\nu,p,yesterday\n";
        match parse_csv(csv.as_bytes(), "t.csv").unwrap_err() {
            IngestError::BadDate { row, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_negative_count_rejected() {
        let json = r#"[{"user_id": "u", "project": "p", "date": "2024-01-01", "tx_count": -2}]"#;
        assert!(matches!(
            parse_json(json, "t").unwrap_err(),
            IngestError::BadValue { role: "transaction_count", .. }
        ));
    }

    #[test]
    fn test_empty_json_array() {
        assert!(parse_json("[]", "t").unwrap().is_empty());
    }
}
