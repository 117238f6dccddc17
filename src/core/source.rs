//! Boundary to whatever executes SQL against the server.
//!
//! Checks only see [`MetricSource`]: a named, parameterised query goes in and
//! rows of named columns come out. [`ReplaySource`] serves results that were
//! recorded elsewhere (a collecting agent, a test fixture).

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// A query the checks know how to interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query {
    pub name: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("couldn't connect DB: {0}")]
    Connection(String),
    #[error("couldn't execute query: {0}")]
    Query(String),
    #[error("no recorded result for query {query} with params {params:?}")]
    NoRecording { query: String, params: Vec<String> },
    #[error("column {0} is missing from the result")]
    MissingColumn(String),
    #[error("column {0} is NULL")]
    NullValue(String),
    #[error("column {column} is not numeric: {value:?}")]
    NotNumeric { column: String, value: String },
    #[error("failure read replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failure parse replay file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub trait MetricSource {
    fn query(&mut self, query: &Query, params: &[&str]) -> Result<Vec<Row>, SourceError>;
}

// 结果集中的单元格，允许 yaml 里直接写数字或布尔值
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    fn into_text(self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(if b { "1" } else { "0" }.to_string()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Text(s) => Some(s),
        }
    }
}

/// One result row, column name to value. `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Row {
    #[serde(deserialize_with = "deserialize_cells")]
    columns: BTreeMap<String, Option<String>>,
}

fn deserialize_cells<'de, D>(d: D) -> Result<BTreeMap<String, Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Cell>::deserialize(d)?;
    Ok(raw.into_iter().map(|(k, v)| (k, v.into_text())).collect())
}

impl Row {
    pub fn new() -> Row {
        Row::default()
    }

    pub fn with(mut self, column: &str, value: Option<&str>) -> Row {
        self.columns
            .insert(column.to_string(), value.map(str::to_string));
        self
    }

    /// Value of `column`, `None` when it is NULL.
    pub fn get(&self, column: &str) -> Result<Option<&str>, SourceError> {
        self.columns
            .get(column)
            .map(|v| v.as_deref())
            .ok_or_else(|| SourceError::MissingColumn(column.to_string()))
    }

    pub fn str(&self, column: &str) -> Result<&str, SourceError> {
        self.get(column)?
            .ok_or_else(|| SourceError::NullValue(column.to_string()))
    }

    pub fn num(&self, column: &str) -> Result<f64, SourceError> {
        let raw = self.str(column)?;
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(SourceError::NotNumeric {
                column: column.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Recording {
    query: String,
    #[serde(default)]
    params: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
    /// Replays a failed query instead of a result.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReplayFile {
    #[serde(default)]
    recordings: Vec<Recording>,
}

/// Serves query results from a recorded YAML (or JSON) document:
///
/// ```yaml
/// recordings:
///   - query: local_member_state
///     params: ["db1", "3306"]
///     rows:
///       - MEMBER_STATE: ONLINE
/// ```
#[derive(Debug, Clone)]
pub struct ReplaySource {
    recordings: Vec<Recording>,
}

impl ReplaySource {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ReplaySource, SourceError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }
}

impl FromStr for ReplaySource {
    type Err = SourceError;

    fn from_str(content: &str) -> Result<ReplaySource, SourceError> {
        let file: ReplayFile = serde_yaml::from_str(content)?;
        Ok(ReplaySource {
            recordings: file.recordings,
        })
    }
}

impl MetricSource for ReplaySource {
    fn query(&mut self, query: &Query, params: &[&str]) -> Result<Vec<Row>, SourceError> {
        tracing::debug!(query = query.name, ?params, "replay query");
        let hit = self.recordings.iter().find(|r| {
            r.query == query.name && r.params.iter().map(String::as_str).eq(params.iter().copied())
        });
        match hit {
            Some(Recording {
                error: Some(err), ..
            }) => Err(SourceError::Query(err.clone())),
            Some(rec) => Ok(rec.rows.clone()),
            None => Err(SourceError::NoRecording {
                query: query.name.to_string(),
                params: params.iter().map(|p| p.to_string()).collect(),
            }),
        }
    }
}
