//! Result types
//!
//! One `StatementResult` is produced per executed statement and streamed to
//! the caller as soon as the engine returns it.

use std::time::Duration;

/// Outcome of a single statement
#[derive(Debug, Clone)]
pub struct StatementResult {
    /// Server notices raised while the statement ran, shown above the table
    pub title: Option<String>,
    /// Column headers; empty for statements that return no rows
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
    /// Command tag, e.g. `SELECT 3` or `CREATE TABLE`
    pub status: String,
    /// Rows returned or affected
    pub row_count: u64,
    pub execution_time: Duration,
}

impl StatementResult {
    /// Result for a statement that returned rows
    pub fn rows(columns: Vec<ColumnDef>, rows: Vec<Row>, execution_time: Duration) -> Self {
        let row_count = rows.len() as u64;
        Self {
            title: None,
            columns,
            rows,
            status: format!("SELECT {}", row_count),
            row_count,
            execution_time,
        }
    }

    /// Result for a statement that only reports a command tag
    pub fn command(status: impl Into<String>, row_count: u64, execution_time: Duration) -> Self {
        Self {
            title: None,
            columns: Vec::new(),
            rows: Vec::new(),
            status: status.into(),
            row_count,
            execution_time,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Header names in column order
    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Whether this result carries a table (as opposed to a bare status)
    pub fn has_table(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Column definition in a result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Database data types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    // Integer types
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,
    Numeric,

    Text,
    Boolean,

    // Date/time types
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,

    // JSON types
    Json,
    Jsonb,

    Bytea,
    Uuid,
    Array(Box<DataType>),

    // Other/unknown types
    Unknown(String),
}

impl DataType {
    /// Whether values of this type are right-aligned when rendered
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::SmallInt
                | DataType::Integer
                | DataType::BigInt
                | DataType::Real
                | DataType::Double
                | DataType::Numeric
        )
    }
}

/// A single row of results
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Cell values in column order
    pub values: Vec<CellValue>,
}

/// A cell value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Json(serde_json::Value),
    Binary(Vec<u8>),
    /// Date/time value (stored as string)
    DateTime(String),
    Uuid(String),
    Array(Vec<CellValue>),
}

impl CellValue {
    /// Full display string for this cell, as psql would print it
    pub fn display_string(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::Text(s) | CellValue::DateTime(s) | CellValue::Uuid(s) => s.clone(),
            CellValue::Boolean(b) => if *b { "t" } else { "f" }.to_string(),
            CellValue::Json(v) => v.to_string(),
            CellValue::Binary(b) => {
                let mut out = String::with_capacity(2 + b.len() * 2);
                out.push_str("\\x");
                for byte in b {
                    out.push_str(&format!("{:02x}", byte));
                }
                out
            }
            CellValue::Array(arr) => {
                let items: Vec<String> = arr
                    .iter()
                    .map(|v| match v {
                        CellValue::Null => "NULL".to_string(),
                        other => other.display_string(),
                    })
                    .collect();
                format!("{{{}}}", items.join(","))
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_result_status() {
        let r = StatementResult::rows(
            vec![ColumnDef::new("n", DataType::Integer)],
            vec![Row {
                values: vec![CellValue::Integer(1)],
            }],
            Duration::from_millis(3),
        );
        assert_eq!(r.status, "SELECT 1");
        assert_eq!(r.row_count, 1);
        assert_eq!(r.headers(), vec!["n"]);
        assert!(r.has_table());
    }

    #[test]
    fn test_command_result_has_no_table() {
        let r = StatementResult::command("CREATE TABLE", 0, Duration::ZERO);
        assert!(!r.has_table());
        assert_eq!(r.status, "CREATE TABLE");
    }

    #[test]
    fn test_cell_display_matches_psql() {
        assert_eq!(CellValue::Null.display_string(), "");
        assert_eq!(CellValue::Boolean(true).display_string(), "t");
        assert_eq!(CellValue::Binary(vec![0xde, 0xad]).display_string(), "\\xdead");
    }

    #[test]
    fn test_array_display_string() {
        let arr = CellValue::Array(vec![
            CellValue::Text("a".to_string()),
            CellValue::Null,
            CellValue::Text("b".to_string()),
        ]);
        assert_eq!(arr.display_string(), "{a,NULL,b}");
    }
}
