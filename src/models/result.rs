use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;

/// Semantic type of a result column, derived from the Postgres type name.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Numeric,
    Boolean,
    Text,
    Date,
    Timestamp,
    TimestampTz,
    Time,
    Json,
    Uuid,
    Network,
    Binary,
    Interval,
    Array,
    Other,
}

impl ColumnKind {
    pub fn from_pg_type(type_name: &str) -> Self {
        let upper = type_name.to_uppercase();
        if upper.starts_with('_') || upper.ends_with("[]") {
            return ColumnKind::Array;
        }
        match upper.as_str() {
            "INT2" | "SMALLINT" | "INT4" | "INTEGER" | "SERIAL" | "INT8" | "BIGINT"
            | "BIGSERIAL" | "OID" => ColumnKind::Integer,
            "FLOAT4" | "REAL" | "FLOAT8" | "DOUBLE PRECISION" => ColumnKind::Float,
            "NUMERIC" | "DECIMAL" => ColumnKind::Numeric,
            "BOOL" | "BOOLEAN" => ColumnKind::Boolean,
            "CHAR" | "VARCHAR" | "TEXT" | "BPCHAR" | "NAME" | "CITEXT" => ColumnKind::Text,
            "DATE" => ColumnKind::Date,
            "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => ColumnKind::Timestamp,
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => ColumnKind::TimestampTz,
            "TIME" | "TIME WITHOUT TIME ZONE" => ColumnKind::Time,
            "JSON" | "JSONB" => ColumnKind::Json,
            "UUID" => ColumnKind::Uuid,
            "INET" | "CIDR" | "MACADDR" | "MACADDR8" => ColumnKind::Network,
            "BYTEA" => ColumnKind::Binary,
            "INTERVAL" => ColumnKind::Interval,
            _ => ColumnKind::Other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float | ColumnKind::Numeric)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        ColumnDef {
            name: name.into(),
            kind: ColumnKind::from_pg_type(&data_type),
            data_type,
        }
    }
}

/// One decoded cell.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Time(NaiveTime),
    Json(serde_json::Value),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(n) => Some(*n),
            CellValue::Float(f) => Some(*f as i64),
            CellValue::Decimal(d) => d.trunc().to_i64(),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            CellValue::Int(n) => Some(Decimal::from(*n)),
            CellValue::Float(f) => Decimal::from_f64(*f),
            CellValue::Decimal(d) => Some(*d),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(n) => Some(*n as f64),
            CellValue::Float(f) => Some(*f),
            CellValue::Decimal(d) => d.to_f64(),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Timestamp(ts) => Some(ts.date()),
            CellValue::TimestampTz(ts) => Some(ts.date_naive()),
            CellValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Text rendering, `None` for NULL.
    pub fn as_text(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(n) => write!(f, "{}", n),
            CellValue::Float(n) => write!(f, "{}", n),
            CellValue::Decimal(d) => write!(f, "{}", d),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            CellValue::TimestampTz(ts) => f.write_str(&ts.to_rfc3339()),
            CellValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            CellValue::Json(v) => write!(f, "{}", v),
        }
    }
}

/// A typed table: ordered columns and ordered rows.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<CellValue>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnDef>, rows: Vec<Vec<CellValue>>, execution_time_ms: u64) -> Self {
        let row_count = rows.len();
        QueryResult {
            columns,
            rows,
            row_count,
            execution_time_ms,
        }
    }

    pub fn empty() -> Self {
        QueryResult::new(Vec::new(), Vec::new(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// First cell of the named column, handy for single-row catalog queries.
    pub fn first_value(&self, column: &str) -> Option<&CellValue> {
        let index = self.column_index(column)?;
        self.rows.first().and_then(|row| row.get(index))
    }

    /// All non-null values of one column, rendered as text.
    pub fn column_text(&self, column: &str) -> Vec<String> {
        match self.column_index(column) {
            Some(index) => self
                .rows
                .iter()
                .filter_map(|row| row.get(index).and_then(CellValue::as_text))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_rows(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut map = serde_json::Map::new();
                for (col, cell) in self.columns.iter().zip(row) {
                    let value = serde_json::to_value(cell).unwrap_or(serde_json::Value::Null);
                    map.insert(col.name.clone(), value);
                }
                serde_json::Value::Object(map)
            })
            .collect()
    }
}
