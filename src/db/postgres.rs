use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo, ValueRef};
use std::time::Instant;

use crate::db::params::{ParamValue, QueryRequest};
use crate::error::AppError;
use crate::models::{CellValue, ColumnDef, ConnectionDescriptor, QueryResult, Settings};

/// Create a PostgreSQL connection pool for the given descriptor
pub async fn create_pool(
    descriptor: &ConnectionDescriptor,
    settings: &Settings,
) -> Result<PgPool, sqlx::Error> {
    let connection_string = descriptor.connection_string();

    let pool = PgPoolOptions::new()
        .max_connections(settings.pool.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .test_before_acquire(true)
        .connect(&connection_string)
        .await?;

    Ok(pool)
}

/// Round-trip `SELECT 1` and return the latency. Never cached.
pub async fn ping(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let start = Instant::now();
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(start.elapsed().as_millis() as u64)
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &ParamValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        ParamValue::Text(s) => query.bind(s.clone()),
        ParamValue::Int(n) => query.bind(*n),
        ParamValue::Bool(b) => query.bind(*b),
        ParamValue::Date(d) => query.bind(*d),
        ParamValue::TextArray(items) => query.bind(items.clone()),
    }
}

/// Run a request with driver-bound parameters and decode every row.
pub async fn fetch(pool: &PgPool, request: &QueryRequest) -> Result<QueryResult, AppError> {
    let (sql, values) = request.compile()?;
    log::debug!("executing: {}", sql);

    let start = Instant::now();
    let mut query = sqlx::query(&sql);
    for value in values {
        query = bind_value(query, value);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| AppError::query(clean_error_message(&e.to_string())))?;

    let execution_time_ms = start.elapsed().as_millis() as u64;
    Ok(decode_rows(rows, execution_time_ms))
}

fn decode_rows(rows: Vec<PgRow>, execution_time_ms: u64) -> QueryResult {
    let Some(first_row) = rows.first() else {
        return QueryResult::new(Vec::new(), Vec::new(), execution_time_ms);
    };

    let columns: Vec<ColumnDef> = first_row
        .columns()
        .iter()
        .map(|col| ColumnDef::new(col.name(), col.type_info().name()))
        .collect();

    let decoded = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, col)| extract_value(row, i, &col.data_type))
                .collect()
        })
        .collect();

    QueryResult::new(columns, decoded, execution_time_ms)
}

/// Remove the "error returned from database:" prefix that sqlx adds
fn clean_error_message(error_msg: &str) -> String {
    error_msg
        .strip_prefix("error returned from database: ")
        .unwrap_or(error_msg)
        .to_string()
}

fn float_cell(n: f64) -> CellValue {
    if n.is_finite() {
        CellValue::Float(n)
    } else {
        CellValue::Text(n.to_string())
    }
}

/// Decode one cell based on its Postgres type name.
fn extract_value(row: &PgRow, index: usize, type_name: &str) -> CellValue {
    let upper_type = type_name.to_uppercase();
    let type_str = upper_type.as_str();

    // Array types start with underscore in PostgreSQL internal names or end with []
    if type_str.starts_with('_') || type_str.ends_with("[]") {
        return extract_array_value(row, index, type_str);
    }

    macro_rules! cell {
        ($ty:ty, $map:expr) => {
            if let Ok(v) = row.try_get::<Option<$ty>, _>(index) {
                return match v {
                    Some(inner) => $map(inner),
                    None => CellValue::Null,
                };
            }
        };
    }

    match type_str {
        "INT2" | "SMALLINT" => cell!(i16, |n: i16| CellValue::Int(n.into())),
        "INT4" | "INTEGER" | "SERIAL" => cell!(i32, |n: i32| CellValue::Int(n.into())),
        "INT8" | "BIGINT" | "BIGSERIAL" => cell!(i64, CellValue::Int),
        "FLOAT4" | "REAL" => cell!(f32, |n: f32| float_cell(n as f64)),
        "FLOAT8" | "DOUBLE PRECISION" => cell!(f64, float_cell),
        // NaN and values outside Decimal's range come back as NULL
        "NUMERIC" | "DECIMAL" => cell!(rust_decimal::Decimal, CellValue::Decimal),
        "BOOL" | "BOOLEAN" => cell!(bool, CellValue::Bool),
        "JSON" | "JSONB" => cell!(serde_json::Value, CellValue::Json),
        "UUID" => cell!(uuid::Uuid, |u: uuid::Uuid| CellValue::Text(u.to_string())),
        "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => {
            cell!(chrono::NaiveDateTime, CellValue::Timestamp)
        }
        "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => {
            cell!(chrono::DateTime<chrono::Utc>, CellValue::TimestampTz)
        }
        "DATE" => cell!(chrono::NaiveDate, CellValue::Date),
        "TIME" | "TIME WITHOUT TIME ZONE" => cell!(chrono::NaiveTime, CellValue::Time),
        "INET" => cell!(ipnetwork::IpNetwork, |ip: ipnetwork::IpNetwork| {
            // For single host addresses, don't show CIDR notation
            let is_single_host = match ip {
                ipnetwork::IpNetwork::V4(net) => net.prefix() == 32,
                ipnetwork::IpNetwork::V6(net) => net.prefix() == 128,
            };
            if is_single_host {
                CellValue::Text(ip.ip().to_string())
            } else {
                CellValue::Text(ip.to_string())
            }
        }),
        "CIDR" => cell!(ipnetwork::IpNetwork, |ip: ipnetwork::IpNetwork| {
            CellValue::Text(ip.to_string())
        }),
        "MACADDR" => cell!(mac_address::MacAddress, |mac: mac_address::MacAddress| {
            CellValue::Text(mac.to_string())
        }),
        "BYTEA" => cell!(Vec<u8>, |bytes: Vec<u8>| {
            CellValue::Text(format!("\\x{}", hex::encode(bytes)))
        }),
        "INTERVAL" => cell!(sqlx::postgres::types::PgInterval, |interval: sqlx::postgres::types::PgInterval| {
            CellValue::Text(format_interval(&interval))
        }),
        "OID" => cell!(sqlx::postgres::types::Oid, |oid: sqlx::postgres::types::Oid| {
            CellValue::Int(oid.0.into())
        }),
        _ => {}
    }

    // Fallback: try to get as string (handles TEXT, VARCHAR, CHAR, NAME and friends)
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return match v {
            Some(s) => CellValue::Text(s),
            None => CellValue::Null,
        };
    }

    // Last resort: raw text representation
    if let Ok(value_ref) = row.try_get_raw(index) {
        if value_ref.is_null() {
            return CellValue::Null;
        }
        if let Ok(s) = value_ref.as_str() {
            return CellValue::Text(s.to_string());
        }
    }

    CellValue::Null
}

/// Human-readable interval, `1 year 2 mons 3 days 04:05:06`
fn format_interval(interval: &sqlx::postgres::types::PgInterval) -> String {
    let plural = |n: i64| if n.abs() != 1 { "s" } else { "" };
    let mut parts = Vec::new();
    if interval.months != 0 {
        let years = (interval.months / 12) as i64;
        let months = (interval.months % 12) as i64;
        if years != 0 {
            parts.push(format!("{} year{}", years, plural(years)));
        }
        if months != 0 {
            parts.push(format!("{} mon{}", months, plural(months)));
        }
    }
    if interval.days != 0 {
        let days = interval.days as i64;
        parts.push(format!("{} day{}", days, plural(days)));
    }
    if interval.microseconds != 0 {
        let total_secs = interval.microseconds / 1_000_000;
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        let secs = total_secs % 60;
        let micros = interval.microseconds % 1_000_000;
        if micros != 0 {
            parts.push(format!("{:02}:{:02}:{:02}.{:06}", hours, mins, secs, micros.abs()));
        } else {
            parts.push(format!("{:02}:{:02}:{:02}", hours, mins, secs));
        }
    }
    if parts.is_empty() {
        "00:00:00".to_string()
    } else {
        parts.join(" ")
    }
}

/// Extract array values as a JSON array
fn extract_array_value(row: &PgRow, index: usize, type_name: &str) -> CellValue {
    let base_type = type_name.trim_start_matches('_').trim_end_matches("[]");

    macro_rules! array {
        ($ty:ty) => {
            if let Ok(v) = row.try_get::<Option<Vec<$ty>>, _>(index) {
                return match v {
                    Some(items) => CellValue::Json(serde_json::json!(items)),
                    None => CellValue::Null,
                };
            }
        };
    }

    match base_type {
        "INT2" | "SMALLINT" => array!(i16),
        "INT4" | "INTEGER" => array!(i32),
        "INT8" | "BIGINT" => array!(i64),
        "FLOAT4" | "REAL" => array!(f32),
        "FLOAT8" | "DOUBLE PRECISION" => array!(f64),
        "BOOL" | "BOOLEAN" => array!(bool),
        "UUID" => array!(uuid::Uuid),
        "DATE" => array!(chrono::NaiveDate),
        "JSON" | "JSONB" => array!(serde_json::Value),
        _ => {}
    }

    // Text arrays and anything else that decodes as strings
    if let Ok(v) = row.try_get::<Option<Vec<String>>, _>(index) {
        return match v {
            Some(items) => CellValue::Json(serde_json::json!(items)),
            None => CellValue::Null,
        };
    }

    if let Ok(value_ref) = row.try_get_raw(index) {
        if value_ref.is_null() {
            return CellValue::Null;
        }
        if let Ok(s) = value_ref.as_str() {
            return CellValue::Text(s.to_string());
        }
    }

    CellValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::types::PgInterval;

    #[test]
    fn strips_sqlx_prefix_from_errors() {
        assert_eq!(
            clean_error_message("error returned from database: relation \"x\" does not exist"),
            "relation \"x\" does not exist"
        );
        assert_eq!(clean_error_message("pool timed out"), "pool timed out");
    }

    #[test]
    fn interval_formatting() {
        let interval = PgInterval {
            months: 14,
            days: 3,
            microseconds: 4 * 3_600_000_000 + 5 * 60_000_000 + 6_000_000,
        };
        assert_eq!(format_interval(&interval), "1 year 2 mons 3 days 04:05:06");

        let zero = PgInterval {
            months: 0,
            days: 0,
            microseconds: 0,
        };
        assert_eq!(format_interval(&zero), "00:00:00");

        let one_day = PgInterval {
            months: 0,
            days: 1,
            microseconds: 1_500_000,
        };
        assert_eq!(format_interval(&one_day), "1 day 00:00:01.500000");
    }

    #[test]
    fn non_finite_floats_render_as_text() {
        assert_eq!(float_cell(1.5), CellValue::Float(1.5));
        assert_eq!(float_cell(f64::NAN), CellValue::Text("NaN".to_string()));
    }
}
