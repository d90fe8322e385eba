use std::sync::Arc;

use crate::commands::metadata::list_tables;
use crate::commands::QueryRunner;
use crate::db::QueryRequest;
use crate::error::AppError;
use crate::models::{QueryResult, TableRef, MAX_PREVIEW_LIMIT, MIN_PREVIEW_LIMIT};

/// Check a preview row limit against the browser bounds
pub fn validate_limit(limit: i64) -> Result<i64, AppError> {
    if !(MIN_PREVIEW_LIMIT..=MAX_PREVIEW_LIMIT).contains(&limit) {
        return Err(AppError::validation(format!(
            "limit must be between {} and {}, got {}",
            MIN_PREVIEW_LIMIT, MAX_PREVIEW_LIMIT, limit
        )));
    }
    Ok(limit)
}

/// Preview SQL for a catalog-sourced table. Identifiers are quoted into the
/// text, the limit stays a bound parameter.
pub fn preview_request(table: &TableRef, limit: i64) -> QueryRequest {
    QueryRequest::new(format!("SELECT * FROM {} LIMIT :lim", table.quoted())).bind("lim", limit)
}

/// First `limit` rows of a table that came from a catalog listing
pub async fn preview_table<R: QueryRunner + ?Sized>(
    runner: &R,
    table: &TableRef,
    limit: i64,
) -> Result<Arc<QueryResult>, AppError> {
    let limit = validate_limit(limit)?;
    log::debug!("previewing {} (limit {})", table, limit);
    runner.run(&preview_request(table, limit)).await
}

/// Preview by name: the pair must appear in a fresh catalog listing of the
/// schema, otherwise nothing is queried beyond that listing.
pub async fn preview_by_name<R: QueryRunner + ?Sized>(
    runner: &R,
    schema_name: &str,
    table_name: &str,
    limit: i64,
) -> Result<(TableRef, Arc<QueryResult>), AppError> {
    let limit = validate_limit(limit)?;
    let catalog = list_tables(runner, schema_name).await?;
    let table = catalog.resolve(schema_name, table_name).ok_or_else(|| {
        AppError::catalog(format!(
            "table {}.{} not found in catalog listing",
            schema_name, table_name
        ))
    })?;
    let result = preview_table(runner, &table, limit).await?;
    Ok((table, result))
}

/// Default export file name for a previewed table
pub fn export_file_name(table: &TableRef) -> String {
    format!("{}.{}.csv", table.schema_name(), table.table_name())
}
