use crate::commands::QueryRunner;
use crate::db::QueryRequest;
use crate::error::AppError;
use crate::models::{SchemaInfo, TableCatalog, TableInfo};

pub(crate) const SCHEMAS_SQL: &str = r#"
SELECT nspname AS schema_name
FROM pg_namespace
WHERE nspname NOT IN ('pg_catalog', 'information_schema', 'pg_toast')
  AND nspname NOT LIKE 'pg_temp_%'
  AND nspname NOT LIKE 'pg_toast_temp_%'
ORDER BY 1
"#;

pub(crate) const TABLES_SQL: &str = r#"
SELECT tablename
FROM pg_tables
WHERE schemaname = :s
ORDER BY 1
"#;

/// Get all non-system schemas
pub async fn list_schemas<R: QueryRunner + ?Sized>(runner: &R) -> Result<Vec<SchemaInfo>, AppError> {
    let result = runner
        .run(&QueryRequest::new(SCHEMAS_SQL))
        .await
        .map_err(catalog_error)?;

    Ok(result
        .column_text("schema_name")
        .into_iter()
        .map(|name| SchemaInfo { name })
        .collect())
}

/// Get all tables for a schema
pub async fn list_tables<R: QueryRunner + ?Sized>(
    runner: &R,
    schema_name: &str,
) -> Result<TableCatalog, AppError> {
    let request = QueryRequest::new(TABLES_SQL).bind("s", schema_name);
    let result = runner.run(&request).await.map_err(catalog_error)?;

    let tables = result
        .column_text("tablename")
        .into_iter()
        .map(|name| TableInfo {
            name,
            schema_name: schema_name.to_string(),
        })
        .collect();

    Ok(TableCatalog::from_listing(schema_name, tables))
}

/// Schema the browser starts on: `public` when present, else the first one
pub fn default_schema(schemas: &[SchemaInfo]) -> Option<&SchemaInfo> {
    schemas
        .iter()
        .find(|s| s.name == "public")
        .or_else(|| schemas.first())
}

fn catalog_error(e: AppError) -> AppError {
    match e {
        AppError::Query { message } => AppError::catalog(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::query::testing::FakeRunner;
    use crate::db::ParamValue;
    use crate::models::{CellValue, ColumnDef, QueryResult};

    fn names(column: &str, values: &[&str]) -> QueryResult {
        QueryResult::new(
            vec![ColumnDef::new(column, "NAME")],
            values
                .iter()
                .map(|v| vec![CellValue::Text(v.to_string())])
                .collect(),
            0,
        )
    }

    #[tokio::test]
    async fn lists_schemas_and_picks_public() {
        let runner = FakeRunner::new();
        runner.respond(SCHEMAS_SQL, names("schema_name", &["ads", "public"]));

        let schemas = list_schemas(&runner).await.unwrap();
        assert_eq!(schemas.len(), 2);
        assert_eq!(default_schema(&schemas).unwrap().name, "public");
        assert_eq!(default_schema(&schemas[..1]).unwrap().name, "ads");
        assert!(default_schema(&[]).is_none());
    }

    #[tokio::test]
    async fn schema_name_is_bound_not_interpolated() {
        let runner = FakeRunner::new();
        runner.respond(TABLES_SQL, names("tablename", &["orders", "products"]));

        let catalog = list_tables(&runner, "public").await.unwrap();
        assert_eq!(catalog.tables().len(), 2);
        assert!(catalog.resolve("public", "orders").is_some());

        let request = &runner.requests()[0];
        assert!(!request.sql.contains("public"));
        assert_eq!(
            request.params.as_ref().unwrap().get("s"),
            Some(&ParamValue::Text("public".into()))
        );
    }

    #[tokio::test]
    async fn listing_failures_are_catalog_errors() {
        let runner = FakeRunner::new();
        runner.fail(SCHEMAS_SQL, "permission denied for table pg_namespace");
        let err = list_schemas(&runner).await.unwrap_err();
        assert!(matches!(err, AppError::Catalog { .. }));
        assert!(err.to_string().contains("permission denied"));
    }
}
