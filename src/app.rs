use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::cli::{DashboardArgs, Flow, PreviewArgs, SqlArgs, TablesArgs};
use crate::commands::{
    self, connection_status, export_file_name, list_schemas, list_tables, load_dashboard,
    preview_by_name, run_adhoc, DashboardOutcome, ADHOC_EXPORT_NAME, DEFAULT_ADHOC_SQL,
    EXPORT_FILE_NAME,
};
use crate::db::Clock;
use crate::error::AppError;
use crate::export;
use crate::models::{ConnectionStatus, QueryResult};
use crate::output;
use crate::state::Session;

/// The last table a flow produced, kept by the shell for `export`.
#[derive(Debug, Clone)]
pub struct Exportable {
    pub result: Arc<QueryResult>,
    pub default_name: String,
}

impl Exportable {
    fn new(result: Arc<QueryResult>, default_name: impl Into<String>) -> Self {
        Self {
            result,
            default_name: default_name.into(),
        }
    }
}

/// Run one flow against the session and print its outcome.
pub async fn execute<C: Clock>(
    session: &Session<C>,
    flow: &Flow,
    json: bool,
) -> Result<Option<Exportable>, AppError> {
    match flow {
        Flow::Status => {
            status(session, json)?;
            Ok(None)
        }
        Flow::Dashboard(args) => dashboard(session, args, json).await,
        Flow::Schemas => {
            schemas(session, json).await?;
            Ok(None)
        }
        Flow::Tables(args) => {
            tables(session, args, json).await?;
            Ok(None)
        }
        Flow::Preview(args) => preview(session, args, json).await.map(Some),
        Flow::Sql(args) => sql(session, args, json).await.map(Some),
    }
}

fn status<C: Clock>(session: &Session<C>, json: bool) -> Result<(), AppError> {
    let info = connection_status(session);
    if json {
        return output::print_json(&info);
    }
    match info.status {
        ConnectionStatus::Connected => println!("connected to {}", info.target),
        _ => println!("not connected"),
    }
    Ok(())
}

async fn dashboard<C: Clock>(
    session: &Session<C>,
    args: &DashboardArgs,
    json: bool,
) -> Result<Option<Exportable>, AppError> {
    let filters = args.filters();
    let outcome = load_dashboard(session, &filters).await?;

    let (domain, kpis, series, detail) = match outcome {
        DashboardOutcome::ViewMissing { ddl } => {
            if json {
                output::print_json(&json!({ "viewMissing": true, "ddl": ddl }))?;
            } else {
                println!("View {} not found. Create it with:\n", commands::METRICS_VIEW);
                println!("{}", ddl);
            }
            return Ok(None);
        }
        DashboardOutcome::Ready {
            domain,
            kpis,
            series,
            detail,
        } => (domain, kpis, series, detail),
    };

    if let Some(path) = &args.export {
        write_export(&detail, path)?;
    }

    if json {
        output::print_json(&json!({
            "domain": domain,
            "filters": filters,
            "kpis": kpis,
            "series": series,
            "rows": detail.to_json_rows(),
        }))?;
    } else {
        if let (Some(min), Some(max)) = (domain.min_date, domain.max_date) {
            println!(
                "data from {} to {} • {} campaigns • {} ASINs\n",
                min,
                max,
                domain.campaigns.len(),
                domain.asins.len()
            );
        }
        print!("{}", output::render_kpis(&kpis));
        println!();
        print!("{}", output::render_series(&series));
        if args.rows > 0 {
            println!();
            print!("{}", output::render_table(&detail, args.rows));
        }
    }

    Ok(Some(Exportable::new(detail, EXPORT_FILE_NAME)))
}

async fn schemas<C: Clock>(session: &Session<C>, json: bool) -> Result<(), AppError> {
    let schemas = list_schemas(session).await?;
    if json {
        return output::print_json(&schemas);
    }
    let default = commands::default_schema(&schemas).map(|s| s.name.clone());
    for schema in &schemas {
        let marker = if Some(&schema.name) == default.as_ref() { "*" } else { " " };
        println!("{} {}", marker, schema.name);
    }
    Ok(())
}

async fn resolve_schema<C: Clock>(
    session: &Session<C>,
    requested: Option<&str>,
) -> Result<String, AppError> {
    if let Some(name) = requested {
        return Ok(name.to_string());
    }
    let schemas = list_schemas(session).await?;
    commands::default_schema(&schemas)
        .map(|s| s.name.clone())
        .ok_or_else(|| AppError::catalog("no schemas visible to this user"))
}

async fn tables<C: Clock>(
    session: &Session<C>,
    args: &TablesArgs,
    json: bool,
) -> Result<(), AppError> {
    let schema = resolve_schema(session, args.schema.as_deref()).await?;
    let catalog = list_tables(session, &schema).await?;
    if json {
        return output::print_json(catalog.tables());
    }
    if catalog.is_empty() {
        println!("no tables in {}", schema);
    }
    for table in catalog.tables() {
        println!("{}.{}", table.schema_name, table.name);
    }
    Ok(())
}

async fn preview<C: Clock>(
    session: &Session<C>,
    args: &PreviewArgs,
    json: bool,
) -> Result<Exportable, AppError> {
    let (schema, table_name) = args.target();
    let schema = resolve_schema(session, schema.as_deref()).await?;
    let limit = args.limit.unwrap_or(session.settings.query.default_limit);
    let (table, result) = preview_by_name(session, &schema, &table_name, limit).await?;
    let default_name = export_file_name(&table);

    match &args.export {
        Some(Some(path)) => write_export(&result, path)?,
        Some(None) => write_export(&result, Path::new(&default_name))?,
        None => {}
    }

    if json {
        output::print_json(&*result)?;
    } else {
        println!("{} ({} rows)", table, result.row_count);
        print!("{}", output::render_table(&result, args.rows));
    }
    Ok(Exportable::new(result, default_name))
}

async fn sql<C: Clock>(
    session: &Session<C>,
    args: &SqlArgs,
    json: bool,
) -> Result<Exportable, AppError> {
    let text = match (&args.sql, &args.file) {
        (Some(sql), _) => sql.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => DEFAULT_ADHOC_SQL.to_string(),
    };
    let outcome = run_adhoc(session, &text).await?;

    if let Some(path) = &args.export {
        write_export(&outcome.result, path)?;
    }

    if json {
        output::print_json(&json!({
            "elapsedMs": outcome.elapsed_ms,
            "rowCount": outcome.row_count,
            "result": &*outcome.result,
        }))?;
    } else {
        print!("{}", output::render_table(&outcome.result, args.rows));
        println!("{}", output::adhoc_footer(&outcome));
    }
    Ok(Exportable::new(outcome.result, ADHOC_EXPORT_NAME))
}

pub fn write_export(result: &QueryResult, path: &Path) -> Result<(), AppError> {
    let rows = export::export_to_path(result, path)?;
    eprintln!("wrote {} rows to {}", rows, path.display());
    Ok(())
}
