use std::sync::Arc;

use crate::commands::QueryRunner;
use crate::db::QueryRequest;
use crate::error::AppError;
use crate::models::{
    daily_series, CellValue, DailyPoint, FilterDomain, FilterSelection, Kpis, MetricRow,
    QueryResult,
};

pub const METRICS_VIEW: &str = "public.vw_sp_campaign_metrics_per_product";

pub const EXPORT_FILE_NAME: &str = "ads_metrics_filtered.csv";

const VIEW_EXISTS_SQL: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM information_schema.views
    WHERE table_schema = 'public' AND table_name = 'vw_sp_campaign_metrics_per_product'
) AS exists_view
"#;

const DATE_BOUNDS_SQL: &str = r#"
SELECT
  MIN(date) AS min_date,
  MAX(date) AS max_date
FROM public.vw_sp_campaign_metrics_per_product
"#;

const CAMPAIGNS_SQL: &str =
    "SELECT DISTINCT campaign_name FROM public.vw_sp_campaign_metrics_per_product ORDER BY 1";

const ASINS_SQL: &str =
    "SELECT DISTINCT advertised_asin FROM public.vw_sp_campaign_metrics_per_product ORDER BY 1";

/// Shown when the metrics view does not exist. Column and table names may
/// need adjusting to the local schema.
pub const FALLBACK_VIEW_DDL: &str = r#"CREATE OR REPLACE VIEW public.vw_sp_campaign_metrics_per_product AS
SELECT
  date,
  campaign_id,
  campaign_name,
  advertised_asin,
  advertised_sku,
  SUM(impressions)                AS impressions,
  SUM(clicks)                     AS clicks,
  SUM(cost)                       AS spend,
  SUM(attributed_sales_14d)       AS sales_14d,
  SUM(attributed_conversions_14d) AS conv_14d
FROM ads_sp_advertised_product_daily
GROUP BY 1,2,3,4,5;"#;

/// What the dashboard tab shows.
#[derive(Debug, Clone)]
pub enum DashboardOutcome {
    ViewMissing {
        ddl: &'static str,
    },
    Ready {
        domain: FilterDomain,
        kpis: Kpis,
        series: Vec<DailyPoint>,
        detail: Arc<QueryResult>,
    },
}

pub async fn view_exists<R: QueryRunner + ?Sized>(runner: &R) -> Result<bool, AppError> {
    let result = runner
        .run(&QueryRequest::new(VIEW_EXISTS_SQL))
        .await
        .map_err(|e| AppError::catalog(format!("checking {}: {}", METRICS_VIEW, e)))?;

    Ok(matches!(
        result.first_value("exists_view"),
        Some(CellValue::Bool(true))
    ))
}

/// Date bounds and distinct campaign/ASIN values for the filter widgets
pub async fn filter_domain<R: QueryRunner + ?Sized>(runner: &R) -> Result<FilterDomain, AppError> {
    let bounds = runner.run(&QueryRequest::new(DATE_BOUNDS_SQL)).await?;
    let campaigns = runner.run(&QueryRequest::new(CAMPAIGNS_SQL)).await?;
    let asins = runner.run(&QueryRequest::new(ASINS_SQL)).await?;

    Ok(FilterDomain {
        min_date: bounds.first_value("min_date").and_then(|v| v.as_date()),
        max_date: bounds.first_value("max_date").and_then(|v| v.as_date()),
        campaigns: campaigns.column_text("campaign_name"),
        asins: asins.column_text("advertised_asin"),
    })
}

/// Detail query for the selected filters. Only filters that are present
/// contribute a clause; with none set there is no WHERE at all.
pub fn build_filtered_query(filters: &FilterSelection) -> QueryRequest {
    let mut clauses: Vec<&str> = Vec::new();
    let mut request = QueryRequest::new(String::new());

    if let Some((from, to)) = filters.date_range() {
        clauses.push("date BETWEEN :dstart AND :dend");
        request = request.bind("dstart", from).bind("dend", to);
    }
    if !filters.campaigns.is_empty() {
        clauses.push("campaign_name = ANY(:camps)");
        request = request.bind("camps", filters.campaigns.clone());
    }
    if !filters.asins.is_empty() {
        clauses.push("advertised_asin = ANY(:asins)");
        request = request.bind("asins", filters.asins.clone());
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}\n", clauses.join(" AND "))
    };

    request.sql = format!(
        "SELECT date, campaign_id, campaign_name, advertised_asin, advertised_sku,\n       \
         impressions, clicks, spend, sales_14d, conv_14d\n\
         FROM {}\n\
         {}ORDER BY date ASC",
        METRICS_VIEW, where_clause
    );
    request
}

/// Run the dashboard flow for one interaction.
pub async fn load_dashboard<R: QueryRunner + ?Sized>(
    runner: &R,
    filters: &FilterSelection,
) -> Result<DashboardOutcome, AppError> {
    if !view_exists(runner).await? {
        log::warn!("{} not found", METRICS_VIEW);
        return Ok(DashboardOutcome::ViewMissing {
            ddl: FALLBACK_VIEW_DDL,
        });
    }

    let domain = filter_domain(runner).await?;
    let detail = runner.run(&build_filtered_query(filters)).await?;
    let rows = MetricRow::from_result(&detail)?;
    log::debug!("dashboard: {} rows for {:?}", rows.len(), filters);

    Ok(DashboardOutcome::Ready {
        domain,
        kpis: Kpis::from_rows(&rows),
        series: daily_series(&rows),
        detail,
    })
}
