use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AppError;
use crate::models::{CellValue, QueryResult};

/// User-chosen dashboard filters. An absent or empty filter means
/// "no restriction".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub campaigns: Vec<String>,
    #[serde(default)]
    pub asins: Vec<String>,
}

impl FilterSelection {
    /// Both bounds, only when both were supplied.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.date_range().is_none() && self.campaigns.is_empty() && self.asins.is_empty()
    }
}

/// Values used to populate the filter widgets.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterDomain {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub campaigns: Vec<String>,
    pub asins: Vec<String>,
}

/// One row of `vw_sp_campaign_metrics_per_product`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricRow {
    pub date: Option<NaiveDate>,
    pub campaign_id: Option<String>,
    pub campaign_name: Option<String>,
    pub advertised_asin: Option<String>,
    pub advertised_sku: Option<String>,
    pub impressions: i64,
    pub clicks: i64,
    pub spend: Decimal,
    pub sales_14d: Decimal,
    pub conv_14d: Decimal,
}

pub const METRIC_COLUMNS: [&str; 10] = [
    "date",
    "campaign_id",
    "campaign_name",
    "advertised_asin",
    "advertised_sku",
    "impressions",
    "clicks",
    "spend",
    "sales_14d",
    "conv_14d",
];

static NULL_CELL: CellValue = CellValue::Null;

impl MetricRow {
    /// Decode the detail result. NULL metrics count as zero.
    pub fn from_result(result: &QueryResult) -> Result<Vec<MetricRow>, AppError> {
        if result.is_empty() {
            return Ok(Vec::new());
        }

        let mut idx = [0usize; 10];
        for (slot, name) in idx.iter_mut().zip(METRIC_COLUMNS) {
            *slot = result
                .column_index(name)
                .ok_or_else(|| AppError::catalog(format!("metrics view has no column `{}`", name)))?;
        }
        let [date, campaign_id, campaign_name, asin, sku, impressions, clicks, spend, sales, conv] =
            idx;

        let rows = result
            .rows
            .iter()
            .map(|row| {
                let cell = |i: usize| row.get(i).unwrap_or(&NULL_CELL);
                MetricRow {
                    date: cell(date).as_date(),
                    campaign_id: cell(campaign_id).as_text(),
                    campaign_name: cell(campaign_name).as_text(),
                    advertised_asin: cell(asin).as_text(),
                    advertised_sku: cell(sku).as_text(),
                    impressions: cell(impressions).as_i64().unwrap_or(0),
                    clicks: cell(clicks).as_i64().unwrap_or(0),
                    spend: cell(spend).as_decimal().unwrap_or_default(),
                    sales_14d: cell(sales).as_decimal().unwrap_or_default(),
                    conv_14d: cell(conv).as_decimal().unwrap_or_default(),
                }
            })
            .collect();

        Ok(rows)
    }
}

/// Headline numbers over the filtered rows.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub impressions: i64,
    pub clicks: i64,
    pub spend: Decimal,
    pub sales_14d: Decimal,
    pub conv_14d: Decimal,
    /// clicks / impressions * 100
    pub ctr: f64,
    /// spend / clicks
    pub cpc: f64,
    /// spend / sales * 100
    pub acos: f64,
    /// sales / spend
    pub roas: f64,
}

impl Kpis {
    pub fn from_rows(rows: &[MetricRow]) -> Self {
        let mut kpis = Kpis::default();
        for row in rows {
            kpis.impressions += row.impressions;
            kpis.clicks += row.clicks;
            kpis.spend += row.spend;
            kpis.sales_14d += row.sales_14d;
            kpis.conv_14d += row.conv_14d;
        }

        let impressions = kpis.impressions as f64;
        let clicks = kpis.clicks as f64;
        let spend = kpis.spend.to_f64().unwrap_or(0.0);
        let sales = kpis.sales_14d.to_f64().unwrap_or(0.0);

        kpis.ctr = safe_ratio(clicks, impressions) * 100.0;
        kpis.cpc = safe_ratio(spend, clicks);
        kpis.acos = safe_ratio(spend, sales) * 100.0;
        kpis.roas = safe_ratio(sales, spend);
        kpis
    }
}

/// `numerator / denominator`, or 0 when the denominator is zero.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Per-day sums.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub impressions: i64,
    pub clicks: i64,
    pub spend: Decimal,
    pub sales_14d: Decimal,
    pub conv_14d: Decimal,
}

/// Group rows by date, ascending. Only dates present in the rows appear.
pub fn daily_series(rows: &[MetricRow]) -> Vec<DailyPoint> {
    let mut by_date: BTreeMap<NaiveDate, DailyPoint> = BTreeMap::new();
    for row in rows {
        let Some(date) = row.date else { continue };
        let point = by_date.entry(date).or_insert_with(|| DailyPoint {
            date,
            impressions: 0,
            clicks: 0,
            spend: Decimal::ZERO,
            sales_14d: Decimal::ZERO,
            conv_14d: Decimal::ZERO,
        });
        point.impressions += row.impressions;
        point.clicks += row.clicks;
        point.spend += row.spend;
        point.sales_14d += row.sales_14d;
        point.conv_14d += row.conv_14d;
    }
    by_date.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnDef;
    use std::str::FromStr;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn row(d: u32, impressions: i64, clicks: i64, spend: &str, sales: &str) -> MetricRow {
        MetricRow {
            date: Some(day(d)),
            campaign_id: Some("1".into()),
            campaign_name: Some("CampA".into()),
            advertised_asin: Some("B000TEST01".into()),
            advertised_sku: Some("SKU-1".into()),
            impressions,
            clicks,
            spend: Decimal::from_str(spend).unwrap(),
            sales_14d: Decimal::from_str(sales).unwrap(),
            conv_14d: Decimal::from(1),
        }
    }

    #[test]
    fn kpis_for_single_matching_row() {
        let kpis = Kpis::from_rows(&[row(15, 100, 10, "5.0", "20.0")]);
        assert_eq!(format!("{:.2}", kpis.ctr), "10.00");
        assert_eq!(format!("{:.2}", kpis.cpc), "0.50");
        assert_eq!(format!("{:.2}", kpis.acos), "25.00");
        assert_eq!(format!("{:.2}", kpis.roas), "4.00");
    }

    #[test]
    fn zero_denominators_yield_zero() {
        let kpis = Kpis::from_rows(&[row(1, 0, 0, "0", "0")]);
        assert_eq!(kpis.ctr, 0.0);
        assert_eq!(kpis.cpc, 0.0);
        assert_eq!(kpis.acos, 0.0);
        assert_eq!(kpis.roas, 0.0);

        // spend but no sales, clicks but no impressions
        let kpis = Kpis::from_rows(&[row(1, 0, 4, "8", "0")]);
        assert_eq!(kpis.ctr, 0.0);
        assert_eq!(kpis.cpc, 2.0);
        assert_eq!(kpis.acos, 0.0);
        assert_eq!(kpis.roas, 0.0);
        assert!(kpis.ctr.is_finite() && kpis.acos.is_finite());
    }

    #[test]
    fn kpis_of_nothing_are_zero() {
        let kpis = Kpis::from_rows(&[]);
        assert_eq!(kpis, Kpis::default());
    }

    #[test]
    fn series_sums_per_date_without_gap_filling() {
        let rows = vec![
            row(3, 10, 1, "1.5", "3"),
            row(1, 20, 2, "2", "0"),
            row(3, 5, 1, "0.5", "1"),
        ];
        let series = daily_series(&rows);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, day(1));
        assert_eq!(series[1].date, day(3));
        assert_eq!(series[1].impressions, 15);
        assert_eq!(series[1].clicks, 2);
        assert_eq!(series[1].spend, Decimal::from(2));
        assert_eq!(series[1].sales_14d, Decimal::from(4));
    }

    #[test]
    fn rows_without_a_date_are_left_out_of_the_series() {
        let mut undated = row(2, 1, 1, "1", "1");
        undated.date = None;
        assert!(daily_series(&[undated]).is_empty());
    }

    #[test]
    fn decodes_rows_and_treats_null_metrics_as_zero() {
        let columns = METRIC_COLUMNS
            .iter()
            .map(|name| ColumnDef::new(*name, "TEXT"))
            .collect();
        let result = QueryResult::new(
            columns,
            vec![vec![
                CellValue::Date(day(2)),
                CellValue::Int(42),
                CellValue::Text("CampA".into()),
                CellValue::Text("B000TEST01".into()),
                CellValue::Null,
                CellValue::Decimal(Decimal::from(100)),
                CellValue::Null,
                CellValue::Decimal(Decimal::from_str("5.25").unwrap()),
                CellValue::Null,
                CellValue::Int(2),
            ]],
            0,
        );
        let rows = MetricRow::from_result(&result).unwrap();
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.date, Some(day(2)));
        assert_eq!(r.campaign_id.as_deref(), Some("42"));
        assert_eq!(r.advertised_sku, None);
        assert_eq!(r.impressions, 100);
        assert_eq!(r.clicks, 0);
        assert_eq!(r.sales_14d, Decimal::ZERO);
        assert_eq!(r.conv_14d, Decimal::from(2));
    }

    #[test]
    fn missing_view_column_is_a_catalog_error() {
        let result = QueryResult::new(
            vec![ColumnDef::new("date", "DATE")],
            vec![vec![CellValue::Date(day(1))]],
            0,
        );
        let err = MetricRow::from_result(&result).unwrap_err();
        assert!(matches!(err, AppError::Catalog { .. }));
    }

    #[test]
    fn date_range_requires_both_bounds() {
        let mut filters = FilterSelection {
            date_from: Some(day(1)),
            ..FilterSelection::default()
        };
        assert_eq!(filters.date_range(), None);
        assert!(filters.is_unfiltered());
        filters.date_to = Some(day(31));
        assert_eq!(filters.date_range(), Some((day(1), day(31))));
        assert!(!filters.is_unfiltered());
    }
}
