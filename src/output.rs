use comfy_table::{presets, CellAlignment, ContentArrangement, Table};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::AdhocResult;
use crate::error::AppError;
use crate::models::{DailyPoint, Kpis, QueryResult};

/// Rows shown in a text table before truncating.
pub const DEFAULT_MAX_ROWS: usize = 200;

const MAX_CELL_WIDTH: usize = 48;

/// Print a failure to stderr.
pub fn print_error(err: &AppError) {
    eprintln!("error: {}", err);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Text table of a result. Shows at most `max_rows` rows and notes the rest.
pub fn render_table(result: &QueryResult, max_rows: usize) -> String {
    if result.columns.is_empty() {
        return "(no columns)\n".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(result.column_names());

    for row in result.rows.iter().take(max_rows) {
        table.add_row(
            row.iter()
                .map(|cell| clip(&cell.to_string()))
                .collect::<Vec<_>>(),
        );
    }

    for (index, column) in result.columns.iter().enumerate() {
        if column.kind.is_numeric() {
            if let Some(col) = table.column_mut(index) {
                col.set_cell_alignment(CellAlignment::Right);
            }
        }
    }

    let mut out = table.to_string();
    out.push('\n');
    if result.rows.len() > max_rows {
        out.push_str(&format!("... {} more rows\n", result.rows.len() - max_rows));
    }
    out
}

fn clip(text: &str) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        single_line
    } else {
        let mut clipped: String = single_line.chars().take(MAX_CELL_WIDTH - 1).collect();
        clipped.push('…');
        clipped
    }
}

/// Insert `sep` every three digits of an unsigned digit string.
fn group_digits(digits: &str, sep: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(ch);
    }
    out
}

/// Integer with `.` as thousands separator: `1234567` -> `1.234.567`
pub fn fmt_int(n: i64) -> String {
    let grouped = group_digits(&n.unsigned_abs().to_string(), '.');
    if n < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Dollars with `,` thousands and two decimals: `$1,234.56`
pub fn fmt_money(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, group_digits(whole, ','), frac)
}

pub fn fmt_pct(value: f64) -> String {
    format!("{:.2}%", value)
}

pub fn fmt_roas(value: f64) -> String {
    format!("{:.2}x", value)
}

pub fn render_kpis(kpis: &Kpis) -> String {
    let lines = [
        ("Impressions", fmt_int(kpis.impressions)),
        ("Clicks", fmt_int(kpis.clicks)),
        ("Spend", fmt_money(kpis.spend)),
        ("Sales (14d)", fmt_money(kpis.sales_14d)),
        ("Conv (14d)", fmt_int(kpis.conv_14d.trunc().to_i64().unwrap_or_default())),
        ("CTR", fmt_pct(kpis.ctr)),
        ("CPC", fmt_money(Decimal::from_f64_retain(kpis.cpc).unwrap_or_default())),
        ("ACoS", fmt_pct(kpis.acos)),
        ("ROAS", fmt_roas(kpis.roas)),
    ];

    lines
        .iter()
        .map(|(label, value)| format!("{:<12} {:>16}\n", label, value))
        .collect()
}

/// Daily spend, sales and clicks, one line per date.
pub fn render_series(series: &[DailyPoint]) -> String {
    if series.is_empty() {
        return "(no data for the selected filters)\n".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_header(vec!["date", "spend", "sales_14d", "clicks"]);
    for point in series {
        table.add_row(vec![
            point.date.format("%Y-%m-%d").to_string(),
            fmt_money(point.spend),
            fmt_money(point.sales_14d),
            fmt_int(point.clicks),
        ]);
    }
    for index in 1..4 {
        if let Some(col) = table.column_mut(index) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    let mut out = table.to_string();
    out.push('\n');
    out
}

pub fn adhoc_footer(outcome: &AdhocResult) -> String {
    format!("Time: {} ms • Rows: {}", outcome.elapsed_ms, outcome.row_count)
}
