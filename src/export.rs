use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};

use crate::error::AppError;
use crate::models::{CellValue, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Tsv,
    Json,
    Xlsx,
}

impl ExportFormat {
    /// Pick a format from the file extension. Unknown or missing
    /// extensions fall back to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("tsv") | Some("tab") => ExportFormat::Tsv,
            Some("json") => ExportFormat::Json,
            Some("xlsx") => ExportFormat::Xlsx,
            _ => ExportFormat::Csv,
        }
    }
}

/// Write `result` as delimited text with a header row. NULL is an empty field.
pub fn write_delimited<W: Write>(
    result: &QueryResult,
    delimiter: u8,
    out: W,
) -> Result<u64, AppError> {
    ensure_columns(result)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(out);

    writer.write_record(result.column_names())?;

    let mut rows_exported: u64 = 0;
    for row in &result.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        rows_exported += 1;
    }

    writer.flush()?;
    Ok(rows_exported)
}

pub fn write_json<W: Write>(result: &QueryResult, out: W) -> Result<u64, AppError> {
    ensure_columns(result)?;
    serde_json::to_writer_pretty(out, &result.to_json_rows())?;
    Ok(result.rows.len() as u64)
}

pub fn write_xlsx(result: &QueryResult, path: &Path) -> Result<u64, AppError> {
    ensure_columns(result)?;

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    for (col, name) in result.column_names().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header)?;
    }

    for (i, row) in result.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                CellValue::Null => {}
                CellValue::Bool(b) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                CellValue::Int(_) | CellValue::Float(_) | CellValue::Decimal(_) => {
                    match cell.as_f64() {
                        Some(n) if n.is_finite() => sheet.write_number(r, c, n)?,
                        _ => sheet.write_string(r, c, cell.to_string())?,
                    };
                }
                other => {
                    sheet.write_string(r, c, other.to_string())?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(result.rows.len() as u64)
}

/// Export to `path`, choosing the format from its extension.
pub fn export_to_path(result: &QueryResult, path: &Path) -> Result<u64, AppError> {
    let format = ExportFormat::from_path(path);
    // fail before creating an empty file
    ensure_columns(result)?;

    let rows = match format {
        ExportFormat::Xlsx => write_xlsx(result, path)?,
        ExportFormat::Csv => write_delimited(result, b',', BufWriter::new(File::create(path)?))?,
        ExportFormat::Tsv => write_delimited(result, b'\t', BufWriter::new(File::create(path)?))?,
        ExportFormat::Json => {
            let mut out = BufWriter::new(File::create(path)?);
            let rows = write_json(result, &mut out)?;
            out.flush()?;
            rows
        }
    };

    log::info!("exported {} rows to {} ({:?})", rows, path.display(), format);
    Ok(rows)
}

fn ensure_columns(result: &QueryResult) -> Result<(), AppError> {
    if result.columns.is_empty() {
        return Err(AppError::export("result has no columns"));
    }
    Ok(())
}
