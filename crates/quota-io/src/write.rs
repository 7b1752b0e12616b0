//! Styled `.xlsx` export of a [`Table`].

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatPattern, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::columns::normalize_column_name;
use crate::table::{CellScalar, Table};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetStyle {
    pub sheet_name: String,
    /// Header background, as six hex digits (`RRGGBB`, optional leading `#`).
    pub header_fill: String,
    pub header_font_color: String,
    /// Column widths keyed by header name (matched after normalisation).
    pub column_widths: BTreeMap<String, f64>,
    /// Excel number format applied to date cells.
    pub date_format: String,
}

impl Default for SheetStyle {
    fn default() -> Self {
        let column_widths = [
            ("Veículos", 25.43),
            ("Data", 10.00),
            ("URL Veiculada", 100.00),
            ("Impressões Totais", 20.86),
            ("Categoria", 24.29),
        ]
        .into_iter()
        .map(|(name, width)| (name.to_string(), width))
        .collect();

        Self {
            sheet_name: "Sheet1".to_string(),
            header_fill: "47A432".to_string(),
            header_font_color: "FFFFFF".to_string(),
            column_widths,
            date_format: "dd/mm/yyyy".to_string(),
        }
    }
}

impl SheetStyle {
    fn width_for(&self, header: &str) -> Option<f64> {
        let wanted = normalize_column_name(header);
        self.column_widths
            .iter()
            .find(|(name, _)| normalize_column_name(name) == wanted)
            .map(|(_, width)| *width)
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to build workbook: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("invalid colour `{0}` (expected six hex digits such as `47A432`)")]
    InvalidColor(String),
    #[error("failed to save workbook: {0}")]
    Io(#[from] io::Error),
}

/// Serialise `table` into an in-memory `.xlsx` with a styled header row.
pub fn write_table_to_buffer(table: &Table, style: &SheetStyle) -> Result<Vec<u8>, WriteError> {
    let header_format = Format::new()
        .set_bold()
        .set_font_color(parse_color(&style.header_font_color)?)
        .set_background_color(parse_color(&style.header_fill)?)
        .set_pattern(FormatPattern::Solid)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let date_format = Format::new().set_num_format(&style.date_format);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&style.sheet_name)?;

    for (col, header) in table.headers.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, header, &header_format)?;
        if let Some(width) = style.width_for(header) {
            worksheet.set_column_width(col, width)?;
        }
    }

    for (idx, row) in table.rows.iter().enumerate() {
        let row_num = (idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                CellScalar::Empty => {}
                CellScalar::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                CellScalar::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                CellScalar::Bool(b) => {
                    worksheet.write_boolean(row_num, col, *b)?;
                }
                CellScalar::DateTime(serial) => {
                    worksheet.write_number_with_format(row_num, col, *serial, &date_format)?;
                }
                CellScalar::Error(e) => {
                    worksheet.write_string(row_num, col, e)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Output file name for a given source name: same stem, `.xlsx` extension.
pub fn output_file_name(source_name: &str) -> String {
    // Archive entries may carry directories (`exports/march.xlsx`).
    let base = source_name.rsplit(['/', '\\']).next().unwrap_or(source_name);
    let stem = Path::new(base)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("Sheet1");
    format!("{stem}.xlsx")
}

/// Write `bytes` to `dest` via a temp file in the same directory and a rename,
/// so a failed save never leaves a truncated workbook behind.
pub fn save_atomically(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|err| err.error)?;
    Ok(())
}

fn parse_color(raw: &str) -> Result<Color, WriteError> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return Err(WriteError::InvalidColor(raw.to_string()));
    }
    u32::from_str_radix(hex, 16)
        .map(Color::RGB)
        .map_err(|_| WriteError::InvalidColor(raw.to_string()))
}
