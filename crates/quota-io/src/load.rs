//! Turn an uploaded file (a spreadsheet, or a ZIP archive containing one) into a [`Table`].

use std::io::{Cursor, Read};
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Reader};
use thiserror::Error;
use zip::ZipArchive;

use crate::columns::normalize_column_name;
use crate::table::{CellScalar, Table};

/// Maximum inflated size of a spreadsheet read out of an archive (or read directly).
pub const MAX_SPREADSHEET_BYTES: u64 = 256 * 1024 * 1024; // 256 MiB

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Archive entries under this prefix are resource forks added by macOS Finder.
const MACOS_METADATA_PREFIX: &str = "__MACOSX";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    Zip,
}

impl SourceFormat {
    /// Detect the upload kind from its file extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, LoadError> {
        let extension = extension_of(name).unwrap_or_default();
        if extension == "zip" {
            Ok(SourceFormat::Zip)
        } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
            Ok(SourceFormat::Spreadsheet)
        } else {
            Err(LoadError::UnsupportedFormat { extension })
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Worksheet to read; the first sheet when `None`. Matched like column headers
    /// (trimmed, NFC, lowercase).
    pub sheet: Option<String>,
    pub max_spreadsheet_bytes: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            max_spreadsheet_bytes: MAX_SPREADSHEET_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    /// The uploaded file name, or the entry name when the table came out of an archive.
    pub source_name: String,
    pub format: SourceFormat,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported file format `.{extension}` (expected .xlsx, .xlsm, .xls, .xlsb, .ods or .zip)")]
    UnsupportedFormat { extension: String },
    #[error("failed to read zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("zip archive does not contain a spreadsheet")]
    NoSpreadsheetInArchive,
    #[error("`{name}` is too large ({size} bytes, limit {max})")]
    TooLarge { name: String, size: u64, max: u64 },
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("workbook contains no sheets")]
    NoSheets,
    #[error("workbook has no sheet named `{0}`")]
    MissingSheet(String),
    #[error("sheet `{0}` has no header row")]
    EmptySheet(String),
}

/// Load a table from a file on disk.
pub fn load_path(path: &Path, options: &LoadOptions) -> Result<LoadedTable, LoadError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    // Reject unknown formats before reading the file.
    SourceFormat::from_file_name(&file_name)?;
    let bytes = std::fs::read(path)?;
    load_bytes(&file_name, bytes, options)
}

/// Load a table from an uploaded file's name and contents.
pub fn load_bytes(
    file_name: &str,
    bytes: Vec<u8>,
    options: &LoadOptions,
) -> Result<LoadedTable, LoadError> {
    let format = SourceFormat::from_file_name(file_name)?;
    let (source_name, spreadsheet) = match format {
        SourceFormat::Spreadsheet => {
            let size = bytes.len() as u64;
            if size > options.max_spreadsheet_bytes {
                return Err(LoadError::TooLarge {
                    name: file_name.to_string(),
                    size,
                    max: options.max_spreadsheet_bytes,
                });
            }
            (file_name.to_string(), bytes)
        }
        SourceFormat::Zip => extract_spreadsheet(bytes, options.max_spreadsheet_bytes)?,
    };

    let table = read_table(spreadsheet, options)?;
    log::info!(
        "loaded {} rows x {} columns from `{source_name}` (sheet `{}`)",
        table.row_count(),
        table.column_count(),
        table.sheet_name
    );
    Ok(LoadedTable {
        table,
        source_name,
        format,
    })
}

/// Pull the first spreadsheet entry (in archive order) out of a ZIP archive.
///
/// Returns the entry name together with its inflated bytes.
pub fn extract_spreadsheet(
    bytes: Vec<u8>,
    max_bytes: u64,
) -> Result<(String, Vec<u8>), LoadError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut chosen = None;
    for idx in 0..archive.len() {
        let entry = archive.by_index_raw(idx)?;
        if !entry.is_dir() && is_spreadsheet_entry(entry.name()) {
            chosen = Some(idx);
            break;
        }
    }
    let idx = chosen.ok_or(LoadError::NoSpreadsheetInArchive)?;

    let mut entry = archive.by_index(idx)?;
    let name = entry.name().to_string();
    let declared = entry.size();
    if declared > max_bytes {
        return Err(LoadError::TooLarge {
            name,
            size: declared,
            max: max_bytes,
        });
    }

    // The declared size comes from untrusted metadata; cap the actual inflate as well.
    let mut out = Vec::with_capacity(declared as usize);
    (&mut entry).take(max_bytes + 1).read_to_end(&mut out)?;
    if out.len() as u64 > max_bytes {
        return Err(LoadError::TooLarge {
            name,
            size: out.len() as u64,
            max: max_bytes,
        });
    }

    log::debug!("extracted `{name}` ({} bytes) from archive", out.len());
    Ok((name, out))
}

/// Read the selected worksheet: first row is the header, remaining non-blank rows are data.
pub fn read_table(bytes: Vec<u8>, options: &LoadOptions) -> Result<Table, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet_names = workbook.sheet_names().to_owned();

    let sheet_name = match &options.sheet {
        Some(wanted) => {
            let key = normalize_column_name(wanted);
            sheet_names
                .iter()
                .find(|name| normalize_column_name(name) == key)
                .cloned()
                .ok_or_else(|| LoadError::MissingSheet(wanted.clone()))?
        }
        None => sheet_names.first().cloned().ok_or(LoadError::NoSheets)?,
    };

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(LoadError::EmptySheet(sheet_name));
    };
    let headers = header_row
        .iter()
        .map(|cell| CellScalar::from(cell).to_header_text())
        .collect();

    let mut table = Table::new(sheet_name, headers);
    let mut blank_rows = 0usize;
    for row in rows {
        let cells: Vec<CellScalar> = row.iter().map(CellScalar::from).collect();
        if cells.iter().all(CellScalar::is_empty) {
            blank_rows += 1;
            continue;
        }
        table.push_row(cells);
    }
    if blank_rows > 0 {
        log::debug!("skipped {blank_rows} blank rows in sheet `{}`", table.sheet_name);
    }

    Ok(table)
}

fn is_spreadsheet_entry(name: &str) -> bool {
    if name.starts_with(MACOS_METADATA_PREFIX) {
        return false;
    }
    extension_of(name).is_some_and(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.as_str()))
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
