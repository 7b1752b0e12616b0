//! Loader → column validation → quota reduction → styled export.

use std::path::Path;

use quota_reduce::{reduce, ReductionError, ReductionRequest, ReductionStatus, Row};
use thiserror::Error;

use crate::columns::{coerce_quantity, ColumnError};
use crate::config::ProcessorConfig;
use crate::load::{load_bytes, load_path, LoadError, LoadedTable};
use crate::table::{CellScalar, Table};
use crate::write::{output_file_name, write_table_to_buffer, WriteError};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Columns(#[from] ColumnError),
    #[error(transparent)]
    Reduce(#[from] ReductionError),
    #[error(transparent)]
    Write(#[from] WriteError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub source_name: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub rows_dropped: usize,
    pub original_total: u64,
    pub target: u64,
    pub achieved_total: u64,
    pub status: ReductionStatus,
    /// Quantity cells that were not already whole non-negative numbers.
    pub coerced_cells: usize,
}

#[derive(Debug, Clone)]
pub struct ReducedTable {
    pub table: Table,
    pub summary: RunSummary,
}

#[derive(Debug, Clone)]
pub struct ProcessedWorkbook {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub summary: RunSummary,
}

/// Run the whole pipeline on an uploaded file and return the `.xlsx` to hand back.
pub fn process_upload(
    file_name: &str,
    bytes: Vec<u8>,
    target: i64,
    config: &ProcessorConfig,
) -> Result<ProcessedWorkbook, ProcessError> {
    let loaded = load_bytes(file_name, bytes, &config.load_options())?;
    finish(loaded, target, config)
}

/// Like [`process_upload`], reading the upload from disk.
pub fn process_file(
    path: &Path,
    target: i64,
    config: &ProcessorConfig,
) -> Result<ProcessedWorkbook, ProcessError> {
    let loaded = load_path(path, &config.load_options())?;
    finish(loaded, target, config)
}

fn finish(
    loaded: LoadedTable,
    target: i64,
    config: &ProcessorConfig,
) -> Result<ProcessedWorkbook, ProcessError> {
    let mut reduced = reduce_table(loaded.table, target, config)?;
    reduced.summary.source_name = loaded.source_name;

    let bytes = write_table_to_buffer(&reduced.table, &config.style)?;
    Ok(ProcessedWorkbook {
        file_name: output_file_name(&reduced.summary.source_name),
        bytes,
        summary: reduced.summary,
    })
}

/// Validate `table`, reduce its quantity column to `target` and rebuild the table.
///
/// Headers are kept verbatim; surviving rows keep every other cell unchanged and
/// their quantity cell becomes a whole number.
pub fn reduce_table(
    table: Table,
    target: i64,
    config: &ProcessorConfig,
) -> Result<ReducedTable, ProcessError> {
    let columns = config.columns.validate(&table)?;
    let quantity_index = columns.quantity_index;

    let Table {
        sheet_name,
        headers,
        rows,
    } = table;
    let rows_in = rows.len();

    let mut coerced_cells = 0usize;
    let rows: Vec<Row<Vec<CellScalar>>> = rows
        .into_iter()
        .enumerate()
        .map(|(id, cells)| {
            let cell = cells.get(quantity_index).unwrap_or(&CellScalar::Empty);
            let coerced = coerce_quantity(cell);
            if coerced.adjusted {
                coerced_cells += 1;
                log::debug!("row {}: quantity {cell:?} coerced to {}", id + 2, coerced.value);
            }
            Row::new(id, coerced.value, cells)
        })
        .collect();
    if coerced_cells > 0 {
        log::warn!("{coerced_cells} quantity cells were not whole non-negative numbers");
    }

    let result = reduce(ReductionRequest::new(rows, target), config.reduce_options())?;
    if let ReductionStatus::Infeasible { shortfall } = result.status {
        log::warn!(
            "target {} not reachable while keeping every row at one or more; output exceeds it by {shortfall}",
            result.target
        );
    }

    let summary = RunSummary {
        source_name: String::new(),
        rows_in,
        rows_out: result.rows.len(),
        rows_dropped: result.dropped.len(),
        original_total: result.original_total,
        target: result.target,
        achieved_total: result.achieved_total,
        status: result.status,
        coerced_cells,
    };

    let mut out = Table::new(sheet_name, headers);
    for row in result.rows {
        let mut cells = row.payload;
        if let Some(cell) = cells.get_mut(quantity_index) {
            *cell = CellScalar::Number(row.quantity as f64);
        }
        out.push_row(cells);
    }

    log::info!(
        "reduced total {} -> {} ({} of {rows_in} rows kept)",
        summary.original_total,
        summary.achieved_total,
        summary.rows_out
    );
    Ok(ReducedTable {
        table: out,
        summary,
    })
}
