//! File-facing side of the impressions reducer.
//!
//! An upload (a spreadsheet, or a ZIP archive containing one) is read into a
//! [`Table`], its headers are checked against a [`ColumnSchema`], the quantity
//! column is reduced with [`quota_reduce`], and the result is written back out
//! as a styled `.xlsx`. All behaviour is driven by an explicit
//! [`ProcessorConfig`]; nothing here keeps process-wide state.

pub mod columns;
pub mod config;
pub mod load;
pub mod pipeline;
pub mod table;
pub mod write;

pub use columns::{
    coerce_quantity, normalize_column_name, ColumnError, ColumnSchema, Coerced, ValidatedColumns,
    MAX_EXACT_QUANTITY,
};
pub use config::{ConfigError, InfeasibleMode, ProcessorConfig, RowOrder};
pub use load::{load_bytes, load_path, LoadError, LoadOptions, LoadedTable, SourceFormat};
pub use pipeline::{
    process_file, process_upload, reduce_table, ProcessError, ProcessedWorkbook, ReducedTable,
    RunSummary,
};
pub use table::{CellScalar, Table};
pub use write::{output_file_name, save_atomically, write_table_to_buffer, SheetStyle, WriteError};
