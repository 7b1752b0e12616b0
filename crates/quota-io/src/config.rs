use std::path::{Path, PathBuf};

use quota_reduce::{InfeasiblePolicy, OutputOrder, ReduceOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::columns::ColumnSchema;
use crate::load::{LoadOptions, MAX_SPREADSHEET_BYTES};
use crate::write::SheetStyle;

/// Behaviour when the reduction cannot reach the target while keeping rows at one or more.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InfeasibleMode {
    #[default]
    Reject,
    LeaveUnchanged,
    ClampToFloor,
}

impl From<InfeasibleMode> for InfeasiblePolicy {
    fn from(mode: InfeasibleMode) -> Self {
        match mode {
            InfeasibleMode::Reject => InfeasiblePolicy::Reject,
            InfeasibleMode::LeaveUnchanged => InfeasiblePolicy::LeaveUnchanged,
            InfeasibleMode::ClampToFloor => InfeasiblePolicy::ClampToFloor,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowOrder {
    #[default]
    Descending,
    Original,
}

impl From<RowOrder> for OutputOrder {
    fn from(order: RowOrder) -> Self {
        match order {
            RowOrder::Descending => OutputOrder::Descending,
            RowOrder::Original => OutputOrder::Original,
        }
    }
}

/// Everything the loader, validator, reducer and writer need, passed explicitly.
///
/// Every field is optional in the JSON form; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub columns: ColumnSchema,
    pub style: SheetStyle,
    /// Worksheet to read; the first sheet when unset.
    pub sheet: Option<String>,
    pub on_infeasible: InfeasibleMode,
    pub order: RowOrder,
    pub max_spreadsheet_bytes: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            columns: ColumnSchema::default(),
            style: SheetStyle::default(),
            sheet: None,
            on_infeasible: InfeasibleMode::default(),
            order: RowOrder::default(),
            max_spreadsheet_bytes: MAX_SPREADSHEET_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProcessorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sheet: self.sheet.clone(),
            max_spreadsheet_bytes: self.max_spreadsheet_bytes,
        }
    }

    pub fn reduce_options(&self) -> ReduceOptions {
        ReduceOptions {
            infeasible: self.on_infeasible.into(),
            order: self.order.into(),
        }
    }
}
