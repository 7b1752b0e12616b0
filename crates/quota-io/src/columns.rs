//! Column-name normalisation, required-column checks and quantity coercion.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::table::{CellScalar, Table};

pub const DEFAULT_QUANTITY_COLUMN: &str = "impressões totais";

pub const DEFAULT_REQUIRED_COLUMNS: &[&str] = &[
    "veículos",
    "data",
    "url veiculada",
    DEFAULT_QUANTITY_COLUMN,
    "categoria",
];

/// Normalise a header for comparison: trim, compose (NFC) and lowercase.
///
/// Composition matters because the same accented header can be stored either
/// precomposed (`é`) or decomposed (`e` + U+0301) depending on the authoring tool.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().nfc().collect::<String>().to_lowercase()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSchema {
    /// Columns that must be present (compared after normalisation).
    pub required: Vec<String>,
    /// Column holding the quantity to reduce.
    pub quantity: String,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            required: DEFAULT_REQUIRED_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            quantity: DEFAULT_QUANTITY_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedColumns {
    /// Normalised names, in table order.
    pub normalized: Vec<String>,
    /// Index of the quantity column in the table.
    pub quantity_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error(
        "required columns {missing:?} were not found (columns found after normalisation: {found:?})"
    )]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },
}

impl ColumnSchema {
    pub fn validate(&self, table: &Table) -> Result<ValidatedColumns, ColumnError> {
        let normalized: Vec<String> = table
            .headers
            .iter()
            .map(|h| normalize_column_name(h))
            .collect();

        let quantity = normalize_column_name(&self.quantity);
        let mut missing: Vec<String> = self
            .required
            .iter()
            .map(|name| normalize_column_name(name))
            .filter(|name| !normalized.contains(name))
            .collect();
        let quantity_index = normalized.iter().position(|name| *name == quantity);
        if quantity_index.is_none() && !missing.contains(&quantity) {
            missing.push(quantity);
        }

        match quantity_index {
            Some(quantity_index) if missing.is_empty() => Ok(ValidatedColumns {
                normalized,
                quantity_index,
            }),
            _ => Err(ColumnError::MissingColumns {
                missing,
                found: normalized,
            }),
        }
    }
}

/// Largest integer an `f64` spreadsheet cell holds exactly (2^53).
pub const MAX_EXACT_QUANTITY: u64 = 1 << 53;

/// A quantity cell converted to a non-negative integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coerced {
    pub value: u64,
    /// `true` when the cell did not already hold a non-negative whole number.
    pub adjusted: bool,
}

/// Convert a quantity cell to a non-negative integer.
///
/// Numbers and numeric text are accepted. Anything non-numeric (blank, text,
/// errors, booleans, NaN) and every negative value becomes `0`. Fractions are
/// truncated toward zero. Values above [`MAX_EXACT_QUANTITY`] are capped there so the
/// quantity survives being written back as a spreadsheet number.
pub fn coerce_quantity(cell: &CellScalar) -> Coerced {
    let number = match cell {
        CellScalar::Number(n) => Some(*n),
        CellScalar::Text(s) => parse_number(s),
        CellScalar::Empty
        | CellScalar::Bool(_)
        | CellScalar::DateTime(_)
        | CellScalar::Error(_) => None,
    };

    match number {
        Some(n) if n.is_finite() && n >= 0.0 => {
            let capped = n > MAX_EXACT_QUANTITY as f64;
            let value = if capped {
                MAX_EXACT_QUANTITY
            } else {
                n.trunc() as u64
            };
            Coerced {
                value,
                adjusted: capped
                    || n.fract() != 0.0
                    || !matches!(cell, CellScalar::Number(_)),
            }
        }
        _ => Coerced {
            value: 0,
            adjusted: !matches!(cell, CellScalar::Number(n) if *n == 0.0),
        },
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}
