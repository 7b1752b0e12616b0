//! Greedy quota reduction over ordered rows of non-negative quantities.
//!
//! Given rows that each carry a quantity and a target total, [`reduce`] shrinks the
//! quantities so they sum to the target while touching as few rows as possible:
//!
//! - rows are processed in descending quantity order (ties broken by original position)
//! - every row can give up all but one unit (its "removal potential")
//! - the first row whose cumulative removal potential covers the required removal is the
//!   cutoff row: every earlier row is floored at `1`, the cutoff row gives up the
//!   remainder, and every later row is left untouched
//! - rows whose quantity ends at zero are dropped
//!
//! Rows carry an arbitrary payload that is passed through unchanged.

use std::cmp::Reverse;

use thiserror::Error;

/// Original position of a row in the input table.
pub type RowId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<T> {
    pub id: RowId,
    pub quantity: u64,
    pub payload: T,
}

impl<T> Row<T> {
    pub fn new(id: RowId, quantity: u64, payload: T) -> Self {
        Self {
            id,
            quantity,
            payload,
        }
    }

    /// Amount this row can give up without dropping below one.
    pub fn removal_potential(&self) -> u64 {
        self.quantity.saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionRequest<T> {
    pub rows: Vec<Row<T>>,
    /// Desired total after reduction. Signed so that a negative request can be rejected
    /// with [`ReductionError::InvalidTarget`] instead of being unrepresentable.
    pub target: i64,
}

impl<T> ReductionRequest<T> {
    pub fn new(rows: Vec<Row<T>>, target: i64) -> Self {
        Self { rows, target }
    }
}

impl ReductionRequest<()> {
    /// Build a request whose row ids are the positions in `quantities`.
    pub fn from_quantities(quantities: &[u64], target: i64) -> Self {
        let rows = quantities
            .iter()
            .enumerate()
            .map(|(id, &quantity)| Row::new(id, quantity, ()))
            .collect();
        Self { rows, target }
    }
}

/// What to do when the required removal exceeds the total removal potential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfeasiblePolicy {
    /// Fail with [`ReductionError::Infeasible`].
    #[default]
    Reject,
    /// Leave every quantity as it was (zero rows are still dropped) and report the
    /// shortfall through [`ReductionStatus::Infeasible`].
    LeaveUnchanged,
    /// Floor every positive row at `1` and report the remaining shortfall.
    ClampToFloor,
}

/// Order in which surviving rows are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputOrder {
    /// Processing order: descending by original quantity, ties by original position.
    #[default]
    Descending,
    /// Ascending by [`Row::id`].
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReduceOptions {
    pub infeasible: InfeasiblePolicy,
    pub order: OutputOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionStatus {
    /// The input already summed to the target.
    Unchanged,
    /// Quantities were reduced and now sum to the target.
    Reduced,
    /// The target could not be met; the emitted rows still exceed it by `shortfall`.
    Infeasible { shortfall: u64 },
}

impl ReductionStatus {
    /// `true` when the surviving rows sum exactly to the target.
    pub fn is_exact(self) -> bool {
        !matches!(self, ReductionStatus::Infeasible { .. })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReductionStatus::Unchanged => "unchanged",
            ReductionStatus::Reduced => "reduced",
            ReductionStatus::Infeasible { .. } => "infeasible",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionResult<T> {
    /// Surviving rows, every one with `quantity > 0`.
    pub rows: Vec<Row<T>>,
    /// Ids of rows whose quantity ended at zero, ascending.
    pub dropped: Vec<RowId>,
    pub original_total: u64,
    pub target: u64,
    pub achieved_total: u64,
    pub status: ReductionStatus,
}

impl<T> ReductionResult<T> {
    pub fn quantities(&self) -> Vec<u64> {
        self.rows.iter().map(|row| row.quantity).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReductionError {
    #[error("target must not be negative (got {target})")]
    InvalidTarget { target: i64 },
    #[error("target ({target}) is greater than the table total ({total})")]
    TargetExceedsTotal { target: u64, total: u64 },
    #[error(
        "cannot remove {required} while keeping every row at one or more: at most {available} can be removed"
    )]
    Infeasible { required: u64, available: u64 },
    #[error("sum of quantities does not fit in 64 bits")]
    TotalOverflow,
}

/// Reduce `request.rows` so that their quantities sum to `request.target`.
///
/// Errors are detected before any quantity is modified.
pub fn reduce<T>(
    request: ReductionRequest<T>,
    options: ReduceOptions,
) -> Result<ReductionResult<T>, ReductionError> {
    let ReductionRequest {
        mut rows,
        target: requested,
    } = request;

    let target =
        u64::try_from(requested).map_err(|_| ReductionError::InvalidTarget { target: requested })?;
    let original_total = total_quantity(&rows)?;
    if target > original_total {
        return Err(ReductionError::TargetExceedsTotal {
            target,
            total: original_total,
        });
    }
    let diff = original_total - target;

    rows.sort_by_key(|row| (Reverse(row.quantity), row.id));

    let mut infeasible = false;
    if diff > 0 {
        // Bounded by `original_total`, so the running sum cannot overflow.
        let cumulative: Vec<u64> = rows
            .iter()
            .scan(0u64, |removed, row| {
                *removed += row.removal_potential();
                Some(*removed)
            })
            .collect();

        let cutoff = cumulative.partition_point(|&removed| removed < diff);
        if cutoff == rows.len() {
            let available = cumulative.last().copied().unwrap_or(0);
            log::debug!("required removal {diff} exceeds removal potential {available}");
            match options.infeasible {
                InfeasiblePolicy::Reject => {
                    return Err(ReductionError::Infeasible {
                        required: diff,
                        available,
                    })
                }
                InfeasiblePolicy::LeaveUnchanged => {}
                InfeasiblePolicy::ClampToFloor => {
                    for row in rows.iter_mut() {
                        row.quantity = row.quantity.min(1);
                    }
                }
            }
            infeasible = true;
        } else {
            let removed_before = match cutoff {
                0 => 0,
                idx => cumulative[idx - 1],
            };
            let remainder = diff - removed_before;
            log::debug!(
                "cutoff at position {cutoff} (row {}), removing {remainder} from it",
                rows[cutoff].id
            );

            for row in &mut rows[..cutoff] {
                row.quantity = 1;
            }
            rows[cutoff].quantity -= remainder;
        }
    }

    let mut dropped = Vec::new();
    rows.retain(|row| {
        if row.quantity == 0 {
            dropped.push(row.id);
            false
        } else {
            true
        }
    });
    dropped.sort_unstable();

    if options.order == OutputOrder::Original {
        rows.sort_by_key(|row| row.id);
    }

    let achieved_total: u64 = rows.iter().map(|row| row.quantity).sum();
    let status = if infeasible {
        ReductionStatus::Infeasible {
            shortfall: achieved_total - target,
        }
    } else if diff == 0 {
        ReductionStatus::Unchanged
    } else {
        ReductionStatus::Reduced
    };

    Ok(ReductionResult {
        rows,
        dropped,
        original_total,
        target,
        achieved_total,
        status,
    })
}

/// Reduce a bare list of quantities with default options.
///
/// The returned quantities are in processing (descending) order.
pub fn reduce_quantities(quantities: &[u64], target: i64) -> Result<Vec<u64>, ReductionError> {
    let result = reduce(
        ReductionRequest::from_quantities(quantities, target),
        ReduceOptions::default(),
    )?;
    Ok(result.quantities())
}

/// Sum of all row quantities.
pub fn total_quantity<T>(rows: &[Row<T>]) -> Result<u64, ReductionError> {
    rows.iter().try_fold(0u64, |total, row| {
        total
            .checked_add(row.quantity)
            .ok_or(ReductionError::TotalOverflow)
    })
}
