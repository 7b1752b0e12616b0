#![no_main]

use libfuzzer_sys::fuzz_target;
use quota_reduce::{
    reduce, InfeasiblePolicy, OutputOrder, ReduceOptions, ReductionError, ReductionRequest,
    ReductionStatus,
};

const MAX_ROWS: usize = 4_096;

fuzz_target!(|data: &[u8]| {
    if data.len() < 9 {
        return;
    }

    let (head, body) = data.split_at(9);
    let selector = head[0];
    let target = i64::from_le_bytes([
        head[1], head[2], head[3], head[4], head[5], head[6], head[7], head[8],
    ]);

    // Mostly small quantities so that feasible targets are actually hit; the top bit of each
    // chunk's first byte switches to a full-width value to exercise overflow.
    let quantities: Vec<u64> = body
        .chunks(8)
        .take(MAX_ROWS)
        .map(|chunk| {
            if chunk[0] & 0x80 != 0 {
                let mut buf = [0u8; 8];
                buf[..chunk.len()].copy_from_slice(chunk);
                u64::from_le_bytes(buf)
            } else {
                u64::from(chunk[0])
            }
        })
        .collect();

    let infeasible = match selector % 3 {
        0 => InfeasiblePolicy::Reject,
        1 => InfeasiblePolicy::LeaveUnchanged,
        _ => InfeasiblePolicy::ClampToFloor,
    };
    let order = if selector & 0x10 == 0 {
        OutputOrder::Descending
    } else {
        OutputOrder::Original
    };
    let options = ReduceOptions { infeasible, order };

    let request = ReductionRequest::from_quantities(&quantities, target);
    let result = match reduce(request, options) {
        Ok(result) => result,
        Err(ReductionError::InvalidTarget { .. })
        | Err(ReductionError::TargetExceedsTotal { .. })
        | Err(ReductionError::TotalOverflow)
        | Err(ReductionError::Infeasible { .. }) => return,
    };

    let achieved: u64 = result.rows.iter().map(|row| row.quantity).sum();
    assert_eq!(achieved, result.achieved_total);
    assert!(result.rows.iter().all(|row| row.quantity > 0));
    assert!(result
        .rows
        .iter()
        .all(|row| row.quantity <= quantities[row.id]));
    assert_eq!(result.rows.len() + result.dropped.len(), quantities.len());

    match result.status {
        ReductionStatus::Unchanged | ReductionStatus::Reduced => {
            assert_eq!(result.achieved_total, result.target);
        }
        ReductionStatus::Infeasible { shortfall } => {
            assert_eq!(result.achieved_total - result.target, shortfall);
        }
    }
});
