//! Position transform for concurrent operations.
//!
//! Best-effort, position-based operational transform: given an operation
//! created against an older buffer state and the operations logged after
//! its timestamp, shift its position so it applies to the current buffer.
//! This is order-dependent and not a CRDT. Convergence is not guaranteed
//! when concurrent deletes overlap the same range; it is adequate for
//! short-latency, small-team editing where such overlaps are rare.

use crate::op::{Operation, OperationKind};

/// Transform `op` against a single concurrent `other` operation.
///
/// Returns a new operation; `op` itself is never mutated. Arithmetic
/// saturates, so malformed input shifts to a boundary instead of
/// panicking, and application clamps to the live buffer.
pub fn transform(op: &Operation, other: &Operation) -> Operation {
    let mut transformed = op.clone();
    transformed.position = transform_position(op.position, other);
    transformed
}

/// Transform `op` against every operation in `others`, in the order given.
///
/// Callers pass the slice from `OperationLog::operations_after`, which is
/// already in timestamp order.
pub fn transform_against<'a, I>(op: &Operation, others: I) -> Operation
where
    I: IntoIterator<Item = &'a Operation>,
{
    let mut transformed = op.clone();
    for other in others {
        transformed.position = transform_position(transformed.position, other);
    }
    transformed
}

/// Shift one char position by the effect of `other`.
fn transform_position(position: usize, other: &Operation) -> usize {
    match other.kind {
        OperationKind::Insert => insert_shift(position, other.position, other.len()),
        OperationKind::Delete => delete_shift(position, other.position, other.len()),
        // An update replaces `len` chars in place: a delete followed by
        // an insert at the same position. Positions past the replaced
        // range come out unchanged; positions at or inside it land at
        // the range end.
        OperationKind::Update => {
            let after_delete = delete_shift(position, other.position, other.len());
            insert_shift(after_delete, other.position, other.len())
        }
    }
}

/// Text inserted at or before `position` pushes it forward.
fn insert_shift(position: usize, at: usize, len: usize) -> usize {
    if at <= position {
        position.saturating_add(len)
    } else {
        position
    }
}

/// Text deleted before `position` pulls it back, but never further than
/// the start of the deleted range.
fn delete_shift(position: usize, at: usize, len: usize) -> usize {
    if at < position {
        position - len.min(position - at)
    } else {
        position
    }
}
