//! Append-only, timestamp-ordered edit history for one document.

use std::collections::HashSet;

use crate::op::{Operation, OperationId};

/// The ordered history of every edit applied to a document.
///
/// Operations stay sorted ascending by timestamp; equal timestamps keep
/// insertion order. The log records causal history: remote operations are
/// appended as their author sent them, not as transformed for local
/// application. Owned exclusively by one document session.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    ops: Vec<Operation>,
    seen: HashSet<OperationId>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `op` keeping timestamp order.
    ///
    /// A duplicate id is a protocol anomaly: the operation is dropped with
    /// a warning and `false` is returned, so it can never be double-applied.
    pub fn append(&mut self, op: Operation) -> bool {
        if !self.seen.insert(op.id) {
            tracing::warn!(id = %op.id, user = %op.user, "dropping duplicate operation");
            return false;
        }
        // Most arrivals are newer than everything logged, so walk back
        // from the tail to find the insertion point.
        let mut idx = self.ops.len();
        while idx > 0 && self.ops[idx - 1].timestamp > op.timestamp {
            idx -= 1;
        }
        self.ops.insert(idx, op);
        true
    }

    /// Every operation with timestamp strictly greater than `timestamp`,
    /// in timestamp order. This is the transform set for an incoming
    /// remote operation.
    pub fn operations_after(&self, timestamp: u64) -> &[Operation] {
        let start = self.ops.partition_point(|op| op.timestamp <= timestamp);
        &self.ops[start..]
    }

    /// Replace the whole history with a sync snapshot.
    ///
    /// Snapshots come from a live peer's log and are expected sorted;
    /// order is restored if a peer sent them otherwise.
    pub fn replace_all(&mut self, operations: Vec<Operation>) {
        self.ops = operations;
        if !self.ops.is_sorted_by_key(|op| op.timestamp) {
            self.ops.sort_by_key(|op| op.timestamp);
        }
        self.seen = self.ops.iter().map(|op| op.id).collect();
    }

    /// All logged operations in timestamp order.
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn contains(&self, id: OperationId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::OperationKind;

    fn op(ts: u64) -> Operation {
        Operation::new("alice", OperationKind::Insert, 0, "x", ts)
    }

    #[test]
    fn test_append_keeps_timestamp_order() {
        let mut log = OperationLog::new();
        log.append(op(30));
        log.append(op(10));
        log.append(op(20));

        let timestamps: Vec<u64> = log.operations().iter().map(|o| o.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
    }

    #[test]
    fn test_equal_timestamps_keep_insertion_order() {
        let mut log = OperationLog::new();
        let first = op(10);
        let second = op(10);
        let first_id = first.id;
        let second_id = second.id;
        log.append(first);
        log.append(second);

        assert_eq!(log.operations()[0].id, first_id);
        assert_eq!(log.operations()[1].id, second_id);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut log = OperationLog::new();
        let operation = op(10);
        assert!(log.append(operation.clone()));
        assert!(!log.append(operation));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_operations_after_is_strict() {
        let mut log = OperationLog::new();
        log.append(op(10));
        log.append(op(20));
        log.append(op(30));

        let after: Vec<u64> = log
            .operations_after(20)
            .iter()
            .map(|o| o.timestamp)
            .collect();
        assert_eq!(after, vec![30]);
        assert_eq!(log.operations_after(30).len(), 0);
        assert_eq!(log.operations_after(0).len(), 3);
    }

    #[test]
    fn test_replace_all_restores_order() {
        let mut log = OperationLog::new();
        log.append(op(5));

        log.replace_all(vec![op(30), op(10), op(20)]);
        let timestamps: Vec<u64> = log.operations().iter().map(|o| o.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);
    }

    #[test]
    fn test_replace_all_is_idempotent() {
        let snapshot = vec![op(10), op(20)];
        let mut log = OperationLog::new();
        log.replace_all(snapshot.clone());
        let once: Vec<OperationId> = log.operations().iter().map(|o| o.id).collect();
        log.replace_all(snapshot);
        let twice: Vec<OperationId> = log.operations().iter().map(|o| o.id).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_all_resets_seen_ids() {
        let mut log = OperationLog::new();
        let old = op(10);
        log.append(old.clone());

        log.replace_all(vec![op(20)]);
        // The old id is gone with the old history, so appending it again
        // is legitimate.
        assert!(log.append(old));
        assert_eq!(log.len(), 2);
    }
}
