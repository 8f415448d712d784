//! The materialized text of a collaboratively edited document.

use ropey::Rope;

use crate::op::{Operation, OperationKind};

/// Current document text, derived from the operation log.
///
/// All offsets are in Unicode scalar values (chars), not bytes. The
/// buffer is a cache of "replay the log in timestamp order", maintained
/// incrementally. Out-of-range edits clamp to the buffer bounds rather
/// than error: a single bad position must never take a session down.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuffer {
    rope: Rope,
}

impl DocumentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Replace the whole buffer, used when installing a sync snapshot.
    pub fn set_text(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
    }

    /// Apply one operation's edit at its (already transformed) position.
    pub fn apply(&mut self, op: &Operation) {
        match op.kind {
            OperationKind::Insert => self.insert(op.position, &op.content),
            OperationKind::Delete => self.delete(op.position, op.len()),
            OperationKind::Update => self.replace(op.position, op.len(), &op.content),
        }
    }

    /// Insert `text` at char offset `at`, clamped to the buffer end.
    pub fn insert(&mut self, at: usize, text: &str) {
        let at = at.min(self.rope.len_chars());
        self.rope.insert(at, text);
    }

    /// Remove `len` chars starting at `at`; the range is truncated at the
    /// buffer end.
    pub fn delete(&mut self, at: usize, len: usize) {
        let start = at.min(self.rope.len_chars());
        let end = at.saturating_add(len).min(self.rope.len_chars());
        if start < end {
            self.rope.remove(start..end);
        }
    }

    /// Replace `len` chars at `at` with `text`.
    pub fn replace(&mut self, at: usize, len: usize, text: &str) {
        self.delete(at, len);
        self.insert(at, text);
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }
}

impl std::fmt::Display for DocumentBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.rope.fmt(f)
    }
}
