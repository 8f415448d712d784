//! The operation model: one recorded edit to one document.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use uuid::Uuid;

/// Unique identifier for an operation, used for de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generate a fresh random id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What an edit does to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Insert `content` at `position`.
    Insert,
    /// Remove `content` (which records the deleted text) at `position`.
    Delete,
    /// Replace the chars at `position..position + len` with `content`.
    Update,
}

/// A single edit with position, content, author, and timestamp.
///
/// All offsets are in Unicode scalar values (chars), not bytes. A
/// `position` is only meaningful against the buffer state the author saw
/// at `timestamp`; transformation adjusts it for edits that happened
/// since. Operations are immutable once created: transforming one
/// produces a new value, the logged original is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique id, assigned at creation.
    pub id: OperationId,
    /// Originating user.
    pub user: SmolStr,
    /// Edit kind.
    pub kind: OperationKind,
    /// Char offset the edit applies at.
    pub position: usize,
    /// Inserted text for insert/update; the removed text for delete.
    pub content: SmolStr,
    /// Author-local creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl Operation {
    /// Build an operation with a fresh random id.
    pub fn new(
        user: impl Into<SmolStr>,
        kind: OperationKind,
        position: usize,
        content: impl Into<SmolStr>,
        timestamp: u64,
    ) -> Self {
        Self {
            id: OperationId::random(),
            user: user.into(),
            kind,
            position,
            content: content.into(),
            timestamp,
        }
    }

    /// Number of chars this edit inserts, removes, or replaces.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    /// True when the edit carries no content and would be a no-op.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
