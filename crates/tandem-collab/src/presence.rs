//! Presence tracking for peers editing the same document.
//!
//! Cursors are ephemeral: populated from cursor frames, never persisted or
//! logged, and dropped when the connection goes or a peer falls idle.

use std::collections::HashMap;
use std::time::Duration;

use smol_str::SmolStr;
use web_time::Instant;

/// A peer's cursor state.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerCursor {
    /// The peer's user id.
    pub user: SmolStr,
    /// Display name for presence UI.
    pub user_name: SmolStr,
    /// Character offset in the document.
    pub position: usize,
    /// The peer's colour (RGBA).
    pub color: u32,
    /// When this cursor was last updated.
    pub updated_at: Instant,
}

/// Predefined cursor colours (pastel-ish for readability).
pub const CURSOR_COLORS: [u32; 8] = [
    0xFF6B6BFF, // Red
    0x4ECDC4FF, // Teal
    0xFFE66DFF, // Yellow
    0x95E1D3FF, // Mint
    0xF38181FF, // Coral
    0xAA96DAFF, // Purple
    0xFCBF49FF, // Orange
    0x2EC4B6FF, // Cyan
];

/// Deterministic palette colour for a user id, so a user keeps the same
/// colour across sessions without coordination.
pub fn color_for_user(user: &str) -> u32 {
    let mut acc: usize = 0;
    for byte in user.bytes() {
        acc = acc.wrapping_mul(31).wrapping_add(byte as usize);
    }
    CURSOR_COLORS[acc % CURSOR_COLORS.len()]
}

/// All peer cursors in a session, keyed by user id.
#[derive(Debug, Default, Clone)]
pub struct PresenceSet {
    cursors: HashMap<SmolStr, PeerCursor>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a peer's cursor, replacing any previous entry for
    /// the same user.
    pub fn upsert(
        &mut self,
        user: impl Into<SmolStr>,
        user_name: impl Into<SmolStr>,
        position: usize,
        color: u32,
    ) {
        let user = user.into();
        self.cursors.insert(
            user.clone(),
            PeerCursor {
                user,
                user_name: user_name.into(),
                position,
                color,
                updated_at: Instant::now(),
            },
        );
    }

    pub fn remove(&mut self, user: &str) -> Option<PeerCursor> {
        self.cursors.remove(user)
    }

    pub fn get(&self, user: &str) -> Option<&PeerCursor> {
        self.cursors.get(user)
    }

    pub fn contains(&self, user: &str) -> bool {
        self.cursors.contains_key(user)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerCursor> {
        self.cursors.values()
    }

    /// Cursors ordered by user id, for stable rendering.
    pub fn snapshot(&self) -> Vec<PeerCursor> {
        let mut cursors: Vec<PeerCursor> = self.cursors.values().cloned().collect();
        cursors.sort_by(|a, b| a.user.cmp(&b.user));
        cursors
    }

    /// Drop cursors idle longer than `max_age`. Returns true if any were
    /// dropped.
    pub fn prune_stale(&mut self, max_age: Duration) -> bool {
        let now = Instant::now();
        let before = self.cursors.len();
        self.cursors
            .retain(|_, cursor| now.duration_since(cursor.updated_at) <= max_age);
        self.cursors.len() != before
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}
