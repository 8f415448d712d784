//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long to wait for a sync response before reporting an error (ms).
pub const DEFAULT_SYNC_TIMEOUT_MS: u64 = 10_000;

/// How long a peer cursor may sit idle before it is dropped (ms).
pub const DEFAULT_CURSOR_IDLE_MS: u64 = 30_000;

/// Tunables for one document session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Window for the initial sync round-trip. On expiry the host sees an
    /// error flag; the session keeps waiting and the host may seed.
    pub sync_timeout_ms: u64,

    /// Idle window after which peer cursors are dropped. `None` keeps
    /// them until the connection closes.
    pub cursor_idle_ms: Option<u64>,

    /// Colour (RGBA) broadcast with local cursor moves. `None` picks a
    /// palette colour from the user id.
    pub cursor_color: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
            cursor_idle_ms: Some(DEFAULT_CURSOR_IDLE_MS),
            cursor_color: None,
        }
    }
}

impl SessionConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn cursor_idle(&self) -> Option<Duration> {
        self.cursor_idle_ms.map(Duration::from_millis)
    }
}
