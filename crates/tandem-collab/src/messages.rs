//! Wire protocol for collaborative editing frames.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::op::Operation;

/// Frames exchanged between peers editing the same document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Sent by a joining peer to request the authoritative state.
    SyncRequest {
        /// The joining user.
        user: SmolStr,
        /// Which document they want; peers on other documents ignore it.
        document: SmolStr,
    },

    /// Sent by a live peer in reply to a sync request.
    SyncResponse {
        /// Full buffer text.
        content: String,
        /// Full operation log, in timestamp order.
        operations: Vec<Operation>,
    },

    /// Broadcast on every local edit.
    Operation(Operation),

    /// Broadcast on every local cursor move (presence).
    CursorUpdate {
        /// The moving user.
        user: SmolStr,
        /// Display name for presence UI.
        user_name: SmolStr,
        /// Cursor position in the document (chars).
        position: usize,
        /// The user's colour (RGBA).
        color: u32,
    },
}

impl SyncMessage {
    /// Serialize to postcard bytes for wire transmission.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_stdvec(self)
    }

    /// Deserialize from postcard bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
