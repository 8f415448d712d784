//! In-process channel: every subscriber sees every frame.
//!
//! Backs unit and integration tests, and embedded multi-view hosts where
//! several sessions in one process edit the same document. Frames travel
//! as encoded bytes so the wire codec is exercised end to end, and a
//! sender receives its own frames back, the same way a gossip swarm
//! echoes broadcasts, so own-echo suppression gets real coverage.

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::channel::{ChannelError, ChannelEvent, DocumentChannel};
use crate::messages::SyncMessage;

const DEFAULT_CAPACITY: usize = 256;

/// Hands out connected [`LoopbackChannel`]s.
///
/// Frames broadcast before a channel is created are not replayed to it;
/// late joiners rely on the sync request/response exchange, exactly as
/// they would on a real transport.
#[derive(Debug)]
pub struct LoopbackHub {
    frames: broadcast::Sender<Bytes>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A hub whose per-subscriber buffer holds `capacity` frames; slower
    /// consumers past that lag and drop the oldest.
    pub fn with_capacity(capacity: usize) -> Self {
        let (frames, _) = broadcast::channel(capacity);
        Self { frames }
    }

    /// Create a channel attached to this hub.
    pub fn channel(&self) -> LoopbackChannel {
        LoopbackChannel {
            sender: self.frames.clone(),
            receiver: self.frames.subscribe(),
            opened: false,
        }
    }
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber on a [`LoopbackHub`].
#[derive(Debug)]
pub struct LoopbackChannel {
    sender: broadcast::Sender<Bytes>,
    receiver: broadcast::Receiver<Bytes>,
    opened: bool,
}

impl DocumentChannel for LoopbackChannel {
    async fn broadcast(&mut self, message: &SyncMessage) -> Result<(), ChannelError> {
        let bytes = message
            .to_bytes()
            .map_err(|e| ChannelError::Encode(Box::new(e)))?;
        self.sender
            .send(Bytes::from(bytes))
            .map_err(|_| ChannelError::Closed)?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if !self.opened {
            self.opened = true;
            return Some(ChannelEvent::Opened);
        }
        loop {
            match self.receiver.recv().await {
                Ok(bytes) => match SyncMessage::from_bytes(&bytes) {
                    Ok(message) => return Some(ChannelEvent::Message(message)),
                    Err(e) => {
                        tracing::warn!(?e, "skipping undecodable frame");
                        continue;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "loopback receiver lagged, frames were dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
