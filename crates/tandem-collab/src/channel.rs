//! The bidirectional channel a session speaks over.
//!
//! The channel is constructed by the host and handed to the session
//! coordinator; the core never owns a process-wide connection. Reconnects
//! and backoff are the channel's business: the coordinator only reacts to
//! the open/close events it reports.

use std::future::Future;

use miette::Diagnostic;

use crate::messages::SyncMessage;

/// Error type for channel operations.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[diagnostic(code(tandem::channel))]
pub enum ChannelError {
    #[error("failed to encode frame")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to broadcast frame")]
    Broadcast(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("channel closed")]
    Closed,
}

/// Events a channel reports to its session coordinator.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The connection is up; frames can flow.
    Opened,

    /// A frame arrived from a peer.
    Message(SyncMessage),

    /// The connection dropped. The channel may reopen it later and
    /// report `Opened` again.
    Closed,
}

/// A bidirectional frame channel for one document.
pub trait DocumentChannel {
    /// Broadcast a frame to every peer on the document.
    fn broadcast(
        &mut self,
        message: &SyncMessage,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Wait for the next channel event.
    ///
    /// Implementations drop undecodable frames (with a warning) rather
    /// than surface them. `None` means the channel is permanently gone.
    fn next_event(&mut self) -> impl Future<Output = Option<ChannelEvent>> + Send;
}
