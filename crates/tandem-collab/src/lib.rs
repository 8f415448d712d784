//! Real-time collaborative text editing core.
//!
//! Multiple users edit the same document over a bidirectional channel:
//! local edits apply immediately, remote edits are position-transformed
//! against everything logged after them, and a joining peer bootstraps
//! from whichever live peer answers its sync request first.
//!
//! The pieces compose around one shared buffer per document:
//!
//! - [`OperationLog`]: timestamp-ordered history of every edit
//! - [`transform`]: best-effort positional transform for concurrent edits
//!   (deliberately not a CRDT; see the module docs for the limits)
//! - [`DocumentSession`]: per-document state machine, IO-free
//! - [`SessionCoordinator`]: async driver pairing a session with a
//!   host-constructed [`DocumentChannel`]
//!
//! Hosts bring their own channel. [`LoopbackHub`] connects sessions in
//! one process; the `iroh` feature adds a gossip-swarm transport.

pub mod buffer;
pub mod channel;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod log;
pub mod loopback;
pub mod messages;
pub mod op;
pub mod presence;
pub mod session;
pub mod transform;
#[cfg(feature = "iroh")]
pub mod transport;

pub use buffer::DocumentBuffer;
pub use channel::{ChannelError, ChannelEvent, DocumentChannel};
pub use clock::OpClock;
pub use config::SessionConfig;
pub use coordinator::{HandleError, SessionCoordinator, SessionHandle, SessionStatus};
pub use log::OperationLog;
pub use loopback::{LoopbackChannel, LoopbackHub};
pub use messages::SyncMessage;
pub use op::{Operation, OperationId, OperationKind};
pub use presence::{PeerCursor, PresenceSet};
pub use session::{DocumentSession, HandleOutcome, SessionError, SessionState};
pub use transform::{transform, transform_against};
