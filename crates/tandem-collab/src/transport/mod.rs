//! Gossip-swarm transport for document channels, built on iroh P2P
//! networking.
//!
//! - [`GossipNode`]: iroh endpoint + gossip router (one per app instance)
//! - [`GossipChannel`]: per-document [`DocumentChannel`](crate::channel::DocumentChannel)
//!   over a gossip topic derived from the document id

mod gossip;
mod node;

pub use gossip::{document_topic, GossipChannel, TopicId};
pub use iroh::EndpointId;
pub use node::{GossipNode, TransportError};
