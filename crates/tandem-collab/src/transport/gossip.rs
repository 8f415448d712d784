//! Per-document gossip channel.

use iroh::EndpointId;
use iroh_gossip::api::{Event, GossipReceiver, GossipSender};
use n0_future::StreamExt;

use super::node::{GossipNode, TransportError};
use crate::channel::{ChannelError, ChannelEvent, DocumentChannel};
use crate::messages::SyncMessage;

/// Topic ID for a document's gossip swarm.
pub type TopicId = iroh_gossip::TopicId;

/// Stable gossip topic for a document id.
///
/// blake3 of the id bytes, so every peer lands on the same 32-byte topic
/// without coordination.
pub fn document_topic(document: &str) -> TopicId {
    let hash = blake3::hash(document.as_bytes());
    TopicId::from_bytes(*hash.as_bytes())
}

/// A [`DocumentChannel`] over one gossip topic.
///
/// Bootstrap peers come from the host's own discovery (a session record,
/// an invite link); the first peer on a document passes none and waits
/// for others to bootstrap off it. Reconnection is iroh's business; the
/// channel reports `Opened` once, when the subscription is up.
pub struct GossipChannel {
    topic: TopicId,
    sender: GossipSender,
    receiver: GossipReceiver,
    opened: bool,
}

impl GossipChannel {
    /// Subscribe to the document's topic on `node`.
    pub async fn join(
        node: &GossipNode,
        document: &str,
        bootstrap: Vec<EndpointId>,
    ) -> Result<Self, TransportError> {
        let topic = document_topic(document);
        let (sender, receiver) = node
            .gossip()
            .subscribe(topic, bootstrap)
            .await
            .map_err(|e| TransportError::Subscribe(Box::new(e)))?
            .split();

        Ok(Self {
            topic,
            sender,
            receiver,
            opened: false,
        })
    }

    pub fn topic(&self) -> TopicId {
        self.topic
    }
}

impl DocumentChannel for GossipChannel {
    async fn broadcast(&mut self, message: &SyncMessage) -> Result<(), ChannelError> {
        let bytes = message
            .to_bytes()
            .map_err(|e| ChannelError::Encode(Box::new(e)))?;
        self.sender
            .broadcast(bytes.into())
            .await
            .map_err(|e| ChannelError::Broadcast(Box::new(e)))?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if !self.opened {
            self.opened = true;
            return Some(ChannelEvent::Opened);
        }
        loop {
            match self.receiver.next().await {
                Some(Ok(Event::Received(message))) => {
                    match SyncMessage::from_bytes(&message.content) {
                        Ok(frame) => return Some(ChannelEvent::Message(frame)),
                        Err(e) => {
                            tracing::warn!(?e, "failed to decode frame");
                            continue;
                        }
                    }
                }
                Some(Ok(Event::NeighborUp(peer))) => {
                    tracing::debug!(%peer, "neighbor up");
                    continue;
                }
                Some(Ok(Event::NeighborDown(peer))) => {
                    tracing::debug!(%peer, "neighbor down");
                    continue;
                }
                Some(Ok(Event::Lagged)) => {
                    tracing::warn!("gossip receiver lagged, frames may be lost");
                    continue;
                }
                Some(Err(e)) => {
                    tracing::warn!(?e, "gossip receiver error");
                    continue;
                }
                None => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_topic_is_deterministic() {
        let a = document_topic("task-42");
        let b = document_topic("task-42");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_documents_get_different_topics() {
        assert_ne!(document_topic("task-42"), document_topic("task-43"));
    }
}
