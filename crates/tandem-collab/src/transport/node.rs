//! GossipNode - iroh endpoint with a gossip router for document channels.

use std::sync::Arc;

use iroh::{Endpoint, EndpointId, SecretKey};
use iroh_gossip::net::{GOSSIP_ALPN, Gossip};
use miette::Diagnostic;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error, Diagnostic)]
#[diagnostic(code(tandem::transport))]
pub enum TransportError {
    #[error("failed to bind endpoint")]
    Bind(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to subscribe to document topic")]
    Subscribe(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// One iroh endpoint plus gossip handler, shared by every document
/// channel in the process.
///
/// The endpoint does direct P2P with relay fallback natively, and
/// relay-only mode in browsers.
pub struct GossipNode {
    endpoint: Endpoint,
    gossip: Gossip,
    #[allow(dead_code)]
    router: iroh::protocol::Router,
}

impl GossipNode {
    /// Spawn a node. Generates a fresh identity when no secret key is
    /// given.
    pub async fn spawn(secret_key: Option<SecretKey>) -> Result<Arc<Self>, TransportError> {
        let secret_key = secret_key.unwrap_or_else(|| SecretKey::generate(&mut rand::rng()));

        let endpoint = Endpoint::builder()
            .secret_key(secret_key)
            .alpns(vec![GOSSIP_ALPN.to_vec()])
            .bind()
            .await
            .map_err(|e| TransportError::Bind(Box::new(e)))?;

        let gossip = Gossip::builder().spawn(endpoint.clone());

        // Dispatch incoming connections by ALPN.
        let router = iroh::protocol::Router::builder(endpoint.clone())
            .accept(GOSSIP_ALPN, gossip.clone())
            .spawn();

        tracing::info!(node_id = %endpoint.id(), "gossip node started");

        Ok(Arc::new(Self {
            endpoint,
            gossip,
            router,
        }))
    }

    /// This node's public identifier, shared with peers so they can
    /// bootstrap into the same swarm.
    pub fn node_id(&self) -> EndpointId {
        self.endpoint.id()
    }

    pub(crate) fn gossip(&self) -> &Gossip {
        &self.gossip
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
