//! `ricc-bus` — C3: the single ordered `events` topic (§6).
//!
//! The wire contract is canonical JSON of [`DomainEvent`] (§6, "message body
//! is canonical JSON of `DomainEvent`"); the actual transport (Kafka in the
//! reference deployment) is out of scope (§1) — this crate provides the
//! in-process implementation that is both the real bus for a single-process
//! deployment and the fake used by orchestrator/worker tests, so the two
//! never drift apart.
//!
//! Ordering: a [`tokio::sync::broadcast`] channel preserves publish order
//! per subscriber, which is enough to satisfy §5's requirement that
//! `VERSION_CREATED` precede any downstream event for the same `version_id`
//! — the orchestrator publishes it only after its own write commits, and
//! every subscriber sees publishes in that same order.

use async_trait::async_trait;
use ricc_core::{BusError, CanonicalBytes, CoreError};
use ricc_domain::DomainEvent;
use tokio::sync::broadcast;

/// Abstraction over the single `events` topic. A real multi-process
/// deployment would implement this against Kafka (or similar); this crate
/// ships only the in-process implementation, since the wire format itself
/// is explicitly out of scope.
#[async_trait]
pub trait Bus: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), CoreError>;

    /// Registers a new consumer group. Each group receives every event
    /// published from this point forward, independent of other groups —
    /// matching §5's "each worker type is one or more long-lived consumers
    /// on a shared topic with a distinct consumer group".
    fn subscribe(&self, consumer_group: &str) -> Subscription;
}

/// A live handle into the topic for one consumer group.
pub struct Subscription {
    consumer_group: String,
    receiver: broadcast::Receiver<String>,
}

impl Subscription {
    /// Awaits the next event. A lagged receiver (this group fell more than
    /// the channel's capacity behind) surfaces as a [`BusError::ReceiveFailed`]
    /// rather than silently skipping — callers should treat that as a signal
    /// to resynchronize from the durable system-of-record (§4.9's projector
    /// already does this by rebuilding purely from idempotent upserts).
    pub async fn recv(&mut self) -> Result<DomainEvent, CoreError> {
        let json = self.receiver.recv().await.map_err(|e| {
            BusError::ReceiveFailed { topic: self.consumer_group.clone(), reason: e.to_string() }
        })?;
        serde_json::from_str(&json)
            .map_err(ricc_core::CanonicalizationError::from)
            .map_err(CoreError::from)
    }
}

/// The in-process `events` topic. Capacity bounds how far a slow consumer
/// group may lag behind before it starts missing messages (`RecvError::Lagged`).
pub struct InMemoryBus {
    sender: broadcast::Sender<String>,
}

impl InMemoryBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Bus for InMemoryBus {
    async fn publish(&self, event: &DomainEvent) -> Result<(), CoreError> {
        let canonical = CanonicalBytes::new(event)?;
        let json = String::from_utf8(canonical.as_bytes().to_vec()).expect("canonical JSON is UTF-8");
        tracing::debug!(event_type = %event.event_type, entity_id = %event.entity_id, "publishing domain event");
        // No active subscribers is not an error: the bus doesn't require a
        // live reader at publish time, only that future subscribers see
        // everything published after they subscribe.
        let _ = self.sender.send(json);
        Ok(())
    }

    fn subscribe(&self, consumer_group: &str) -> Subscription {
        Subscription { consumer_group: consumer_group.to_string(), receiver: self.sender.subscribe() }
    }
}
