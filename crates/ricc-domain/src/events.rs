//! Bus event contracts (§6, `EPIC1.*` topics in the reference system).
//!
//! These are the messages `ricc-bus` carries between the orchestrator and
//! the workers. They are distinct from audit log entries (`ricc-audit`):
//! an event here is a dispatch signal, consumed at most meaningfully once
//! per worker; an audit entry is the permanent, hash-chained record of what
//! happened and is never consumed.

use std::str::FromStr;

use ricc_core::{CorrelationId, EventId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::model::ParseEnumError;

/// The bus topics this system publishes and consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "REGISTRY.VERSION_CREATED")]
    RegistryVersionCreated,
    #[serde(rename = "LLM.DERIVATION_REQUESTED")]
    LlmDerivationRequested,
    #[serde(rename = "LLM.DERIVATION_COMPLETED")]
    LlmDerivationCompleted,
    #[serde(rename = "INGESTION.COMPLETED")]
    IngestionCompleted,
    #[serde(rename = "INGESTION.FAILED")]
    IngestionFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegistryVersionCreated => "REGISTRY.VERSION_CREATED",
            Self::LlmDerivationRequested => "LLM.DERIVATION_REQUESTED",
            Self::LlmDerivationCompleted => "LLM.DERIVATION_COMPLETED",
            Self::IngestionCompleted => "INGESTION.COMPLETED",
            Self::IngestionFailed => "INGESTION.FAILED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTRY.VERSION_CREATED" => Ok(Self::RegistryVersionCreated),
            "LLM.DERIVATION_REQUESTED" => Ok(Self::LlmDerivationRequested),
            "LLM.DERIVATION_COMPLETED" => Ok(Self::LlmDerivationCompleted),
            "INGESTION.COMPLETED" => Ok(Self::IngestionCompleted),
            "INGESTION.FAILED" => Ok(Self::IngestionFailed),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// The entity a [`DomainEvent`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Document,
    Version,
    File,
    Artifact,
    System,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Version => "version",
            Self::File => "file",
            Self::Artifact => "artifact",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Self::Document),
            "version" => Ok(Self::Version),
            "file" => Ok(Self::File),
            "artifact" => Ok(Self::Artifact),
            "system" => Ok(Self::System),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// A message published onto the bus (§6, wraps `EPIC1.<event_type>` in the
/// reference system's topic naming — the `EPIC1.` namespace prefix lives in
/// `ricc-bus`'s topic routing, not in this payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: EventId,
    pub event_type: EventType,
    pub at: Timestamp,
    pub correlation_id: CorrelationId,
    pub actor: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub payload: serde_json::Value,
}

impl DomainEvent {
    pub fn new(
        event_type: EventType,
        correlation_id: CorrelationId,
        actor: impl Into<String>,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type,
            at: Timestamp::now(),
            correlation_id,
            actor: actor.into(),
            entity_type,
            entity_id: entity_id.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips() {
        for et in [
            EventType::RegistryVersionCreated,
            EventType::LlmDerivationRequested,
            EventType::LlmDerivationCompleted,
            EventType::IngestionCompleted,
            EventType::IngestionFailed,
        ] {
            assert_eq!(et.as_str().parse::<EventType>().unwrap(), et);
        }
    }

    #[test]
    fn entity_type_round_trips() {
        for et in [
            EntityType::Document,
            EntityType::Version,
            EntityType::File,
            EntityType::Artifact,
            EntityType::System,
        ] {
            assert_eq!(et.as_str().parse::<EntityType>().unwrap(), et);
        }
    }

    #[test]
    fn new_event_fills_id_and_timestamp() {
        let ev = DomainEvent::new(
            EventType::IngestionCompleted,
            CorrelationId::new(),
            "ingest-orchestrator",
            EntityType::Version,
            "version:00000000-0000-0000-0000-000000000000",
            serde_json::json!({"ok": true}),
        );
        assert_eq!(ev.entity_type, EntityType::Version);
        assert_eq!(ev.actor, "ingest-orchestrator");
    }
}
