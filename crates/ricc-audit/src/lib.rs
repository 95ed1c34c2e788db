//! `ricc-audit` — C8: the hash-chained audit log (§4.5).
//!
//! The exclusive owner of `audit_events` rows. Chains are scoped to
//! `(entity_type, entity_id)` — there is no global chain, so unrelated
//! entities never contend on a shared tail and tamper detection for one
//! entity says nothing about another's.

use ricc_core::{CanonicalBytes, CoreError, CorrelationId, EventId, Timestamp};
use ricc_domain::{AuditEvent, EntityType};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    event_id: uuid::Uuid,
    at: chrono::DateTime<chrono::Utc>,
    entity_type: String,
    entity_id: String,
    action: String,
    actor: String,
    correlation_id: uuid::Uuid,
    details_json: serde_json::Value,
    prev_event_hash: Option<String>,
    event_hash: Option<String>,
}

impl TryFrom<AuditRow> for AuditEvent {
    type Error = CoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let entity_type = row.entity_type.parse().map_err(|_| {
            CoreError::Db(sqlx::Error::ColumnDecode {
                index: "entity_type".to_string(),
                source: format!("unrecognized entity_type {:?}", row.entity_type).into(),
            })
        })?;
        Ok(AuditEvent {
            event_id: EventId(row.event_id),
            at: Timestamp::from_utc(row.at),
            entity_type,
            entity_id: row.entity_id,
            action: row.action,
            actor: row.actor,
            correlation_id: CorrelationId(row.correlation_id),
            details_json: row.details_json,
            prev_event_hash: row.prev_event_hash,
            event_hash: row.event_hash,
        })
    }
}

/// The payload that gets canonically serialized and hashed into
/// `event_hash` (§4.5) — every field that makes an entry what it is,
/// plus the hash it chains from.
#[derive(Serialize)]
struct AuditPayload<'a> {
    event_id: &'a EventId,
    entity_type: &'static str,
    entity_id: &'a str,
    action: &'a str,
    actor: &'a str,
    correlation_id: &'a CorrelationId,
    details: &'a serde_json::Value,
    prev_event_hash: &'a Option<String>,
}

pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The `event_hash` of the most recent row in this entity's chain, or
    /// `None` if the chain hasn't started yet. Used both as the next
    /// entry's `prev_event_hash` and as `verify_chain_integrity`'s seed.
    pub async fn last_hash_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Option<String>, CoreError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT event_hash FROM audit_events \
             WHERE entity_type = $1 AND entity_id = $2 AND event_hash IS NOT NULL \
             ORDER BY at DESC LIMIT 1",
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash)
    }

    /// Appends one entry to `(entity_type, entity_id)`'s chain (§4.5).
    /// Reads the current chain head, builds the canonical payload (which
    /// includes that head as `prev_event_hash`), hashes it, and inserts —
    /// the read and the insert are not wrapped in a transaction because a
    /// concurrent writer to the *same* entity chain would be a correctness
    /// bug upstream (each entity's audit trail is written by exactly one
    /// orchestrator/worker invocation at a time).
    pub async fn write(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action: &str,
        actor: &str,
        correlation_id: CorrelationId,
        details: serde_json::Value,
    ) -> Result<AuditEvent, CoreError> {
        let prev_event_hash = self.last_hash_for_entity(entity_type, entity_id).await?;
        let event_id = EventId::new();

        let payload = AuditPayload {
            event_id: &event_id,
            entity_type: entity_type.as_str(),
            entity_id,
            action,
            actor,
            correlation_id: &correlation_id,
            details: &details,
            prev_event_hash: &prev_event_hash,
        };
        let canonical = CanonicalBytes::new(&payload)?;
        let event_hash = ricc_core::sha256_canonical_hex(&canonical);
        let at = Timestamp::now();

        sqlx::query(
            "INSERT INTO audit_events \
             (event_id, at, entity_type, entity_id, action, actor, correlation_id, details_json, prev_event_hash, event_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(event_id.0)
        .bind(at.as_datetime())
        .bind(entity_type.as_str())
        .bind(entity_id)
        .bind(action)
        .bind(actor)
        .bind(correlation_id.0)
        .bind(&details)
        .bind(&prev_event_hash)
        .bind(&event_hash)
        .execute(&self.pool)
        .await?;

        Ok(AuditEvent {
            event_id,
            at,
            entity_type,
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            actor: actor.to_string(),
            correlation_id,
            details_json: details,
            prev_event_hash,
            event_hash: Some(event_hash),
        })
    }

    pub async fn history_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Vec<AuditEvent>, CoreError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT event_id, at, entity_type, entity_id, action, actor, correlation_id, details_json, prev_event_hash, event_hash \
             FROM audit_events WHERE entity_type = $1 AND entity_id = $2 ORDER BY at ASC",
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(AuditEvent::try_from).collect()
    }

    /// Recomputes every chain's hashes from scratch and returns the number
    /// of links that don't match what's stored (§4.5: report the full
    /// extent of tampering, don't stop at the first broken link).
    pub async fn verify_chain_integrity(&self) -> Result<usize, CoreError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT event_id, at, entity_type, entity_id, action, actor, correlation_id, details_json, prev_event_hash, event_hash \
             FROM audit_events ORDER BY entity_type, entity_id, at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut broken = 0usize;
        let mut expected_prev: Option<(String, String, String)> = None;

        for row in &rows {
            let chain_key = (row.entity_type.clone(), row.entity_id.clone());
            let expected_prev_hash = match &expected_prev {
                Some((ty, id, hash)) if *ty == chain_key.0 && *id == chain_key.1 => Some(hash.clone()),
                _ => None,
            };

            if row.prev_event_hash != expected_prev_hash {
                broken += 1;
            }

            let payload = AuditPayload {
                event_id: &EventId(row.event_id),
                entity_type: entity_type_str(&row.entity_type),
                entity_id: &row.entity_id,
                action: &row.action,
                actor: &row.actor,
                correlation_id: &CorrelationId(row.correlation_id),
                details: &row.details_json,
                prev_event_hash: &row.prev_event_hash,
            };
            let canonical = CanonicalBytes::new(&payload)?;
            let recomputed = ricc_core::sha256_canonical_hex(&canonical);
            if Some(&recomputed) != row.event_hash.as_ref() {
                broken += 1;
            }

            expected_prev = row.event_hash.clone().map(|h| (chain_key.0, chain_key.1, h));
        }

        Ok(broken)
    }
}

/// `entity_type` is always one of [`EntityType`]'s known variants once it's
/// round-tripped through a row (`AuditRow::entity_type` was itself produced
/// from `EntityType::as_str()`), so this maps straight back to the matching
/// `&'static str` rather than re-deriving the enum just to call `as_str()`.
fn entity_type_str(s: &str) -> &'static str {
    match s {
        "document" => "document",
        "version" => "version",
        "file" => "file",
        "artifact" => "artifact",
        _ => "system",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test(migrations = "../../migrations")]
    async fn write_chains_sequential_entries(pool: PgPool) -> sqlx::Result<()> {
        let svc = AuditService::new(pool);
        let correlation_id = CorrelationId::new();
        let entity_id = "version:00000000-0000-0000-0000-000000000001";

        let first = svc
            .write(
                EntityType::Version,
                entity_id,
                "REQUEST.RECEIVED",
                "ingest-orchestrator",
                correlation_id,
                serde_json::json!({"step": 1}),
            )
            .await
            .unwrap();
        assert!(first.prev_event_hash.is_none());

        let second = svc
            .write(
                EntityType::Version,
                entity_id,
                "FINGERPRINT.COMPUTED",
                "ingest-orchestrator",
                correlation_id,
                serde_json::json!({"step": 2}),
            )
            .await
            .unwrap();
        assert_eq!(second.prev_event_hash, first.event_hash);

        let history = svc.history_for_entity(EntityType::Version, entity_id).await.unwrap();
        assert_eq!(history.len(), 2);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn independent_entities_have_independent_chains(pool: PgPool) -> sqlx::Result<()> {
        let svc = AuditService::new(pool);
        let cid = CorrelationId::new();

        svc.write(EntityType::Version, "version:a", "REQUEST.RECEIVED", "x", cid, serde_json::json!({}))
            .await
            .unwrap();
        let b = svc
            .write(EntityType::Version, "version:b", "REQUEST.RECEIVED", "x", cid, serde_json::json!({}))
            .await
            .unwrap();
        assert!(b.prev_event_hash.is_none());
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn verify_chain_integrity_reports_zero_when_untouched(pool: PgPool) -> sqlx::Result<()> {
        let svc = AuditService::new(pool);
        let cid = CorrelationId::new();
        for i in 0..3 {
            svc.write(
                EntityType::Version,
                "version:c",
                "STEP",
                "x",
                cid,
                serde_json::json!({"i": i}),
            )
            .await
            .unwrap();
        }
        assert_eq!(svc.verify_chain_integrity().await.unwrap(), 0);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn verify_chain_integrity_detects_tampered_details(pool: PgPool) -> sqlx::Result<()> {
        let svc = AuditService::new(pool);
        let cid = CorrelationId::new();
        svc.write(EntityType::Version, "version:d", "STEP", "x", cid, serde_json::json!({"i": 0}))
            .await
            .unwrap();

        sqlx::query("UPDATE audit_events SET details_json = $1 WHERE entity_id = 'version:d'")
            .bind(serde_json::json!({"i": 999}))
            .execute(svc_pool(&svc))
            .await
            .unwrap();

        assert_eq!(svc.verify_chain_integrity().await.unwrap(), 1);
        Ok(())
    }

    fn svc_pool(svc: &AuditService) -> &PgPool {
        &svc.pool
    }
}
