//! `ricc-registry` — C6: documents, versions, the version-chain state
//! machine, and primary-axis suggestions.
//!
//! The registry is the exclusive owner of `documents` and
//! `document_versions` rows (§3's ownership rule) — no other crate writes
//! them directly. Every write here is either an insert or a conditional
//! `UPDATE ... WHERE <expected-state>`, never a read-modify-write, so
//! concurrent orchestrator calls and redelivered worker events can't race
//! past an invariant.

pub mod documents;
pub mod rows;
pub mod rules;
pub mod suggestions;
pub mod versions;

pub use documents::{create_document, find_document_by_id, find_document_by_metadata};
pub use rules::{load_active_rules, set_active_rules};
pub use suggestions::{find_suggestion_by_version, upsert_primary_axis_suggestion};
pub use versions::{
    create_version, find_dedupe_candidate, find_version_by_id, mark_parent_superseded,
    set_artifacts_json, set_status_pending_to_active, set_status_pending_to_failed,
    set_version_file_id, NewVersion,
};
