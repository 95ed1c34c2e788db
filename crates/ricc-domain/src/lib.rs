//! `ricc-domain` — the shared data model (§3), deterministic pure
//! algorithms (chunking, primary-axis derivation), and pluggable
//! capability interfaces (extractor, LLM) used across the ingestion
//! pipeline.
//!
//! Deliberately has no `sqlx` dependency: crates that persist these types
//! (`ricc-registry`, `ricc-evidence`, `ricc-artifacts`, `ricc-audit`) define
//! their own row structs and convert into the types here via `From`/
//! `TryFrom`, keeping this crate storage-agnostic and avoiding an
//! orphan-rule conflict on `sqlx::FromRow`.

pub mod axis;
pub mod chunking;
pub mod events;
pub mod extractor;
pub mod llm;
pub mod model;

pub use axis::{derive_primary_axis, enforce_upload_rules, UploadFields};
pub use chunking::{chunk_text, ChunkSpan, ChunkingManifest, PageSpan};
pub use events::{DomainEvent, EntityType, EventType};
pub use extractor::{ExtractedPage, ExtractionOutput, Extractor, LayoutLine, LayoutSpan, PageBBox};
pub use llm::Llm;
pub use model::{
    ArtifactKind, AuditEvent, Chunk, Document, DocumentKey, DocumentVersion, EvidenceFile,
    DerivedArtifact, LlmRun, LlmRunStatus, ParseEnumError, PrimaryAxis, PrimaryAxisSource,
    PrimaryAxisSuggestion, UploadRules, VersionStatus,
};
