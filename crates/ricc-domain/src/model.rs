//! The entities of §3: documents, versions, evidence, derived artifacts,
//! chunks, suggestions, and LLM runs.
//!
//! These are plain data types with no storage-layer dependency — sqlx-backed
//! crates (`ricc-registry`, `ricc-evidence`, `ricc-artifacts`, `ricc-audit`)
//! define their own row structs and convert into these via `From`/`TryFrom`,
//! so this crate never needs to depend on sqlx.

use std::str::FromStr;

use ricc_core::{ArtifactId, ChunkId, DocumentId, FileId, LlmRunId, SuggestionId, Timestamp, VersionId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a stored string doesn't match one of an enum's known variants.
#[derive(Debug, Error)]
#[error("not a recognized value: {0}")]
pub struct ParseEnumError(pub String);

/// The document's classification dimension. Truth, never a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAxis {
    Jurisdiction,
    ProductScope,
    Theme,
}

impl PrimaryAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jurisdiction => "jurisdiction",
            Self::ProductScope => "product_scope",
            Self::Theme => "theme",
        }
    }
}

impl std::fmt::Display for PrimaryAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimaryAxis {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jurisdiction" => Ok(Self::Jurisdiction),
            "product_scope" => Ok(Self::ProductScope),
            "theme" => Ok(Self::Theme),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// Provenance of a document's `primary_axis` value: whether the operator
/// supplied it directly, or it was derived by the deterministic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimaryAxisSource {
    Upload,
    DeterministicRule,
}

impl PrimaryAxisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "UPLOAD",
            Self::DeterministicRule => "DETERMINISTIC_RULE",
        }
    }
}

impl std::fmt::Display for PrimaryAxisSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimaryAxisSource {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOAD" => Ok(Self::Upload),
            "DETERMINISTIC_RULE" => Ok(Self::DeterministicRule),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// §4.10's version state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VersionStatus {
    Pending,
    Active,
    Superseded,
    Failed,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Superseded => "SUPERSEDED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Superseded | Self::Failed)
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACTIVE" => Ok(Self::Active),
            "SUPERSEDED" => Ok(Self::Superseded),
            "FAILED" => Ok(Self::Failed),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// Kinds of immutable derived artifacts a version may accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    StableText,
    PageMap,
    LayoutMap,
    ChunkSet,
    RetrievalManifest,
    CharMap,
    CharBoxes,
    LlmOutput,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StableText => "stable_text",
            Self::PageMap => "page_map",
            Self::LayoutMap => "layout_map",
            Self::ChunkSet => "chunk_set",
            Self::RetrievalManifest => "retrieval_manifest",
            Self::CharMap => "char_map",
            Self::CharBoxes => "char_boxes",
            Self::LlmOutput => "llm_output",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable_text" => Ok(Self::StableText),
            "page_map" => Ok(Self::PageMap),
            "layout_map" => Ok(Self::LayoutMap),
            "chunk_set" => Ok(Self::ChunkSet),
            "retrieval_manifest" => Ok(Self::RetrievalManifest),
            "char_map" => Ok(Self::CharMap),
            "char_boxes" => Ok(Self::CharBoxes),
            "llm_output" => Ok(Self::LlmOutput),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// Status of one `llm_runs` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LlmRunStatus {
    Pending,
    Completed,
    Failed,
}

impl LlmRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for LlmRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmRunStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(ParseEnumError(other.to_string())),
        }
    }
}

/// Logical regulation identity. See §3 invariants: the 4-tuple is unique,
/// `primary_axis` is immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub title: String,
    pub jurisdiction: String,
    pub regulation_family: String,
    pub instrument_type: String,
    pub primary_axis: PrimaryAxis,
    pub primary_axis_source: PrimaryAxisSource,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The 4-tuple that identifies a document (`documents(title, jurisdiction,
/// regulation_family, instrument_type)` unique constraint).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub title: String,
    pub jurisdiction: String,
    pub regulation_family: String,
    pub instrument_type: String,
}

/// An ingestion snapshot in a document's version chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub version_id: VersionId,
    pub document_id: DocumentId,
    pub version_label: Option<String>,
    pub effective_date: Option<chrono::NaiveDate>,
    pub parent_version_id: Option<VersionId>,
    pub tenant_id: String,
    pub effective_year: i32,
    pub uploaded_by: String,
    pub uploaded_at: Option<Timestamp>,
    pub raw_sha256: String,
    pub file_id: Option<FileId>,
    pub status: VersionStatus,
    pub artifacts_json: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// An immutable uploaded PDF, keyed by `(document, version, file)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFile {
    pub file_id: FileId,
    pub version_id: VersionId,
    pub sha256: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_uri: String,
    pub created_at: Timestamp,
}

/// An immutable derived blob registered against a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedArtifact {
    pub artifact_id: ArtifactId,
    pub version_id: VersionId,
    pub kind: ArtifactKind,
    pub sha256: String,
    pub storage_uri: String,
    pub generator_name: String,
    pub generator_version: String,
    pub created_at: Timestamp,
}

/// A derived-only classification suggestion. Never read as truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryAxisSuggestion {
    pub suggestion_id: SuggestionId,
    pub version_id: VersionId,
    pub suggested_axis: PrimaryAxis,
    pub model_name: String,
    pub model_version: String,
    pub confidence: f64,
    pub details_json: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One chunk emitted by canonicalization (§4.7 step 4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub version_id: VersionId,
    pub chunk_set_artifact_id: ArtifactId,
    pub chunk_schema_version: String,
    pub start_char: usize,
    pub end_char: usize,
    pub page_start: u32,
    pub page_end: u32,
    pub text_sha256: String,
}

/// One invocation of the pluggable LLM (either C9's primary-axis suggester
/// or C11's derivation call). Purely observational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRun {
    pub run_id: LlmRunId,
    pub version_id: VersionId,
    pub purpose: String,
    pub prompt_hash: String,
    pub input_fingerprint: String,
    pub status: LlmRunStatus,
    pub output_artifact_id: Option<ArtifactId>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Table-driven upload validation configuration (§4.1, `refdata/rules.py`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRules {
    pub rules_version: String,
    pub required_fields: Vec<String>,
    pub max_pdf_mb: u32,
    pub updated_at: Timestamp,
}

impl Default for UploadRules {
    /// The reference implementation's `DEFAULT_RULES`, minus `primary_axis`
    /// — that field is optional by design (see §4.6 step 5: absence triggers
    /// deterministic derivation rather than a validation failure).
    fn default() -> Self {
        Self {
            rules_version: "v1".to_string(),
            required_fields: vec![
                "title".to_string(),
                "jurisdiction".to_string(),
                "regulation_family".to_string(),
                "instrument_type".to_string(),
                "tenant_id".to_string(),
                "effective_year".to_string(),
            ],
            max_pdf_mb: 50,
            updated_at: Timestamp::now(),
        }
    }
}

/// One append-only entry in an entity's hash chain (§4.5). `prev_event_hash`
/// and `event_hash` are `None` only in memory before the audit service
/// computes them; every persisted row has both set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: ricc_core::EventId,
    pub at: Timestamp,
    pub entity_type: crate::events::EntityType,
    pub entity_id: String,
    pub action: String,
    pub actor: String,
    pub correlation_id: ricc_core::CorrelationId,
    pub details_json: serde_json::Value,
    pub prev_event_hash: Option<String>,
    pub event_hash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_round_trips_through_str() {
        for axis in [PrimaryAxis::Jurisdiction, PrimaryAxis::ProductScope, PrimaryAxis::Theme] {
            assert_eq!(axis.as_str().parse::<PrimaryAxis>().unwrap(), axis);
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            VersionStatus::Pending,
            VersionStatus::Active,
            VersionStatus::Superseded,
            VersionStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<VersionStatus>().unwrap(), s);
        }
    }

    #[test]
    fn terminal_states() {
        assert!(VersionStatus::Superseded.is_terminal());
        assert!(VersionStatus::Failed.is_terminal());
        assert!(!VersionStatus::Pending.is_terminal());
        assert!(!VersionStatus::Active.is_terminal());
    }

    #[test]
    fn default_rules_omit_primary_axis() {
        let rules = UploadRules::default();
        assert!(!rules.required_fields.contains(&"primary_axis".to_string()));
    }
}
