//! The structured error hierarchy shared by every `ricc-*` crate.
//!
//! [`CoreError`] carries one variant per error kind in the spec plus
//! infrastructure passthrough variants (`Db`, `Bus`) for failures that don't
//! map to a domain kind. Each variant holds structured fields rather than a
//! bare string, so [`CoreError::error_kind`] and [`CoreError::detail`] can
//! reconstruct the `{error_kind, detail}` wire contract without parsing.

use thiserror::Error;

use crate::ids::{DocumentId, FileId, VersionId};

/// Error during canonical (JCS) serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    #[error("canonical serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error constructing a frozen [`crate::config::Config`] snapshot.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {key} could not be parsed as {expected}: {value:?}")]
    InvalidValue { key: &'static str, expected: &'static str, value: String },
}

/// Error from the message bus abstraction (`ricc-bus`), kept here so
/// `CoreError` can offer a `#[from]` conversion without creating a
/// dependency cycle back onto `ricc-bus`.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("failed to publish to topic {topic}: {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("failed to receive from topic {topic}: {reason}")]
    ReceiveFailed { topic: String, reason: String },
}

/// The top-level fallible result type for every domain operation (C1-C12).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("missing required fields: {fields:?}")]
    ValidationMissingFields { fields: Vec<String> },

    #[error("payload too large: {actual_bytes} bytes exceeds max_pdf_mb={max_mb}")]
    PayloadTooLarge { max_mb: u32, actual_bytes: usize },

    #[error("unsupported mime type: {mime}")]
    UnsupportedMime { mime: String },

    #[error("primary_axis value {value:?} is not one of jurisdiction/product_scope/theme")]
    InvalidPrimaryAxis { value: String },

    #[error(
        "primary_axis mismatch for document {document_id}: stored={stored} attempted={attempted}"
    )]
    PrimaryAxisMismatch { document_id: DocumentId, stored: String, attempted: String },

    #[error("parent_version_id {parent_version_id} does not exist")]
    ParentVersionUnknown { parent_version_id: VersionId },

    #[error(
        "parent_version_id {parent_version_id} belongs to document {actual_document_id}, not {expected_document_id}"
    )]
    ParentVersionWrongDocument {
        parent_version_id: VersionId,
        expected_document_id: DocumentId,
        actual_document_id: DocumentId,
    },

    #[error("evidence file {file_id} not found")]
    EvidenceNotFound { file_id: FileId },

    #[error("failed to read evidence file {file_id}: {reason}")]
    EvidenceReadFailed { file_id: FileId, reason: String },

    #[error("canonicalization failed for version {version_id}: {reason}")]
    CanonicalizationFailed { version_id: VersionId, reason: String },

    #[error("LLM derivation failed for version {version_id}: {reason}")]
    LlmFailed { version_id: VersionId, reason: String },

    #[error("storage write failed for key {key}: {reason}")]
    StorageWriteFailed { key: String, reason: String },

    #[error("duplicate key violation on constraint {constraint}")]
    DuplicateKey { constraint: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl CoreError {
    /// The `error_kind` string used in the `{error_kind, detail,
    /// correlation_id}` wire contract of §7. Stable across releases; treat
    /// renaming a variant without updating this match as a breaking change.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ValidationMissingFields { .. } => "VALIDATION_MISSING_FIELDS",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMime { .. } => "UNSUPPORTED_MIME",
            Self::InvalidPrimaryAxis { .. } => "INVALID_PRIMARY_AXIS",
            Self::PrimaryAxisMismatch { .. } => "PRIMARY_AXIS_MISMATCH",
            Self::ParentVersionUnknown { .. } => "PARENT_VERSION_UNKNOWN",
            Self::ParentVersionWrongDocument { .. } => "PARENT_VERSION_WRONG_DOCUMENT",
            Self::EvidenceNotFound { .. } => "EVIDENCE_NOT_FOUND",
            Self::EvidenceReadFailed { .. } => "EVIDENCE_READ_FAILED",
            Self::CanonicalizationFailed { .. } => "CANONICALIZATION_FAILED",
            Self::LlmFailed { .. } => "LLM_FAILED",
            Self::StorageWriteFailed { .. } => "STORAGE_WRITE_FAILED",
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Canonicalization(_) => "CANONICALIZATION_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Bus(_) => "BUS_ERROR",
            Self::Db(_) => "DB_ERROR",
        }
    }

    pub fn detail(&self) -> String {
        self.to_string()
    }

    /// Whether this error was raised by a unique-constraint race, and so is
    /// recoverable by re-reading the row (§7's `DUPLICATE_KEY` recovery path).
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::DuplicateKey { .. } => true,
            Self::Db(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}
