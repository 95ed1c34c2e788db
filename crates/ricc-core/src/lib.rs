//! `ricc-core` — foundational types for the regulation ingestion core.
//!
//! Every other `ricc-*` crate depends on this one; it depends on none of
//! them (mirrors the teacher stack's own leaf-crate policy).
//!
//! ## Key invariants enforced here
//!
//! 1. **`CanonicalBytes` is the only path to a digestible byte string.**
//!    [`digest::sha256_digest`] accepts `&CanonicalBytes`, not raw bytes —
//!    "hashed `serde_json::to_vec` output directly" becomes a compile error.
//! 2. **Identifiers are newtypes**, not bare `Uuid`/`String` — see [`ids`].
//! 3. **Timestamps are UTC-only**, truncated to seconds, matching the JCS
//!    datetime-normalization rule — see [`temporal::Timestamp`].
//! 4. **Config is a frozen snapshot** read once via [`config::Config::from_env`]
//!    and never mutated — no mid-process config reloads.
//!
//! ## Crate policy
//!
//! - No dependency on any other `ricc-*` crate.
//! - No `unsafe`.
//! - No `panic!()`/`.unwrap()` outside tests.

pub mod canonical;
pub mod config;
pub mod digest;
pub mod error;
pub mod ids;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use config::{AuthMode, Config, StorageMode};
pub use digest::{
    sha256_bytes, sha256_canonical_hex, sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm,
};
pub use error::{BusError, CanonicalizationError, ConfigError, CoreError};
pub use ids::{
    ArtifactId, ChunkId, CorrelationId, DocumentId, EventId, FileId, LlmRunId, SuggestionId,
    VersionId,
};
pub use temporal::Timestamp;
