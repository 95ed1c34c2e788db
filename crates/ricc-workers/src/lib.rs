//! `ricc-workers` — C10-C12: the three long-lived bus consumers downstream
//! of ingestion.
//!
//! Each worker subscribes to the shared `events` topic under its own
//! consumer group and filters for the event types it cares about (§5: the
//! bus delivers every event to every subscriber; filtering is the
//! consumer's job, not the bus's). None of these own any rows outside this
//! crate's two submodules (`llm_runs`, `soi`) — everything else goes
//! through `ricc-registry`, `ricc-evidence`, `ricc-artifacts`, `ricc-audit`.

pub mod canonicalize;
pub mod llm;
pub mod llm_runs;
pub mod retry;
pub mod soi;
pub mod stub_extractor;
pub mod stub_llm;

pub use canonicalize::CanonicalizeWorker;
pub use llm::LlmWorker;
pub use soi::SoiProjector;
pub use stub_extractor::PlainTextExtractor;
pub use stub_llm::StubLlm;
