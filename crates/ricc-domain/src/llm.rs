//! The pluggable LLM capability (§9 design note, grounded in
//! `llm_orchestrator.py`).
//!
//! Every call is recorded as an [`crate::model::LlmRun`] row regardless of
//! outcome — this trait describes only the call itself, not its
//! bookkeeping, which belongs to the caller (C9's suggester path, C11's
//! derivation worker).

use async_trait::async_trait;
use ricc_core::CoreError;

/// Capability interface for a single LLM invocation.
///
/// `purpose` identifies why the call is being made (e.g.
/// `"primary_axis_suggestion"`, `"soi_projection"`) and may influence
/// prompt selection in a real implementation; `input_text` is the fully
/// rendered prompt body. Returns the raw model output as a string — the
/// caller is responsible for parsing it.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn run(&self, purpose: &str, input_text: &str) -> Result<String, CoreError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fakes {
    use super::*;

    /// Returns a fixed response regardless of input, for deterministic
    /// orchestrator/worker tests.
    pub struct FakeLlm {
        pub response: String,
    }

    #[async_trait]
    impl Llm for FakeLlm {
        async fn run(&self, _purpose: &str, _input_text: &str) -> Result<String, CoreError> {
            Ok(self.response.clone())
        }
    }

    /// Always fails, for exercising bounded-retry-then-fail paths.
    pub struct FailingLlm;

    #[async_trait]
    impl Llm for FailingLlm {
        async fn run(&self, purpose: &str, _input_text: &str) -> Result<String, CoreError> {
            Err(CoreError::LlmFailed {
                version_id: ricc_core::VersionId::new(),
                reason: format!("fake failure for purpose {purpose}"),
            })
        }
    }
}
