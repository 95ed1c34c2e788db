//! Bundled default [`Llm`] matching the `LLM_MODEL_NAME=stub-llm` default
//! (§6) — a real model integration is a pluggable collaborator (§9), and
//! this is the no-op that ships until one is configured.
//!
//! `primary_axis_suggestion` always suggests the document's stated axis
//! with zero confidence (so it never dominates a truth value), and any
//! other purpose (e.g. `derivation`) returns a short deterministic summary
//! of the input length rather than calling out to anything.

use async_trait::async_trait;
use ricc_core::CoreError;
use ricc_domain::Llm;

pub struct StubLlm;

#[async_trait]
impl Llm for StubLlm {
    async fn run(&self, purpose: &str, input_text: &str) -> Result<String, CoreError> {
        match purpose {
            "primary_axis_suggestion" => Ok(serde_json::json!({
                "suggested_axis": "theme",
                "confidence": 0.0,
                "reasoning": "stub-llm: no model configured"
            })
            .to_string()),
            _ => Ok(format!("stub-llm: {} chars of input, no model configured", input_text.chars().count())),
        }
    }
}
