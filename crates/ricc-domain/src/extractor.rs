//! The pluggable PDF extraction capability (§9 design note, grounded in
//! `canonical_pipeline.py`'s `CanonicalTextPipeline.extract`).
//!
//! The canonicalize worker (C10) depends on `dyn Extractor`, never on a
//! concrete PDF library directly. That keeps the worker testable with an
//! in-memory fake and leaves the real extraction backend (e.g. a PDF text
//! layer reader) as a drop-in collaborator.

use async_trait::async_trait;
use ricc_core::CoreError;
use serde::{Deserialize, Serialize};

use crate::chunking::PageSpan;

/// One page's geometry, in points, as reported by the extraction backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBBox {
    pub width: f64,
    pub height: f64,
    pub unit: &'static str,
}

/// One page's character span and geometry within the concatenated
/// `stable_text` (§4.4: the `page_map` artifact's per-entry shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPage {
    pub page: u32,
    pub start_char: usize,
    pub end_char: usize,
    pub bbox: PageBBox,
}

impl From<&ExtractedPage> for PageSpan {
    fn from(p: &ExtractedPage) -> Self {
        PageSpan { page: p.page, start_char: p.start_char, end_char: p.end_char }
    }
}

/// A single text line's layout geometry (the `layout_map` artifact's shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutLine {
    pub page: u32,
    pub bbox: Option<[f64; 4]>,
    pub spans: Vec<LayoutSpan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSpan {
    pub text: String,
    pub bbox: Option<[f64; 4]>,
}

/// Everything the canonicalize worker needs out of extraction (§4.7 step 2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub stable_text: String,
    pub pages: Vec<ExtractedPage>,
    pub layout_lines: Vec<LayoutLine>,
}

impl ExtractionOutput {
    /// The `page_map` view used by [`crate::chunking::chunk_text`].
    pub fn page_map(&self) -> Vec<PageSpan> {
        self.pages.iter().map(PageSpan::from).collect()
    }
}

/// Capability interface for turning raw PDF bytes into the canonical triple
/// of stable text, page map, and layout map.
///
/// Implementations must be deterministic for a given byte string: the same
/// PDF bytes must always yield byte-identical `stable_text` so that
/// downstream digests and chunk boundaries are reproducible.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractionOutput, CoreError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fakes {
    use super::*;

    /// Deterministic single-page extractor for orchestrator/worker tests.
    pub struct FakeExtractor {
        pub stable_text: String,
    }

    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(&self, _pdf_bytes: &[u8]) -> Result<ExtractionOutput, CoreError> {
            let len = self.stable_text.chars().count();
            Ok(ExtractionOutput {
                stable_text: self.stable_text.clone(),
                pages: vec![ExtractedPage {
                    page: 1,
                    start_char: 0,
                    end_char: len,
                    bbox: PageBBox { width: 612.0, height: 792.0, unit: "pt" },
                }],
                layout_lines: Vec::new(),
            })
        }
    }
}
