//! Bundled default [`Extractor`] until a real PDF engine is wired in as a
//! collaborator (§9: "the real implementation is a collaborator").
//!
//! Treats the whole byte string as one page of UTF-8 text (lossily decoded,
//! so binary PDF bytes still produce *some* deterministic `stable_text`
//! rather than failing extraction outright). Good enough for plain-text
//! fixtures and smoke-testing a deployment; a real PyMuPDF-backed (or
//! equivalent) extractor should replace this for production PDF corpora.

use async_trait::async_trait;
use ricc_core::CoreError;
use ricc_domain::{ExtractedPage, ExtractionOutput, Extractor, PageBBox};

pub struct PlainTextExtractor;

#[async_trait]
impl Extractor for PlainTextExtractor {
    async fn extract(&self, pdf_bytes: &[u8]) -> Result<ExtractionOutput, CoreError> {
        let stable_text = String::from_utf8_lossy(pdf_bytes).into_owned();
        let len = stable_text.chars().count();
        Ok(ExtractionOutput {
            stable_text,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_utf8_as_single_page() {
        let extractor = PlainTextExtractor;
        let out = extractor.extract(b"hello world").await.unwrap();
        assert_eq!(out.stable_text, "hello world");
        assert_eq!(out.pages.len(), 1);
        assert_eq!(out.pages[0].end_char, 11);
    }

    #[tokio::test]
    async fn never_fails_on_non_utf8_bytes() {
        let extractor = PlainTextExtractor;
        let out = extractor.extract(&[0xff, 0xfe, 0x00, 0x80]).await.unwrap();
        assert_eq!(out.pages.len(), 1);
    }
}
