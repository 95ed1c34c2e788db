//! Deterministic, rule-based helpers that run ahead of any LLM call.
//!
//! Both functions here are pure: no I/O, no randomness, no network. This is
//! what lets [`derive_primary_axis`]'s result sit on the truth side of the
//! truth/suggestion boundary (§9) — a later LLM-derived
//! [`crate::model::PrimaryAxisSuggestion`] never overwrites it.

use crate::model::{PrimaryAxis, UploadRules};
use ricc_core::CoreError;

/// Upload request fields relevant to validation and axis derivation.
///
/// A thin view over the multipart-form fields the API surface collects;
/// it only names what these two functions need.
#[derive(Debug, Clone, Default)]
pub struct UploadFields<'a> {
    pub title: Option<&'a str>,
    pub jurisdiction: Option<&'a str>,
    pub regulation_family: Option<&'a str>,
    pub instrument_type: Option<&'a str>,
    pub tenant_id: Option<&'a str>,
    pub effective_year: Option<i32>,
    pub primary_axis: Option<&'a str>,
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).unwrap_or("").is_empty()
}

/// Checks the upload against the table-driven required-field list (§4.1).
///
/// `primary_axis` is deliberately excluded from any default rule set: its
/// absence is a normal case handled by [`derive_primary_axis`], not a
/// validation failure.
pub fn enforce_upload_rules(rules: &UploadRules, fields: &UploadFields<'_>) -> Result<(), CoreError> {
    let mut missing = Vec::new();
    for field in &rules.required_fields {
        let present = match field.as_str() {
            "title" => !is_blank(fields.title),
            "jurisdiction" => !is_blank(fields.jurisdiction),
            "regulation_family" => !is_blank(fields.regulation_family),
            "instrument_type" => !is_blank(fields.instrument_type),
            "tenant_id" => !is_blank(fields.tenant_id),
            "effective_year" => fields.effective_year.is_some(),
            "primary_axis" => !is_blank(fields.primary_axis),
            _ => true,
        };
        if !present {
            missing.push(field.clone());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::ValidationMissingFields { fields: missing })
    }
}

const PRODUCT_SCOPE_KEYWORDS: &[&str] = &[
    "battery",
    "batteries",
    "aluminium",
    "cement clinker",
    "steel",
    "fertilizer",
    "hydrogen",
];

const THEME_KEYWORDS: &[&str] = &[
    "disclosure",
    "reporting",
    "framework",
    "standard",
    "taxonomy",
    "csrd",
    "esrs",
];

/// Derives `primary_axis` when the uploader left it unset (§4.1, §9).
///
/// Rule, in order:
/// 1. A non-blank `jurisdiction` always yields [`PrimaryAxis::Jurisdiction`].
/// 2. Otherwise, a product keyword anywhere in `title`/`regulation_family`/
///    `instrument_type` (case-insensitive) yields [`PrimaryAxis::ProductScope`].
/// 3. Otherwise, a theme keyword in the same haystack yields [`PrimaryAxis::Theme`].
/// 4. Otherwise [`PrimaryAxis::Theme`] — the safe fallback.
///
/// Pure and total: never calls an LLM, never fails, always returns a value.
pub fn derive_primary_axis(
    jurisdiction: Option<&str>,
    title: Option<&str>,
    regulation_family: Option<&str>,
    instrument_type: Option<&str>,
) -> PrimaryAxis {
    if !is_blank(jurisdiction) {
        return PrimaryAxis::Jurisdiction;
    }

    let haystack = [title.unwrap_or(""), regulation_family.unwrap_or(""), instrument_type.unwrap_or("")]
        .join(" ")
        .to_lowercase();

    if PRODUCT_SCOPE_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return PrimaryAxis::ProductScope;
    }
    if THEME_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return PrimaryAxis::Theme;
    }
    PrimaryAxis::Theme
}
