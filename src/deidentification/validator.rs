//! Residual identifier scanning
//!
//! Re-runs detection over de-identified text. Pseudonyms are protected by the
//! detector; shifted dates are legitimate output when date shifting is on.

use crate::deidentification::config::DeidentificationConfig;
use crate::deidentification::detector::PatternDetector;
use crate::deidentification::models::IdentifierCategory;
use crate::deidentification::patterns::PatternLibrary;
use crate::deidentification::pseudonym::PseudonymTemplates;
use crate::domain::Result;
use serde::{Deserialize, Serialize};

/// Characters of context kept on each side of a finding
const EXCERPT_CONTEXT: usize = 20;

/// A residual identifier found in supposedly clean text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub category: IdentifierCategory,
    pub span_start: usize,
    pub span_end: usize,
    /// Surrounding context with every finding replaced by `[REDACTED:<len>]`
    pub excerpt: String,
}

#[derive(Debug, Clone)]
pub struct Validator {
    detector: PatternDetector,
    ignore_dates: bool,
}

impl Validator {
    pub fn new(detector: PatternDetector, ignore_dates: bool) -> Self {
        Self {
            detector,
            ignore_dates,
        }
    }

    /// Validator matching what an engine built from `config` would use
    pub fn from_config(config: &DeidentificationConfig) -> Result<Self> {
        let library = PatternLibrary::with_custom(&config.custom_patterns)?;
        let templates = PseudonymTemplates::new(&config.pseudonym_templates)?;
        let detector = PatternDetector::new(&library, &config.countries)
            .with_protected(templates.shape_regex()?);
        Ok(Self::new(detector, config.enable_date_shifting))
    }

    /// Residual identifiers in `text`
    pub fn scan(&self, text: &str) -> Result<Vec<ValidationIssue>> {
        let spans: Vec<(usize, usize, IdentifierCategory)> = self
            .detector
            .detect(text)?
            .into_iter()
            .filter(|d| !(self.ignore_dates && d.category == IdentifierCategory::Date))
            .map(|d| (d.span_start, d.span_end, d.category))
            .collect();

        Ok(spans
            .iter()
            .map(|&(start, end, category)| ValidationIssue {
                category,
                span_start: start,
                span_end: end,
                excerpt: redacted_excerpt(text, start, end, &spans),
            })
            .collect())
    }

    /// `(is_valid, issues)` for `text`
    pub fn validate(&self, text: &str) -> Result<(bool, Vec<ValidationIssue>)> {
        let issues = self.scan(text)?;
        Ok((issues.is_empty(), issues))
    }
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Context around `start..end` with all findings in the window masked
fn redacted_excerpt(
    text: &str,
    start: usize,
    end: usize,
    findings: &[(usize, usize, IdentifierCategory)],
) -> String {
    let window_start = floor_boundary(text, start.saturating_sub(EXCERPT_CONTEXT));
    let window_end = ceil_boundary(text, end.saturating_add(EXCERPT_CONTEXT));

    let mut masked: Vec<(usize, usize)> = findings
        .iter()
        .filter(|(s, e, _)| *s < window_end && window_start < *e)
        .map(|(s, e, _)| ((*s).max(window_start), (*e).min(window_end)))
        .collect();
    masked.sort_unstable();

    let mut out = String::new();
    let mut cursor = window_start;
    for (s, e) in masked {
        if s < cursor {
            continue;
        }
        out.push_str(&text[cursor..s]);
        out.push_str(&format!("[REDACTED:{}]", text[s..e].chars().count()));
        cursor = e;
    }
    out.push_str(&text[cursor..window_end]);
    out
}
