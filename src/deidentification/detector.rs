//! Pattern-based identifier detection

use crate::deidentification::models::DetectionResult;
use crate::deidentification::patterns::{DetectionPattern, PatternLibrary};
use crate::domain::{CountrySelection, DeidError, Result};
use regex::Regex;

/// Detector over the patterns active for one country selection
///
/// Overlapping matches resolve by priority, then registration order, then
/// position: an accepted span suppresses every later candidate it overlaps.
/// Accepted spans are then masked and the patterns run again, so the part of
/// a suppressed match that lies outside the winning span is still found.
/// Pseudonyms are masked before the first pass and never reported. Shifted
/// dates are ordinary dates to the detector.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    patterns: Vec<DetectionPattern>,
    protected: Option<Regex>,
}

struct Candidate {
    rank: usize,
    start: usize,
    end: usize,
}

impl PatternDetector {
    pub fn new(library: &PatternLibrary, countries: &CountrySelection) -> Self {
        Self {
            patterns: library.patterns_for(countries).into_iter().cloned().collect(),
            protected: None,
        }
    }

    /// Never report spans overlapping a match of `shape`
    pub fn with_protected(mut self, shape: Regex) -> Self {
        self.protected = Some(shape);
        self
    }

    /// Active patterns in evaluation order
    pub fn patterns(&self) -> &[DetectionPattern] {
        &self.patterns
    }

    /// Accepted detections in `text`, sorted by position
    ///
    /// Fails with [`DeidError::Detection`] when a backtracking matcher gives up.
    pub fn detect(&self, text: &str) -> Result<Vec<DetectionResult>> {
        let protected: Vec<(usize, usize)> = self
            .protected
            .as_ref()
            .map(|re| re.find_iter(text).map(|m| (m.start(), m.end())).collect())
            .unwrap_or_default();

        let mut masked = text.to_string();
        for &(start, end) in &protected {
            mask(&mut masked, start, end);
        }

        let mut accepted: Vec<DetectionResult> = Vec::new();
        loop {
            let found = self.resolve_pass(&masked, &protected, &accepted)?;
            if found.is_empty() {
                break;
            }
            for detection in &found {
                mask(&mut masked, detection.span_start, detection.span_end);
            }
            accepted.extend(found);
        }

        accepted.sort_by_key(|d| d.span_start);
        Ok(accepted)
    }

    /// One matching pass; returns spans disjoint from `protected` and `accepted`
    fn resolve_pass(
        &self,
        text: &str,
        protected: &[(usize, usize)],
        accepted: &[DetectionResult],
    ) -> Result<Vec<DetectionResult>> {
        let mut candidates = Vec::new();
        for (rank, pattern) in self.patterns.iter().enumerate() {
            let spans = pattern.matcher.spans(text, pattern.group).map_err(|e| {
                DeidError::Detection(format!("pattern '{}' failed: {e}", pattern.name))
            })?;
            candidates.extend(
                spans
                    .into_iter()
                    .map(|(start, end)| Candidate { rank, start, end }),
            );
        }

        // rank already encodes priority desc, then registration order
        candidates.sort_by_key(|c| (c.rank, c.start));

        let mut found: Vec<DetectionResult> = Vec::new();
        for candidate in candidates {
            let blocked = protected
                .iter()
                .any(|&(s, e)| s < candidate.end && candidate.start < e)
                || accepted
                    .iter()
                    .chain(found.iter())
                    .any(|d| d.overlaps(candidate.start, candidate.end));
            if blocked {
                continue;
            }
            let pattern = &self.patterns[candidate.rank];
            found.push(DetectionResult {
                span_start: candidate.start,
                span_end: candidate.end,
                category: pattern.category,
                priority: pattern.priority,
            });
        }
        Ok(found)
    }
}

/// Overwrite `text[start..end]` byte for byte so offsets stay valid
fn mask(text: &mut String, start: usize, end: usize) {
    text.replace_range(start..end, &MASK.to_string().repeat(end - start));
}

const MASK: char = '~';
