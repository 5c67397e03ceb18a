//! Pattern library for identifier detection
//!
//! The library is an immutable list of [`DetectionPattern`]s compiled once from
//! the built-in table plus any custom definitions. Callers pick the slice that
//! applies to a run with [`PatternLibrary::patterns_for`].

pub mod table;

use crate::deidentification::models::IdentifierCategory;
use crate::domain::{CountryCode, CountrySelection, DeidError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub use table::{PatternSpec, BUILTIN_PATTERNS};

/// Compiled matcher
///
/// Most patterns compile with `regex` (linear time). Patterns that need
/// back-references or look-around fall back to `fancy_regex`, whose
/// backtracking can fail at match time.
#[derive(Clone)]
pub enum Matcher {
    Standard(regex::Regex),
    Backtracking(fancy_regex::Regex),
}

impl Matcher {
    /// Compile a pattern, falling back to the backtracking engine when needed
    pub fn compile(pattern: &str) -> std::result::Result<Self, String> {
        match regex::Regex::new(pattern) {
            Ok(re) => Ok(Self::Standard(re)),
            Err(standard_err) => fancy_regex::Regex::new(pattern)
                .map(Self::Backtracking)
                .map_err(|fancy_err| format!("{standard_err}; {fancy_err}")),
        }
    }

    /// Whether this matcher uses the backtracking engine
    pub fn is_backtracking(&self) -> bool {
        matches!(self, Self::Backtracking(_))
    }

    /// Byte spans of `group` (0 = whole match) for every match in `text`
    ///
    /// Matches where the group did not participate, and empty spans, are
    /// skipped.
    pub fn spans(&self, text: &str, group: usize) -> std::result::Result<Vec<(usize, usize)>, String> {
        let mut spans = Vec::new();
        match self {
            Self::Standard(re) => {
                for caps in re.captures_iter(text) {
                    if let Some(m) = caps.get(group) {
                        if m.start() < m.end() {
                            spans.push((m.start(), m.end()));
                        }
                    }
                }
            }
            Self::Backtracking(re) => {
                for caps in re.captures_iter(text) {
                    let caps = caps.map_err(|e| e.to_string())?;
                    if let Some(m) = caps.get(group) {
                        if m.start() < m.end() {
                            spans.push((m.start(), m.end()));
                        }
                    }
                }
            }
        }
        Ok(spans)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard(re) => f.debug_tuple("Standard").field(&re.as_str()).finish(),
            Self::Backtracking(re) => f.debug_tuple("Backtracking").field(&re.as_str()).finish(),
        }
    }
}

/// A compiled detection pattern. Registered once, never mutated.
#[derive(Debug, Clone)]
pub struct DetectionPattern {
    pub name: String,
    pub category: IdentifierCategory,
    pub matcher: Matcher,
    pub priority: i32,
    /// `All` for international patterns, otherwise the owning countries
    pub countries: CountrySelection,
    /// Capture group holding the identifier (0 = whole match)
    pub group: usize,
    pub description: String,
}

impl DetectionPattern {
    /// Whether the pattern is active for `selection`
    pub fn applies_to(&self, selection: &CountrySelection) -> bool {
        match &self.countries {
            CountrySelection::All => true,
            CountrySelection::Only(codes) => codes.iter().any(|c| selection.includes(*c)),
        }
    }

    fn from_spec(spec: &PatternSpec) -> Result<Self> {
        let matcher = Matcher::compile(spec.regex).map_err(|e| {
            DeidError::Config(format!("Invalid regex in pattern '{}': {e}", spec.name))
        })?;
        Ok(Self {
            name: spec.name.to_string(),
            category: spec.category,
            matcher,
            priority: spec.priority,
            countries: spec
                .country
                .map(|c| CountrySelection::Only(vec![c]))
                .unwrap_or(CountrySelection::All),
            group: spec.group,
            description: spec.description.to_string(),
        })
    }
}

/// Custom pattern definition from TOML
///
/// ```toml
/// [[patterns]]
/// name = "study_subject_id"
/// category = "CUSTOM"
/// regex = '\bSUBJ-\d{5}\b'
/// priority = 90
/// countries = ["US"]
/// ```
#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq)]
pub struct CustomPatternDefinition {
    pub name: String,
    /// Identifier category label (e.g. "MRN", "CUSTOM")
    pub category: String,
    pub regex: String,
    #[serde(default = "default_custom_priority")]
    pub priority: i32,
    /// Country codes; omitted means international
    #[serde(default)]
    pub countries: Option<Vec<String>>,
    #[serde(default)]
    pub group: usize,
    #[serde(default)]
    pub description: String,
}

fn default_custom_priority() -> i32 {
    50
}

#[derive(Debug, Deserialize)]
struct CustomPatternFile {
    #[serde(default)]
    patterns: Vec<CustomPatternDefinition>,
}

impl CustomPatternDefinition {
    /// Load definitions from a TOML file with a `[[patterns]]` array
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<Self>> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DeidError::Config(format!(
                "Failed to read pattern file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse definitions from TOML content
    pub fn from_toml(content: &str) -> Result<Vec<Self>> {
        let file: CustomPatternFile = toml::from_str(content)?;
        Ok(file.patterns)
    }

    fn compile(&self) -> Result<DetectionPattern> {
        let category: IdentifierCategory = self.category.parse().map_err(|e| {
            DeidError::Config(format!("Invalid category in pattern '{}': {e}", self.name))
        })?;

        let countries = match &self.countries {
            None => CountrySelection::All,
            Some(list) if list.iter().any(|c| c.eq_ignore_ascii_case("all")) => {
                CountrySelection::All
            }
            Some(list) => CountrySelection::only(
                list.iter()
                    .map(|c| c.parse::<CountryCode>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| {
                        DeidError::Config(format!("Invalid country in pattern '{}': {e}", self.name))
                    })?,
            ),
        };

        let matcher = Matcher::compile(&self.regex).map_err(|e| {
            DeidError::Config(format!("Invalid regex in pattern '{}': {e}", self.name))
        })?;

        let group_count = match &matcher {
            Matcher::Standard(re) => re.captures_len(),
            Matcher::Backtracking(re) => re.captures_len(),
        };
        if self.group >= group_count {
            return Err(DeidError::Config(format!(
                "Pattern '{}' selects group {} but has only {} groups",
                self.name,
                self.group,
                group_count - 1
            )));
        }

        Ok(DetectionPattern {
            name: self.name.clone(),
            category,
            matcher,
            priority: self.priority,
            countries,
            group: self.group,
            description: self.description.clone(),
        })
    }
}

/// Immutable pattern library
#[derive(Debug)]
pub struct PatternLibrary {
    patterns: Vec<DetectionPattern>,
}

impl PatternLibrary {
    /// Compile the built-in table
    pub fn builtin() -> Result<Self> {
        Self::with_custom(&[])
    }

    /// Compile the built-in table followed by custom definitions
    ///
    /// Custom patterns are registered after the built-ins, so they lose ties
    /// at equal priority.
    pub fn with_custom(custom: &[CustomPatternDefinition]) -> Result<Self> {
        let mut patterns = BUILTIN_PATTERNS
            .iter()
            .map(DetectionPattern::from_spec)
            .collect::<Result<Vec<_>>>()?;

        for def in custom {
            if patterns.iter().any(|p| p.name == def.name) {
                return Err(DeidError::Config(format!(
                    "Duplicate pattern name '{}'",
                    def.name
                )));
            }
            patterns.push(def.compile()?);
        }

        tracing::debug!(
            total = patterns.len(),
            custom = custom.len(),
            "Pattern library compiled"
        );

        Ok(Self { patterns })
    }

    /// Every registered pattern, in registration order
    pub fn all_patterns(&self) -> &[DetectionPattern] {
        &self.patterns
    }

    /// Patterns active for `countries`
    ///
    /// Base patterns plus each selected country's patterns, ordered by
    /// descending priority and then registration order.
    pub fn patterns_for(&self, countries: &CountrySelection) -> Vec<&DetectionPattern> {
        let mut active: Vec<&DetectionPattern> = self
            .patterns
            .iter()
            .filter(|p| p.applies_to(countries))
            .collect();
        // sort_by is stable, so equal priorities keep registration order
        active.sort_by(|a, b| b.priority.cmp(&a.priority));
        active
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
