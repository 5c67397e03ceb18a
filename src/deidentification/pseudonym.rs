//! Deterministic pseudonym generation
//!
//! A pseudonym is a category template (`"[PATIENT-{token}]"`) filled with a
//! 10-letter token derived from a salted SHA-256 of the original value. Tokens
//! use upper-case letters only (no `I`/`O`), so a pseudonym never looks like a
//! numeric identifier to the detector.
//!
//! Consistency comes from the mapping store: [`PseudonymGenerator::resolve`]
//! checks the in-run cache, then the store, and only then mints a new token.

use crate::deidentification::models::IdentifierCategory;
use crate::deidentification::store::MappingStore;
use crate::domain::{DeidError, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, RwLock};
use zeroize::Zeroizing;

/// Number of letters in a pseudonym token
pub const TOKEN_LEN: usize = 10;

const TOKEN_ALPHABET: &[u8; 24] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const TOKEN_PLACEHOLDER: &str = "{token}";

/// A parsed template: literal text around the token
#[derive(Debug, Clone, PartialEq, Eq)]
struct Template {
    prefix: String,
    suffix: String,
}

impl Template {
    fn parse(category: IdentifierCategory, raw: &str) -> Result<Self> {
        if raw.matches(TOKEN_PLACEHOLDER).count() != 1 {
            return Err(DeidError::Config(format!(
                "Template for {category} must contain exactly one {TOKEN_PLACEHOLDER} placeholder"
            )));
        }
        let (prefix, suffix) = raw.split_once(TOKEN_PLACEHOLDER).unwrap_or((raw, ""));
        if prefix.contains(['{', '}']) || suffix.contains(['{', '}']) {
            return Err(DeidError::Config(format!(
                "Template for {category} contains an unknown placeholder"
            )));
        }
        if prefix.is_empty() && suffix.is_empty() {
            return Err(DeidError::Config(format!(
                "Template for {category} needs literal text around {TOKEN_PLACEHOLDER}"
            )));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    fn render(&self, token: &str) -> String {
        format!("{}{}{}", self.prefix, token, self.suffix)
    }
}

/// Per-category templates, defaults merged with overrides
#[derive(Debug, Clone)]
pub struct PseudonymTemplates {
    templates: HashMap<IdentifierCategory, Template>,
}

impl PseudonymTemplates {
    /// Build templates from defaults plus overrides keyed by category name
    ///
    /// Fails with a configuration error for unknown category names and
    /// malformed templates.
    pub fn new<'a, I>(overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut templates = Self::default().templates;
        for (name, raw) in overrides {
            let category: IdentifierCategory = name.parse().map_err(|e| {
                DeidError::Config(format!("Template references an unknown category: {e}"))
            })?;
            templates.insert(category, Template::parse(category, raw)?);
        }
        Ok(Self { templates })
    }

    fn get(&self, category: IdentifierCategory) -> &Template {
        // `default` inserts every category
        &self.templates[&category]
    }

    /// Regex matching any pseudonym these templates can produce
    pub fn shape_regex(&self) -> Result<Regex> {
        let alternatives: BTreeSet<String> = self
            .templates
            .values()
            .map(|t| {
                format!(
                    "{}[{}]{{{}}}{}",
                    regex::escape(&t.prefix),
                    std::str::from_utf8(TOKEN_ALPHABET).unwrap_or("A-Z"),
                    TOKEN_LEN,
                    regex::escape(&t.suffix)
                )
            })
            .collect();
        let pattern = alternatives.into_iter().collect::<Vec<_>>().join("|");
        Regex::new(&pattern)
            .map_err(|e| DeidError::Config(format!("Failed to build pseudonym matcher: {e}")))
    }
}

impl Default for PseudonymTemplates {
    fn default() -> Self {
        let templates = IdentifierCategory::ALL
            .iter()
            .map(|category| {
                let (prefix, suffix) = category
                    .default_template()
                    .split_once(TOKEN_PLACEHOLDER)
                    .unwrap_or((category.default_template(), ""));
                let template = Template {
                    prefix: prefix.to_string(),
                    suffix: suffix.to_string(),
                };
                (*category, template)
            })
            .collect();
        Self { templates }
    }
}

/// Salted, template-driven pseudonym generator with an in-run cache
pub struct PseudonymGenerator {
    templates: PseudonymTemplates,
    salt: Zeroizing<Vec<u8>>,
    cache: RwLock<HashMap<(IdentifierCategory, String), String>>,
}

impl PseudonymGenerator {
    pub fn new(templates: PseudonymTemplates, salt: Vec<u8>) -> Self {
        Self {
            templates,
            salt: Zeroizing::new(salt),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn templates(&self) -> &PseudonymTemplates {
        &self.templates
    }

    /// Pure pseudonym for `value` with no store involvement
    pub fn generate(&self, category: IdentifierCategory, value: &str) -> String {
        self.candidate(category, value, 0)
    }

    /// The `attempt`-th candidate pseudonym; attempts past zero resolve collisions
    pub fn candidate(&self, category: IdentifierCategory, value: &str, attempt: u32) -> String {
        self.templates
            .get(category)
            .render(&self.token(category, value, attempt))
    }

    fn token(&self, category: IdentifierCategory, value: &str, attempt: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_slice());
        hasher.update(category.code().as_bytes());
        hasher.update([0x1f]);
        hasher.update(value.as_bytes());
        hasher.update(attempt.to_be_bytes());
        let digest = hasher.finalize();

        digest
            .iter()
            .take(TOKEN_LEN)
            .map(|b| TOKEN_ALPHABET[(*b as usize) % TOKEN_ALPHABET.len()] as char)
            .collect()
    }

    /// Consistent pseudonym for `value`: cache, then store, then mint
    pub fn resolve(
        &self,
        category: IdentifierCategory,
        value: &str,
        store: &Mutex<MappingStore>,
    ) -> Result<String> {
        let key = (category, value.to_string());
        if let Ok(cache) = self.cache.read() {
            if let Some(pseudonym) = cache.get(&key) {
                return Ok(pseudonym.clone());
            }
        }

        let pseudonym = {
            let mut store = store
                .lock()
                .map_err(|_| DeidError::Aborted("mapping store lock poisoned".to_string()))?;
            store.get_or_create(category, value, |attempt| {
                self.candidate(category, value, attempt)
            })?
        };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, pseudonym.clone());
        }
        Ok(pseudonym)
    }

    /// Number of cached (category, value) pairs
    pub fn cached(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for PseudonymGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PseudonymGenerator")
            .field("templates", &self.templates.templates.len())
            .field("salt", &"[REDACTED]")
            .field("cached", &self.cached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn generator() -> PseudonymGenerator {
        PseudonymGenerator::new(PseudonymTemplates::default(), b"test-salt".to_vec())
    }

    #[test]
    fn test_generate_is_deterministic() {
        let g = generator();
        assert_eq!(
            g.generate(IdentifierCategory::Mrn, "123456"),
            g.generate(IdentifierCategory::Mrn, "123456")
        );
    }

    #[test]
    fn test_generate_format() {
        let g = generator();
        let p = g.generate(IdentifierCategory::FullName, "John Doe");
        assert!(p.starts_with("[PATIENT-"));
        assert!(p.ends_with(']'));
        let token = &p["[PATIENT-".len()..p.len() - 1];
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_uppercase() && c != 'I' && c != 'O'));
    }

    #[test]
    fn test_distinct_values_distinct_pseudonyms() {
        let g = generator();
        assert_ne!(
            g.generate(IdentifierCategory::Mrn, "123456"),
            g.generate(IdentifierCategory::Mrn, "123457")
        );
    }

    #[test]
    fn test_salt_changes_tokens() {
        let a = generator();
        let b = PseudonymGenerator::new(PseudonymTemplates::default(), b"other".to_vec());
        assert_ne!(
            a.generate(IdentifierCategory::Email, "a@b.org"),
            b.generate(IdentifierCategory::Email, "a@b.org")
        );
    }

    #[test]
    fn test_attempts_give_new_candidates() {
        let g = generator();
        assert_ne!(
            g.candidate(IdentifierCategory::Mrn, "1", 0),
            g.candidate(IdentifierCategory::Mrn, "1", 1)
        );
    }

    #[test]
    fn test_template_override() {
        let mut overrides = BTreeMap::new();
        overrides.insert("mrn".to_string(), "<record:{token}>".to_string());
        let templates = PseudonymTemplates::new(&overrides).unwrap();
        let g = PseudonymGenerator::new(templates, vec![1, 2, 3]);
        let p = g.generate(IdentifierCategory::Mrn, "42");
        assert!(p.starts_with("<record:") && p.ends_with('>'));
    }

    #[test]
    fn test_malformed_templates_rejected() {
        for bad in ["[MRN]", "[{token}-{token}]", "[{id}-{token}]", "{token}"] {
            let mut overrides = BTreeMap::new();
            overrides.insert("MRN".to_string(), bad.to_string());
            assert!(
                matches!(PseudonymTemplates::new(&overrides), Err(DeidError::Config(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert("SHOE_SIZE".to_string(), "[S-{token}]".to_string());
        assert!(PseudonymTemplates::new(&overrides).is_err());
    }

    #[test]
    fn test_shape_regex_matches_generated() {
        let g = generator();
        let shape = g.templates().shape_regex().unwrap();
        for category in IdentifierCategory::ALL {
            let p = g.generate(category, "value");
            assert!(shape.is_match(&p), "{p}");
        }
        assert!(!shape.is_match("[MRN-123456]"));
    }

    #[test]
    fn test_resolve_uses_store_and_cache() {
        let store = Mutex::new(MappingStore::in_memory());
        let g = generator();
        let first = g.resolve(IdentifierCategory::Mrn, "123456", &store).unwrap();
        let second = g.resolve(IdentifierCategory::Mrn, "123456", &store).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.lock().unwrap().len(), 1);
        assert_eq!(g.cached(), 1);
    }
}
