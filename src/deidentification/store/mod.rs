//! Encrypted mapping store
//!
//! Durable bidirectional index between `(category, original value)` and
//! pseudonym. Entries are keyed by a SHA-256 of the category and value; the
//! original itself only ever exists inside the encrypted payload.
//!
//! Saves are atomic (temp file in the same directory, then rename), so a crash
//! never leaves a partially written or unencrypted store behind.

pub mod cipher;
pub mod key;

pub use cipher::StoreFormat;
pub use key::{
    EnvKeyProvider, FileKeyProvider, KeyProvider, MappingKey, StaticKeyProvider, DEFAULT_KEY_ENV,
};

use crate::deidentification::models::IdentifierCategory;
use crate::domain::StoreError;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PAYLOAD_VERSION: u32 = 2;
const SALT_LEN: usize = 32;
const MAX_COLLISION_ATTEMPTS: u32 = 64;

/// How the store is protected at rest
#[derive(Clone)]
pub enum EncryptionMode {
    /// AES-256-GCM with a key from the provider
    Enabled(Arc<dyn KeyProvider>),
    /// Plaintext store; only constructed by the CLI's `--no-encryption`
    /// flag or by tests
    DisabledForTesting,
}

impl EncryptionMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    fn key(&self) -> Result<Option<MappingKey>, StoreError> {
        match self {
            Self::Enabled(provider) => provider.load_key().map(Some),
            Self::DisabledForTesting => Ok(None),
        }
    }
}

impl fmt::Debug for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled(provider) => write!(f, "Enabled({})", provider.describe()),
            Self::DisabledForTesting => write!(f, "DisabledForTesting"),
        }
    }
}

/// One mapping
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub category: IdentifierCategory,
    pub pseudonym: String,
    pub created_at: DateTime<Utc>,
    original: String,
}

impl MappingEntry {
    /// Original value; only for authorised reverse lookup
    pub fn original(&self) -> &str {
        &self.original
    }
}

impl fmt::Debug for MappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingEntry")
            .field("category", &self.category)
            .field("pseudonym", &self.pseudonym)
            .field("created_at", &self.created_at)
            .field("original", &"[REDACTED]")
            .finish()
    }
}

/// Run-spanning values persisted next to the entries
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Base64 pseudonym salt
    #[serde(default)]
    salt: Option<String>,
    /// Date shift offset drawn by the first run
    #[serde(default)]
    pub date_shift_offset_days: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for StoreMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreMetadata")
            .field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
            .field("date_shift_offset_days", &self.date_shift_offset_days.map(|_| "[REDACTED]"))
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct StorePayload {
    format_version: u32,
    metadata: StoreMetadata,
    entries: BTreeMap<String, MappingEntry>,
}

/// In-memory view of a mapping store file
pub struct MappingStore {
    entries: HashMap<String, MappingEntry>,
    /// pseudonym -> entry key
    reverse: HashMap<String, String>,
    metadata: StoreMetadata,
    created_this_run: usize,
    loaded_format: Option<StoreFormat>,
    dirty: bool,
}

impl MappingStore {
    /// Empty store with no backing file
    pub fn in_memory() -> Self {
        Self {
            entries: HashMap::new(),
            reverse: HashMap::new(),
            metadata: StoreMetadata {
                created_at: Some(Utc::now()),
                ..Default::default()
            },
            created_this_run: 0,
            loaded_format: None,
            dirty: false,
        }
    }

    /// Load the store at `path`, or start an empty one if it does not exist
    pub fn load(path: &Path, mode: &EncryptionMode) -> Result<Self, StoreError> {
        let key = mode.key()?;
        Self::load_with_key(path, key.as_ref())
    }

    fn load_with_key(path: &Path, key: Option<&MappingKey>) -> Result<Self, StoreError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No mapping store found, starting a new one");
            return Ok(Self::in_memory());
        }

        let data = std::fs::read(path).map_err(|e| {
            StoreError::Io(format!("Failed to read mapping store {}: {e}", path.display()))
        })?;
        let format = cipher::detect_format(&data)?;

        let mut store = match (format, key) {
            (StoreFormat::EncryptedV2, Some(key)) => {
                let plaintext = zeroize::Zeroizing::new(cipher::open(key, &data)?);
                Self::from_payload(&plaintext)?
            }
            (StoreFormat::LegacyV1, Some(key)) => {
                let plaintext = zeroize::Zeroizing::new(cipher::open_legacy(key, &data)?);
                let store = Self::from_legacy_payload(&plaintext)?;
                tracing::warn!(
                    path = %path.display(),
                    entries = store.len(),
                    "Loaded legacy mapping store; it will be upgraded on the next save"
                );
                store
            }
            (StoreFormat::Plaintext, Some(_)) => {
                tracing::warn!(
                    path = %path.display(),
                    "Mapping store is unencrypted; it will be encrypted on the next save"
                );
                let mut store = Self::from_payload(cipher::unwrap_plaintext(&data))?;
                store.dirty = true;
                store
            }
            (StoreFormat::Plaintext, None) => Self::from_payload(cipher::unwrap_plaintext(&data))?,
            (StoreFormat::EncryptedV2 | StoreFormat::LegacyV1, None) => {
                return Err(StoreError::EncryptionRequired(format!(
                    "{} is encrypted and cannot be opened with encryption disabled",
                    path.display()
                )));
            }
        };
        store.loaded_format = Some(format);

        tracing::info!(
            path = %path.display(),
            entries = store.len(),
            format = ?format,
            "Mapping store loaded"
        );
        Ok(store)
    }

    fn from_payload(bytes: &[u8]) -> Result<Self, StoreError> {
        let payload: StorePayload = serde_json::from_slice(bytes).map_err(|e| {
            StoreError::Corrupt(format!(
                "payload is not a valid store ({:?} at line {})",
                e.classify(),
                e.line()
            ))
        })?;

        let mut store = Self::in_memory();
        store.metadata = payload.metadata;
        for (key, entry) in payload.entries {
            store.reverse.insert(entry.pseudonym.clone(), key.clone());
            store.entries.insert(key, entry);
        }
        Ok(store)
    }

    /// v1 payload: flat `"CATEGORY:value" -> pseudonym` map
    fn from_legacy_payload(bytes: &[u8]) -> Result<Self, StoreError> {
        let legacy: HashMap<String, String> = serde_json::from_slice(bytes)
            .map_err(|_| StoreError::Corrupt("legacy payload is not a mapping table".to_string()))?;

        let mut store = Self::in_memory();
        let now = Utc::now();
        for (compound, pseudonym) in legacy {
            let (code, value) = compound
                .split_once(':')
                .ok_or_else(|| StoreError::Corrupt("legacy entry without category".to_string()))?;
            let category: IdentifierCategory = code
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("legacy entry with unknown category {code}")))?;
            store.insert(category, value, pseudonym, now);
        }
        store.dirty = true;
        Ok(store)
    }

    /// Encrypt (or, in testing mode, wrap) and atomically write the store
    pub fn save(&mut self, path: &Path, mode: &EncryptionMode) -> Result<(), StoreError> {
        let key = mode.key()?;
        if key.is_none() && path.exists() {
            let existing = std::fs::read(path).map_err(|e| {
                StoreError::Io(format!("Failed to read mapping store {}: {e}", path.display()))
            })?;
            if cipher::detect_format(&existing)? != StoreFormat::Plaintext {
                return Err(StoreError::EncryptionRequired(format!(
                    "refusing to replace encrypted store {} with plaintext",
                    path.display()
                )));
            }
        }
        self.save_with_key(path, key.as_ref())
    }

    fn save_with_key(&mut self, path: &Path, key: Option<&MappingKey>) -> Result<(), StoreError> {
        self.metadata.updated_at = Some(Utc::now());
        let payload = StorePayload {
            format_version: PAYLOAD_VERSION,
            metadata: self.metadata.clone(),
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let json = zeroize::Zeroizing::new(
            serde_json::to_vec(&payload)
                .map_err(|e| StoreError::Encryption(format!("failed to serialize store: {e}")))?,
        );

        let bytes = match key {
            Some(key) => cipher::seal(key, &json)?,
            None => cipher::wrap_plaintext(&json),
        };
        write_atomic(path, &bytes)?;

        self.dirty = false;
        self.loaded_format = Some(if key.is_some() {
            StoreFormat::EncryptedV2
        } else {
            StoreFormat::Plaintext
        });
        tracing::debug!(
            path = %path.display(),
            entries = self.len(),
            encrypted = key.is_some(),
            "Mapping store saved"
        );
        Ok(())
    }

    /// Re-encrypt the store at `path` from `old` to `new`, returning the entry count
    pub fn rekey(path: &Path, old: &MappingKey, new: &MappingKey) -> Result<usize, StoreError> {
        let mut store = Self::load_with_key(path, Some(old))?;
        store.save_with_key(path, Some(new))?;
        Ok(store.len())
    }

    /// Pseudonym for `(category, value)`, minting one with `generate` if absent
    ///
    /// `generate(attempt)` is called with increasing attempt numbers until it
    /// returns a pseudonym not already used by a different original.
    pub fn get_or_create<F>(
        &mut self,
        category: IdentifierCategory,
        value: &str,
        generate: F,
    ) -> Result<String, StoreError>
    where
        F: Fn(u32) -> String,
    {
        let key = entry_key(category, value);
        if let Some(entry) = self.entries.get(&key) {
            return Ok(entry.pseudonym.clone());
        }

        for attempt in 0..MAX_COLLISION_ATTEMPTS {
            let candidate = generate(attempt);
            if self.reverse.contains_key(&candidate) {
                tracing::debug!(category = %category, attempt, "Pseudonym collision, retrying");
                continue;
            }
            self.insert(category, value, candidate.clone(), Utc::now());
            self.created_this_run += 1;
            self.dirty = true;
            return Ok(candidate);
        }

        Err(StoreError::Corrupt(format!(
            "no free pseudonym for {category} after {MAX_COLLISION_ATTEMPTS} attempts"
        )))
    }

    fn insert(
        &mut self,
        category: IdentifierCategory,
        value: &str,
        pseudonym: String,
        created_at: DateTime<Utc>,
    ) {
        let key = entry_key(category, value);
        self.reverse.insert(pseudonym.clone(), key.clone());
        self.entries.insert(
            key,
            MappingEntry {
                category,
                pseudonym,
                created_at,
                original: value.to_string(),
            },
        );
    }

    /// Existing pseudonym, without creating one
    pub fn lookup(&self, category: IdentifierCategory, value: &str) -> Option<&str> {
        self.entries
            .get(&entry_key(category, value))
            .map(|e| e.pseudonym.as_str())
    }

    /// Authorised reverse path: pseudonym to `(category, original)`
    pub fn reverse_lookup(&self, pseudonym: &str) -> Option<(IdentifierCategory, &str)> {
        self.reverse
            .get(pseudonym)
            .and_then(|key| self.entries.get(key))
            .map(|e| (e.category, e.original.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries minted since this store was loaded
    pub fn created_this_run(&self) -> usize {
        self.created_this_run
    }

    /// Whether there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Format the store was loaded from (or last saved as)
    pub fn loaded_format(&self) -> Option<StoreFormat> {
        self.loaded_format
    }

    /// Persisted pseudonym salt, minted on first use
    pub fn ensure_salt(&mut self) -> Result<Vec<u8>, StoreError> {
        if let Some(encoded) = &self.metadata.salt {
            return STANDARD
                .decode(encoded)
                .map_err(|_| StoreError::Corrupt("stored salt is not base64".to_string()));
        }
        let mut salt = vec![0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        self.metadata.salt = Some(STANDARD.encode(&salt));
        self.dirty = true;
        Ok(salt)
    }

    pub fn date_shift_offset(&self) -> Option<i64> {
        self.metadata.date_shift_offset_days
    }

    pub fn set_date_shift_offset(&mut self, days: i64) {
        self.metadata.date_shift_offset_days = Some(days);
        self.dirty = true;
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }
}

impl fmt::Debug for MappingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingStore")
            .field("entries", &self.entries.len())
            .field("created_this_run", &self.created_this_run)
            .field("loaded_format", &self.loaded_format)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Store key for `(category, value)`
fn entry_key(category: IdentifierCategory, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.code().as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Write `bytes` to `path` through a temp file in the same directory
///
/// The temp file is created owner-only, so the persisted file is too.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |e: std::io::Error| StoreError::Io(format!("Failed to write {}: {e}", path.display()));
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn enabled(key: MappingKey) -> EncryptionMode {
        EncryptionMode::Enabled(Arc::new(StaticKeyProvider::new(key)))
    }

    fn fixed(name: &'static str) -> impl Fn(u32) -> String {
        move |attempt| format!("[MRN-{name}{attempt}]")
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let mut store = MappingStore::in_memory();
        let a = store
            .get_or_create(IdentifierCategory::Mrn, "123456", fixed("A"))
            .unwrap();
        let b = store
            .get_or_create(IdentifierCategory::Mrn, "123456", fixed("B"))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.created_this_run(), 1);
    }

    #[test]
    fn test_collision_retries() {
        let mut store = MappingStore::in_memory();
        let first = store
            .get_or_create(IdentifierCategory::Mrn, "1", fixed("X"))
            .unwrap();
        let second = store
            .get_or_create(IdentifierCategory::Mrn, "2", fixed("X"))
            .unwrap();
        assert_eq!(first, "[MRN-X0]");
        assert_eq!(second, "[MRN-X1]");
    }

    #[test]
    fn test_category_is_part_of_key() {
        let mut store = MappingStore::in_memory();
        store
            .get_or_create(IdentifierCategory::Mrn, "42", fixed("M"))
            .unwrap();
        assert!(store.lookup(IdentifierCategory::Phone, "42").is_none());
    }

    #[test]
    fn test_reverse_lookup() {
        let mut store = MappingStore::in_memory();
        let p = store
            .get_or_create(IdentifierCategory::Mrn, "123456", fixed("R"))
            .unwrap();
        assert_eq!(
            store.reverse_lookup(&p),
            Some((IdentifierCategory::Mrn, "123456"))
        );
    }

    #[test]
    fn test_save_load_encrypted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.enc");
        let key = MappingKey::generate();

        let mut store = MappingStore::in_memory();
        store
            .get_or_create(IdentifierCategory::Mrn, "123456", fixed("E"))
            .unwrap();
        let salt = store.ensure_salt().unwrap();
        store.set_date_shift_offset(-17);
        store.save(&path, &enabled(key.clone())).unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("123456"));

        let mut loaded = MappingStore::load(&path, &enabled(key)).unwrap();
        assert_eq!(loaded.lookup(IdentifierCategory::Mrn, "123456"), Some("[MRN-E0]"));
        assert_eq!(loaded.ensure_salt().unwrap(), salt);
        assert_eq!(loaded.date_shift_offset(), Some(-17));
        assert_eq!(loaded.created_this_run(), 0);
        assert_eq!(loaded.loaded_format(), Some(StoreFormat::EncryptedV2));
    }

    #[test]
    fn test_disabled_mode_refuses_encrypted_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.enc");
        let mut store = MappingStore::in_memory();
        store.save(&path, &enabled(MappingKey::generate())).unwrap();

        assert!(matches!(
            MappingStore::load(&path, &EncryptionMode::DisabledForTesting),
            Err(StoreError::EncryptionRequired(_))
        ));
        assert!(matches!(
            store.save(&path, &EncryptionMode::DisabledForTesting),
            Err(StoreError::EncryptionRequired(_))
        ));
    }

    #[test]
    fn test_plaintext_upgraded_when_encryption_enabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.enc");
        let mut store = MappingStore::in_memory();
        store
            .get_or_create(IdentifierCategory::Email, "a@b.org", fixed("P"))
            .unwrap();
        store.save(&path, &EncryptionMode::DisabledForTesting).unwrap();

        let key = MappingKey::generate();
        let mut loaded = MappingStore::load(&path, &enabled(key.clone())).unwrap();
        assert!(loaded.is_dirty());
        loaded.save(&path, &enabled(key)).unwrap();
        assert_eq!(
            cipher::detect_format(&std::fs::read(&path).unwrap()).unwrap(),
            StoreFormat::EncryptedV2
        );
    }

    #[test]
    fn test_legacy_store_upgrade() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.enc");
        let key = MappingKey::generate();
        let legacy = cipher::seal_legacy(&key, br#"{"MRN:123456":"[MRN-LEGACYTOKN]"}"#);
        std::fs::write(&path, legacy).unwrap();

        let mut store = MappingStore::load(&path, &enabled(key.clone())).unwrap();
        assert_eq!(store.loaded_format(), Some(StoreFormat::LegacyV1));
        assert_eq!(
            store.lookup(IdentifierCategory::Mrn, "123456"),
            Some("[MRN-LEGACYTOKN]")
        );
        store.save(&path, &enabled(key.clone())).unwrap();

        let reloaded = MappingStore::load(&path, &enabled(key)).unwrap();
        assert_eq!(reloaded.loaded_format(), Some(StoreFormat::EncryptedV2));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_rekey() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mappings.enc");
        let old = MappingKey::generate();
        let new = MappingKey::generate();
        let mut store = MappingStore::in_memory();
        store
            .get_or_create(IdentifierCategory::Mrn, "1", fixed("K"))
            .unwrap();
        store.save(&path, &enabled(old.clone())).unwrap();

        assert_eq!(MappingStore::rekey(&path, &old, &new).unwrap(), 1);
        assert!(matches!(
            MappingStore::load(&path, &enabled(old)),
            Err(StoreError::Decryption(_))
        ));
        assert_eq!(MappingStore::load(&path, &enabled(new)).unwrap().len(), 1);
    }

    #[test]
    fn test_debug_hides_originals() {
        let mut store = MappingStore::in_memory();
        store
            .get_or_create(IdentifierCategory::Mrn, "123456", fixed("D"))
            .unwrap();
        let entry = store.entries.values().next().unwrap();
        assert!(!format!("{entry:?}").contains("123456"));
    }
}
