//! Mapping store keys and key providers
//!
//! Key provisioning is explicit: the store never mints a key on its own. A
//! [`KeyProvider`] loads, generates or rotates the 256-bit key, and
//! `veil keygen` is the only place a new key file is created.

use crate::config::{secret_string, SecretString};
use crate::domain::StoreError;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use secrecy::ExposeSecret;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Default environment variable for [`EnvKeyProvider`]
pub const DEFAULT_KEY_ENV: &str = "VEIL_MAPPING_KEY";

/// A 256-bit mapping store key, zeroed on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MappingKey([u8; KEY_LEN]);

impl MappingKey {
    /// Random key from the OS-seeded CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            StoreError::KeyProvider(format!(
                "Expected a {KEY_LEN}-byte key, got {} bytes",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Decode a base64 key
    pub fn from_base64(encoded: &SecretString) -> Result<Self, StoreError> {
        let mut decoded = STANDARD
            .decode(encoded.expose_secret().as_ref().trim())
            .map_err(|e| StoreError::KeyProvider(format!("Key is not valid base64: {e}")))?;
        let key = Self::from_bytes(&decoded);
        decoded.zeroize();
        key
    }

    /// Encode as base64 for a key file
    pub fn to_base64(&self) -> SecretString {
        secret_string(STANDARD.encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MappingKey([REDACTED])")
    }
}

/// Source of the mapping store key
pub trait KeyProvider: Send + Sync + fmt::Debug {
    /// Load the current key
    fn load_key(&self) -> Result<MappingKey, StoreError>;

    /// Create and persist a new key; refuses to replace an existing one
    fn generate_key(&self) -> Result<MappingKey, StoreError>;

    /// Replace the current key with a new one, keeping the previous key
    /// recoverable, and return the new key
    fn rotate_key(&self) -> Result<MappingKey, StoreError>;

    /// Where the key comes from, for logs (never the key itself)
    fn describe(&self) -> String;
}

/// In-memory key, for tests and embedding
pub struct StaticKeyProvider {
    current: Mutex<Option<MappingKey>>,
    previous: Mutex<Option<MappingKey>>,
}

impl StaticKeyProvider {
    pub fn new(key: MappingKey) -> Self {
        Self {
            current: Mutex::new(Some(key)),
            previous: Mutex::new(None),
        }
    }

    /// Provider with no key yet; `generate_key` fills it
    pub fn empty() -> Self {
        Self {
            current: Mutex::new(None),
            previous: Mutex::new(None),
        }
    }

    /// Key that was current before the last rotation
    pub fn previous_key(&self) -> Option<MappingKey> {
        self.previous.lock().ok().and_then(|p| p.clone())
    }

    fn lock_error() -> StoreError {
        StoreError::KeyProvider("key provider lock poisoned".to_string())
    }
}

impl KeyProvider for StaticKeyProvider {
    fn load_key(&self) -> Result<MappingKey, StoreError> {
        self.current
            .lock()
            .map_err(|_| Self::lock_error())?
            .clone()
            .ok_or_else(|| StoreError::KeyProvider("no key has been generated".to_string()))
    }

    fn generate_key(&self) -> Result<MappingKey, StoreError> {
        let mut current = self.current.lock().map_err(|_| Self::lock_error())?;
        if current.is_some() {
            return Err(StoreError::KeyProvider(
                "a key already exists; rotate it instead".to_string(),
            ));
        }
        let key = MappingKey::generate();
        *current = Some(key.clone());
        Ok(key)
    }

    fn rotate_key(&self) -> Result<MappingKey, StoreError> {
        let mut current = self.current.lock().map_err(|_| Self::lock_error())?;
        let key = MappingKey::generate();
        let old = current.replace(key.clone());
        *self.previous.lock().map_err(|_| Self::lock_error())? = old;
        Ok(key)
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

impl fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyProvider")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Base64 key stored in a file
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the key retained by the last rotation
    pub fn previous_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".prev");
        PathBuf::from(name)
    }

    fn read(path: &Path) -> Result<MappingKey, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::KeyProvider(format!("Failed to read key file {}: {e}", path.display()))
        })?;
        MappingKey::from_base64(&secret_string(content))
    }

    fn write(path: &Path, key: &MappingKey) -> Result<(), StoreError> {
        let mut content = key.to_base64().expose_secret().as_ref().to_string();
        content.push('\n');
        let result = super::write_atomic(path, content.as_bytes());
        content.zeroize();
        result
    }
}

impl KeyProvider for FileKeyProvider {
    fn load_key(&self) -> Result<MappingKey, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::KeyProvider(format!(
                "Key file {} does not exist; create one with `veil keygen`",
                self.path.display()
            )));
        }
        Self::read(&self.path)
    }

    fn generate_key(&self) -> Result<MappingKey, StoreError> {
        if self.path.exists() {
            return Err(StoreError::KeyProvider(format!(
                "Key file {} already exists; refusing to overwrite",
                self.path.display()
            )));
        }
        let key = MappingKey::generate();
        Self::write(&self.path, &key)?;
        Ok(key)
    }

    fn rotate_key(&self) -> Result<MappingKey, StoreError> {
        let old = self.load_key()?;
        Self::write(&self.previous_path(), &old)?;
        let key = MappingKey::generate();
        Self::write(&self.path, &key)?;
        Ok(key)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Base64 key read from an environment variable (read-only)
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_ENV)
    }
}

impl KeyProvider for EnvKeyProvider {
    fn load_key(&self) -> Result<MappingKey, StoreError> {
        let value = std::env::var(&self.var).map_err(|_| {
            StoreError::KeyProvider(format!("Environment variable {} is not set", self.var))
        })?;
        MappingKey::from_base64(&secret_string(value))
    }

    fn generate_key(&self) -> Result<MappingKey, StoreError> {
        Err(StoreError::KeyProvider(format!(
            "Keys from {} are read-only; generate a key file instead",
            self.var
        )))
    }

    fn rotate_key(&self) -> Result<MappingKey, StoreError> {
        self.generate_key()
    }

    fn describe(&self) -> String {
        format!("env:{}", self.var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_base64_round_trip() {
        let key = MappingKey::generate();
        let decoded = MappingKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), decoded.as_bytes());
    }

    #[test]
    fn test_key_wrong_length() {
        assert!(matches!(
            MappingKey::from_bytes(&[0u8; 16]),
            Err(StoreError::KeyProvider(_))
        ));
    }

    #[test]
    fn test_key_debug_redacted() {
        let key = MappingKey::from_bytes(&[7u8; KEY_LEN]).unwrap();
        assert_eq!(format!("{key:?}"), "MappingKey([REDACTED])");
    }

    #[test]
    fn test_file_provider_generate_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let provider = FileKeyProvider::new(dir.path().join("keys/mapping.key"));
        let key = provider.generate_key().unwrap();
        assert_eq!(provider.load_key().unwrap().as_bytes(), key.as_bytes());
        assert!(provider.generate_key().is_err());
    }

    #[test]
    fn test_file_provider_missing_key() {
        let dir = TempDir::new().unwrap();
        let provider = FileKeyProvider::new(dir.path().join("absent.key"));
        assert!(matches!(provider.load_key(), Err(StoreError::KeyProvider(_))));
    }

    #[test]
    fn test_file_provider_rotate_keeps_previous() {
        let dir = TempDir::new().unwrap();
        let provider = FileKeyProvider::new(dir.path().join("mapping.key"));
        let old = provider.generate_key().unwrap();
        let new = provider.rotate_key().unwrap();

        assert_ne!(old.as_bytes(), new.as_bytes());
        assert_eq!(provider.load_key().unwrap().as_bytes(), new.as_bytes());
        let prev = FileKeyProvider::read(&provider.previous_path()).unwrap();
        assert_eq!(prev.as_bytes(), old.as_bytes());
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticKeyProvider::empty();
        assert!(provider.load_key().is_err());
        let key = provider.generate_key().unwrap();
        assert!(provider.generate_key().is_err());
        let rotated = provider.rotate_key().unwrap();
        assert_eq!(provider.previous_key().unwrap().as_bytes(), key.as_bytes());
        assert_eq!(provider.load_key().unwrap().as_bytes(), rotated.as_bytes());
    }

    #[test]
    fn test_env_provider_is_read_only() {
        let provider = EnvKeyProvider::new("VEIL_TEST_KEY_NEVER_SET");
        assert!(provider.load_key().is_err());
        assert!(provider.generate_key().is_err());
        assert_eq!(provider.describe(), "env:VEIL_TEST_KEY_NEVER_SET");
    }
}
