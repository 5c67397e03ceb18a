//! Mapping store file formats
//!
//! ```text
//! v2 (current):
//! ┌─────────┬─────────┬───────────┬──────────┬──────────────────────────┐
//! │ VEILMAP │ 0x02    │ key check │ nonce    │ AES-256-GCM ciphertext   │
//! │ 7 bytes │ 1 byte  │ 8 bytes   │ 12 bytes │ payload + 16-byte tag    │
//! └─────────┴─────────┴───────────┴──────────┴──────────────────────────┘
//!   header (28 bytes) is authenticated as associated data
//!
//! v1 (legacy, read-only): JSON {"algorithm","nonce","ciphertext"} in base64,
//!   AES-256-GCM without associated data
//!
//! plaintext (testing only): VEILMAP 'P' followed by the JSON payload
//! ```
//!
//! The key check lets a wrong key be told apart from a tampered file.

use super::key::MappingKey;
use crate::domain::StoreError;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MAGIC: &[u8; 7] = b"VEILMAP";
pub const FORMAT_V2: u8 = 2;
pub const PLAINTEXT_MARKER: u8 = b'P';

const KEY_CHECK_LEN: usize = 8;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = MAGIC.len() + 1 + KEY_CHECK_LEN + NONCE_LEN;

const LEGACY_ALGORITHM: &str = "AES-256-GCM";

/// On-disk format of a store file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    /// Authenticated v2 binary format
    EncryptedV2,
    /// Legacy v1 JSON envelope
    LegacyV1,
    /// Testing-only plaintext
    Plaintext,
}

/// Identify the format of `data` without decrypting it
pub fn detect_format(data: &[u8]) -> Result<StoreFormat, StoreError> {
    if data.len() > MAGIC.len() && data.starts_with(MAGIC) {
        return match data[MAGIC.len()] {
            FORMAT_V2 => Ok(StoreFormat::EncryptedV2),
            PLAINTEXT_MARKER => Ok(StoreFormat::Plaintext),
            other => Err(StoreError::Corrupt(format!(
                "unsupported store format version {other}"
            ))),
        };
    }
    match data.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Ok(StoreFormat::LegacyV1),
        _ => Err(StoreError::Corrupt("unrecognized store file header".to_string())),
    }
}

/// First 8 bytes of SHA-256("veil-key-check" || key)
pub fn key_check(key: &MappingKey) -> [u8; KEY_CHECK_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(b"veil-key-check");
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let mut check = [0u8; KEY_CHECK_LEN];
    check.copy_from_slice(&digest[..KEY_CHECK_LEN]);
    check
}

fn cipher(key: &MappingKey) -> Result<Aes256Gcm, StoreError> {
    Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StoreError::KeyProvider(format!("invalid key: {e}")))
}

/// Encrypt `plaintext` into the v2 format with a fresh random nonce
pub fn seal(key: &MappingKey, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let mut out = Vec::with_capacity(HEADER_LEN + plaintext.len() + TAG_LEN);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_V2);
    out.extend_from_slice(&key_check(key));
    out.extend_from_slice(&nonce_bytes);

    let ciphertext = cipher(key)?
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: &out[..HEADER_LEN],
            },
        )
        .map_err(|_| StoreError::Encryption("AEAD encryption failed".to_string()))?;
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a v2 file
///
/// A key-check mismatch is a [`StoreError::Decryption`]; a failed tag under
/// the right key is [`StoreError::Corrupt`].
pub fn open(key: &MappingKey, data: &[u8]) -> Result<Vec<u8>, StoreError> {
    if data.len() < HEADER_LEN + TAG_LEN {
        return Err(StoreError::Corrupt(format!(
            "store file truncated ({} bytes)",
            data.len()
        )));
    }
    let (header, ciphertext) = data.split_at(HEADER_LEN);
    let check_start = MAGIC.len() + 1;
    let stored_check = &header[check_start..check_start + KEY_CHECK_LEN];
    if stored_check != key_check(key) {
        return Err(StoreError::Decryption(
            "the supplied key does not match this mapping store".to_string(),
        ));
    }

    let nonce = &header[check_start + KEY_CHECK_LEN..];
    cipher(key)?
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map_err(|_| StoreError::Corrupt("authentication tag mismatch".to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct LegacyEnvelope {
    algorithm: String,
    nonce: String,
    ciphertext: String,
}

/// Decrypt a legacy v1 JSON envelope
///
/// v1 has no key check, so any authentication failure is reported as a
/// decryption error.
pub fn open_legacy(key: &MappingKey, data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let envelope: LegacyEnvelope = serde_json::from_slice(data)
        .map_err(|e| StoreError::Corrupt(format!("legacy envelope unreadable at line {}", e.line())))?;
    if envelope.algorithm != LEGACY_ALGORITHM {
        return Err(StoreError::Corrupt(format!(
            "unsupported legacy algorithm {}",
            envelope.algorithm
        )));
    }
    let nonce = STANDARD
        .decode(&envelope.nonce)
        .map_err(|_| StoreError::Corrupt("legacy nonce is not base64".to_string()))?;
    if nonce.len() != NONCE_LEN {
        return Err(StoreError::Corrupt("legacy nonce has wrong length".to_string()));
    }
    let ciphertext = STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|_| StoreError::Corrupt("legacy ciphertext is not base64".to_string()))?;

    cipher(key)?
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| {
            StoreError::Decryption("legacy store could not be decrypted with this key".to_string())
        })
}

/// Wrap a JSON payload in the testing-only plaintext format
pub fn wrap_plaintext(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC.len() + 1 + payload.len());
    out.extend_from_slice(MAGIC);
    out.push(PLAINTEXT_MARKER);
    out.extend_from_slice(payload);
    out
}

/// Strip the plaintext header
pub fn unwrap_plaintext(data: &[u8]) -> &[u8] {
    &data[(MAGIC.len() + 1).min(data.len())..]
}

#[cfg(test)]
pub(crate) fn seal_legacy(key: &MappingKey, plaintext: &[u8]) -> Vec<u8> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher(key)
        .unwrap()
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .unwrap();
    serde_json::to_vec(&LegacyEnvelope {
        algorithm: LEGACY_ALGORITHM.to_string(),
        nonce: STANDARD.encode(nonce),
        ciphertext: STANDARD.encode(ciphertext),
    })
    .unwrap()
}
