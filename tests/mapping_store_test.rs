//! Integration tests for the encrypted mapping store
//!
//! These tests verify that:
//! - Pseudonyms and the date offset survive separate engine instances
//! - A wrong key and a tampered file are told apart
//! - Legacy v1 stores are read and upgraded on the next save
//! - An encrypted store is never opened or replaced in plaintext mode
//! - Re-keying keeps every mapping

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use veil::deidentification::store::StoreFormat;
use veil::deidentification::{
    DeidentificationConfig, DeidentificationEngine, EncryptionMode, IdentifierCategory,
    MappingKey, MappingStore, RunStatistics, StaticKeyProvider,
};
use veil::domain::{CountryCode, CountrySelection, DeidError, StoreError};

fn encrypted(key: &MappingKey) -> EncryptionMode {
    EncryptionMode::Enabled(Arc::new(StaticKeyProvider::new(key.clone())))
}

fn engine_at(path: &Path, mode: EncryptionMode) -> Result<DeidentificationEngine, DeidError> {
    let mut config = DeidentificationConfig::new(mode);
    config.countries = CountrySelection::only([CountryCode::US]);
    config.mapping_path = Some(path.to_path_buf());
    DeidentificationEngine::new(config, Arc::new(RunStatistics::new()))
}

const NOTE: &str = "MRN: 123456 seen 2020-02-01";

#[test]
fn test_pseudonyms_and_offset_stable_across_runs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mappings.enc");
    let key = MappingKey::generate();

    let first = engine_at(&path, encrypted(&key)).unwrap();
    let out1 = first.deidentify_text(NOTE).unwrap().text;
    first.persist_store().unwrap();
    drop(first);

    let second = engine_at(&path, encrypted(&key)).unwrap();
    let out2 = second.deidentify_text(NOTE).unwrap().text;
    assert_eq!(out1, out2);
    assert_eq!(second.mapping_counts().unwrap(), (0, 1));
}

#[test]
fn test_store_file_hides_originals() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mappings.enc");
    let key = MappingKey::generate();

    let engine = engine_at(&path, encrypted(&key)).unwrap();
    engine.deidentify_text("MRN: 8765432").unwrap();
    engine.persist_store().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"VEILMAP"));
    assert!(!String::from_utf8_lossy(&bytes).contains("8765432"));
}

#[test]
fn test_wrong_key_is_decryption_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mappings.enc");

    let engine = engine_at(&path, encrypted(&MappingKey::generate())).unwrap();
    engine.deidentify_text(NOTE).unwrap();
    engine.persist_store().unwrap();

    let err = engine_at(&path, encrypted(&MappingKey::generate())).unwrap_err();
    assert!(matches!(err, DeidError::Store(StoreError::Decryption(_))));
    assert!(err.is_fatal());
}

#[test]
fn test_tampered_store_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mappings.enc");
    let key = MappingKey::generate();

    let engine = engine_at(&path, encrypted(&key)).unwrap();
    engine.deidentify_text(NOTE).unwrap();
    engine.persist_store().unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    let err = engine_at(&path, encrypted(&key)).unwrap_err();
    assert!(matches!(err, DeidError::Store(StoreError::Corrupt(_))));
}

#[test]
fn test_legacy_store_is_read_and_upgraded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.enc");
    let key = MappingKey::generate();

    let payload = serde_json::json!({"MRN:123456": "[MRN-LEGACYTOKN]"}).to_string();
    let nonce = [7u8; 12];
    let ciphertext = Aes256Gcm::new_from_slice(key.as_bytes())
        .unwrap()
        .encrypt(Nonce::from_slice(&nonce), payload.as_bytes())
        .unwrap();
    let envelope = serde_json::json!({
        "algorithm": "AES-256-GCM",
        "nonce": STANDARD.encode(nonce),
        "ciphertext": STANDARD.encode(ciphertext),
    });
    std::fs::write(&path, envelope.to_string()).unwrap();

    let engine = engine_at(&path, encrypted(&key)).unwrap();
    let output = engine.deidentify_text("MRN: 123456").unwrap().text;
    assert_eq!(output, "MRN: [MRN-LEGACYTOKN]");
    engine.persist_store().unwrap();

    let reloaded = MappingStore::load(&path, &encrypted(&key)).unwrap();
    assert_eq!(reloaded.loaded_format(), Some(StoreFormat::EncryptedV2));
    assert_eq!(
        reloaded.lookup(IdentifierCategory::Mrn, "123456"),
        Some("[MRN-LEGACYTOKN]")
    );
}

#[test]
fn test_plaintext_mode_refuses_encrypted_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mappings.enc");

    let engine = engine_at(&path, encrypted(&MappingKey::generate())).unwrap();
    engine.deidentify_text(NOTE).unwrap();
    engine.persist_store().unwrap();

    let err = engine_at(&path, EncryptionMode::DisabledForTesting).unwrap_err();
    assert!(matches!(
        err,
        DeidError::Store(StoreError::EncryptionRequired(_))
    ));
}

#[test]
fn test_plaintext_store_is_encrypted_on_next_save() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mappings.enc");
    let key = MappingKey::generate();

    let plain = engine_at(&path, EncryptionMode::DisabledForTesting).unwrap();
    let before = plain.deidentify_text("MRN: 123456").unwrap().text;
    plain.persist_store().unwrap();
    drop(plain);

    let engine = engine_at(&path, encrypted(&key)).unwrap();
    assert_eq!(engine.deidentify_text("MRN: 123456").unwrap().text, before);
    engine.persist_store().unwrap();

    let reloaded = MappingStore::load(&path, &encrypted(&key)).unwrap();
    assert_eq!(reloaded.loaded_format(), Some(StoreFormat::EncryptedV2));
}

#[test]
fn test_rekey_keeps_mappings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mappings.enc");
    let old = MappingKey::generate();
    let new = MappingKey::generate();

    let engine = engine_at(&path, encrypted(&old)).unwrap();
    let before = engine.deidentify_text("MRN: 123456, MRN: 654321").unwrap().text;
    engine.persist_store().unwrap();
    drop(engine);

    assert_eq!(MappingStore::rekey(&path, &old, &new).unwrap(), 2);
    assert!(matches!(
        MappingStore::load(&path, &encrypted(&old)),
        Err(StoreError::Decryption(_))
    ));

    let engine = engine_at(&path, encrypted(&new)).unwrap();
    let after = engine.deidentify_text("MRN: 123456, MRN: 654321").unwrap().text;
    assert_eq!(before, after);

    let pseudonym = Regex::new(r"\[MRN-[A-Z]+\]").unwrap();
    let first = pseudonym.find(&after).unwrap().as_str();
    let (_, original) = engine.reverse_lookup(first).unwrap().unwrap();
    assert_eq!(original, "123456");
}

#[test]
fn test_missing_key_aborts_before_any_write() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mappings.enc");

    let err = engine_at(
        &path,
        EncryptionMode::Enabled(Arc::new(StaticKeyProvider::empty())),
    )
    .unwrap_err();
    assert!(matches!(err, DeidError::Store(StoreError::KeyProvider(_))));
    assert!(!path.exists());
}
