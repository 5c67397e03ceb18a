//! Keygen command implementation
//!
//! Creates the base64 key file the mapping store is encrypted with, or
//! rotates it and re-encrypts an existing store under the new key.

use crate::deidentification::{FileKeyProvider, KeyProvider, MappingStore};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the keygen command
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Key file to create or rotate
    #[arg(long, value_name = "FILE")]
    pub key_file: PathBuf,

    /// Replace an existing key; the old key is kept as <key-file>.prev
    #[arg(long)]
    pub rotate: bool,

    /// Mapping store to re-encrypt under the rotated key
    #[arg(long, value_name = "FILE", requires = "rotate")]
    pub mapping_file: Option<PathBuf>,
}

impl KeygenArgs {
    /// Execute the keygen command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        let provider = FileKeyProvider::new(&self.key_file);

        if !self.rotate {
            return match provider.generate_key() {
                Ok(_) => {
                    tracing::info!(key = %provider.describe(), "Mapping store key created");
                    println!("✅ Key file created: {}", self.key_file.display());
                    println!("   Keep it out of version control and away from the data.");
                    Ok(0)
                }
                Err(e) => {
                    eprintln!("❌ {e}");
                    Ok(3) // Mapping store or key error exit code
                }
            };
        }

        let old_key = match provider.load_key() {
            Ok(k) => k,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(3);
            }
        };
        let new_key = match provider.rotate_key() {
            Ok(k) => k,
            Err(e) => {
                eprintln!("❌ Key rotation failed: {e}");
                return Ok(3);
            }
        };
        tracing::info!(key = %provider.describe(), "Mapping store key rotated");
        println!("✅ Key rotated: {}", self.key_file.display());
        println!("   Previous key: {}", provider.previous_path().display());

        if let Some(mapping_file) = &self.mapping_file {
            match MappingStore::rekey(mapping_file, &old_key, &new_key) {
                Ok(entries) => {
                    tracing::info!(
                        store = %mapping_file.display(),
                        entries = entries,
                        "Mapping store re-encrypted"
                    );
                    println!(
                        "✅ Re-encrypted {} ({entries} mappings)",
                        mapping_file.display()
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Mapping store re-encryption failed");
                    eprintln!("❌ Re-encryption failed: {e}");
                    eprintln!(
                        "   The store is still readable with {}",
                        provider.previous_path().display()
                    );
                    return Ok(3);
                }
            }
        }

        Ok(0)
    }
}
