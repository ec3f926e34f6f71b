//! Signed model manifest.
//!
//! A model directory ships three files:
//! - `fundus_model.json`: the model parameters
//! - `manifest.json`: SHA-256 of every bound file plus anti-replay fields
//! - `model.sig`: Ed25519 signature over the exact manifest bytes
//!
//! The signature covers the manifest and the manifest covers the files, so
//! the model actually loaded is always one the signing key vouched for.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MODEL_FILE: &str = "fundus_model.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";

const MANIFEST_VERSION: u32 = 1;
const NONCE_LEN: usize = 16;
/// Clock skew allowance for `created_at` (5 minutes).
const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// Environment variable naming a file with the base64 verifying key.
pub const PUBKEY_FILE_ENV: &str = "RETINALGUARD_MODEL_PUBKEY_B64_FILE";

/// Verifying key of the development signing key that signed `models/`.
const DEV_PUBKEY: [u8; 32] = [
    0xe6, 0x63, 0x47, 0xfa, 0x1f, 0x79, 0x74, 0x4a, 0xb6, 0x90, 0x4c, 0x16, 0x07, 0xb3, 0x67, 0x7d,
    0xb9, 0x02, 0x91, 0xe6, 0xae, 0x39, 0xa4, 0xff, 0xc3, 0xe8, 0xe6, 0xff, 0xea, 0xc0, 0x71, 0xfc,
];

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("{0:?} not found")]
    Missing(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid signature: {0}")]
    Signature(String),

    #[error("invalid verifying key: {0}")]
    Key(String),

    #[error("malformed manifest: {0}")]
    Format(#[from] serde_json::Error),

    #[error("unsupported manifest version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid nonce: {0}")]
    Nonce(String),

    #[error("manifest created_at is in the future")]
    FutureTimestamp,

    #[error("manifest does not bind {MODEL_FILE}")]
    UnboundModel,

    #[error("hash mismatch for {0}")]
    HashMismatch(String),
}

impl From<ManifestError> for crate::ports::InferenceError {
    fn from(e: ManifestError) -> Self {
        Self::ModelLoad(e.to_string())
    }
}

/// Signed description of a model directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub version: u32,
    /// Monotonic serial, e.g. a CI build number
    pub serial: u64,
    /// Unix seconds at signing time
    pub created_at: i64,
    /// Random 16-byte nonce, base64
    pub nonce_b64: String,
    /// Relative path -> lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

impl ModelManifest {
    /// Manifest binding `files` in `dir`, stamped now with a fresh nonce.
    ///
    /// # Errors
    /// Returns `ManifestError::Read` if a file cannot be hashed.
    pub fn for_files(dir: &Path, files: &[&str], serial: u64) -> Result<Self, ManifestError> {
        let mut hashes = BTreeMap::new();
        for rel in files {
            let path = dir.join(rel);
            let bytes = fs::read(&path).map_err(|source| ManifestError::Read { path, source })?;
            hashes.insert((*rel).to_string(), sha256_hex(&bytes));
        }
        Ok(Self {
            version: MANIFEST_VERSION,
            serial,
            created_at: unix_now(),
            nonce_b64: random_nonce_b64(),
            files: hashes,
        })
    }

    /// Field checks that do not need the model files.
    ///
    /// # Errors
    /// Returns the first failed check.
    pub fn validate(&self, now: i64) -> Result<(), ManifestError> {
        if self.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion(self.version));
        }
        validate_nonce_b64(&self.nonce_b64)?;
        if self.created_at > now + MAX_FUTURE_SKEW_SECS {
            return Err(ManifestError::FutureTimestamp);
        }
        if !self.files.contains_key(MODEL_FILE) {
            return Err(ManifestError::UnboundModel);
        }
        Ok(())
    }

    /// Serialize, sign and write `manifest.json` and `model.sig` into `dir`.
    ///
    /// # Errors
    /// Returns `ManifestError::Write` on IO failure.
    pub fn write_signed(&self, dir: &Path, key: &SigningKey) -> Result<(), ManifestError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let signature: Signature = key.sign(&bytes);

        let manifest_path = dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, &bytes).map_err(|source| ManifestError::Write {
            path: manifest_path,
            source,
        })?;
        let sig_path = dir.join(SIGNATURE_FILE);
        fs::write(&sig_path, signature.to_bytes()).map_err(|source| ManifestError::Write {
            path: sig_path,
            source,
        })?;
        Ok(())
    }
}

/// Checks manifest signatures and file hashes against one verifying key.
#[derive(Debug, Clone)]
pub struct ManifestVerifier {
    key: VerifyingKey,
}

impl ManifestVerifier {
    #[must_use]
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Key from `RETINALGUARD_MODEL_PUBKEY_B64_FILE`, else the embedded
    /// development key.
    ///
    /// # Errors
    /// Returns `ManifestError` if the key file is unreadable or invalid.
    pub fn from_environment() -> Result<Self, ManifestError> {
        if let Ok(path) = std::env::var(PUBKEY_FILE_ENV) {
            let path = PathBuf::from(path.trim());
            let b64 = fs::read_to_string(&path)
                .map_err(|source| ManifestError::Read { path, source })?;
            return Ok(Self::new(verifying_key_from_b64(&b64)?));
        }
        Ok(Self::new(dev_verifying_key()?))
    }

    /// Whether `dir` contains a manifest and a signature.
    #[must_use]
    pub fn is_signed(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE).exists() && dir.join(SIGNATURE_FILE).exists()
    }

    /// Verify the manifest in `dir` and every file it binds.
    ///
    /// # Errors
    /// Returns `ManifestError` on a missing file, bad signature, failed field
    /// check or hash mismatch.
    pub fn verify(&self, dir: &Path) -> Result<ModelManifest, ManifestError> {
        let sig_path = dir.join(SIGNATURE_FILE);
        let manifest_path = dir.join(MANIFEST_FILE);
        for path in [&sig_path, &manifest_path] {
            if !path.exists() {
                return Err(ManifestError::Missing(path.clone()));
            }
        }

        let sig_bytes = read(&sig_path)?;
        let sig_bytes: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
            ManifestError::Signature(format!("expected 64 bytes, got {}", sig_bytes.len()))
        })?;
        let signature = Signature::from_bytes(&sig_bytes);

        let manifest_bytes = read(&manifest_path)?;
        self.key
            .verify(&manifest_bytes, &signature)
            .map_err(|_| ManifestError::Signature("does not match manifest".to_string()))?;

        let manifest: ModelManifest = serde_json::from_slice(&manifest_bytes)?;
        manifest.validate(unix_now())?;

        for (rel, expected) in &manifest.files {
            let actual = sha256_hex(&read(&dir.join(rel))?);
            if !constant_time_eq(actual.as_bytes(), expected.to_ascii_lowercase().as_bytes()) {
                return Err(ManifestError::HashMismatch(rel.clone()));
            }
        }

        tracing::info!(
            serial = manifest.serial,
            files = manifest.files.len(),
            "Model signature and hashes verified"
        );
        Ok(manifest)
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ManifestError> {
    fs::read(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// The embedded development verifying key.
///
/// # Errors
/// Returns `ManifestError::Key` if the embedded bytes are not a valid point.
pub fn dev_verifying_key() -> Result<VerifyingKey, ManifestError> {
    VerifyingKey::from_bytes(&DEV_PUBKEY).map_err(|e| ManifestError::Key(e.to_string()))
}

/// Decode a base64 Ed25519 verifying key.
///
/// # Errors
/// Returns `ManifestError::Key` on bad base64, wrong length or invalid point.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ManifestError> {
    let bytes = general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|e| ManifestError::Key(format!("invalid base64: {e}")))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ManifestError::Key(format!("expected 32 bytes, got {}", bytes.len())))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| ManifestError::Key(e.to_string()))
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// # Errors
/// Returns `ManifestError::Nonce` unless `nonce_b64` decodes to 16 bytes.
pub fn validate_nonce_b64(nonce_b64: &str) -> Result<(), ManifestError> {
    let raw = general_purpose::STANDARD
        .decode(nonce_b64.trim())
        .map_err(|e| ManifestError::Nonce(e.to_string()))?;
    if raw.len() != NONCE_LEN {
        return Err(ManifestError::Nonce(format!(
            "must decode to exactly {NONCE_LEN} bytes"
        )));
    }
    Ok(())
}

fn random_nonce_b64() -> String {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    general_purpose::STANDARD.encode(nonce)
}

#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn signed_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(MODEL_FILE), br#"{"format_version":1}"#).expect("write");
        ModelManifest::for_files(dir.path(), &[MODEL_FILE], 3)
            .expect("manifest")
            .write_signed(dir.path(), &signing_key())
            .expect("sign");
        dir
    }

    #[test]
    fn test_verify_signed_directory() {
        let dir = signed_dir();
        let verifier = ManifestVerifier::new(signing_key().verifying_key());

        let manifest = verifier.verify(dir.path()).expect("verifies");
        assert_eq!(manifest.serial, 3);
        assert!(manifest.files.contains_key(MODEL_FILE));
    }

    #[test]
    fn test_tampered_model_rejected() {
        let dir = signed_dir();
        fs::write(dir.path().join(MODEL_FILE), br#"{"format_version":2}"#).expect("write");

        let verifier = ManifestVerifier::new(signing_key().verifying_key());
        assert!(matches!(
            verifier.verify(dir.path()),
            Err(ManifestError::HashMismatch(_))
        ));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let dir = signed_dir();
        let other = SigningKey::from_bytes(&[9u8; 32]).verifying_key();
        assert!(matches!(
            ManifestVerifier::new(other).verify(dir.path()),
            Err(ManifestError::Signature(_))
        ));
    }

    #[test]
    fn test_missing_signature() {
        let dir = signed_dir();
        fs::remove_file(dir.path().join(SIGNATURE_FILE)).expect("remove");
        assert!(!ManifestVerifier::is_signed(dir.path()));

        let verifier = ManifestVerifier::new(signing_key().verifying_key());
        assert!(matches!(
            verifier.verify(dir.path()),
            Err(ManifestError::Missing(_))
        ));
    }

    #[test]
    fn test_field_checks() {
        let now = unix_now();
        let mut files = BTreeMap::new();
        files.insert(MODEL_FILE.to_string(), sha256_hex(b"x"));
        let good = ModelManifest {
            version: 1,
            serial: 1,
            created_at: now,
            nonce_b64: general_purpose::STANDARD.encode([1u8; 16]),
            files,
        };
        assert!(good.validate(now).is_ok());

        let future = ModelManifest {
            created_at: now + 3_600,
            ..good.clone()
        };
        assert!(matches!(
            future.validate(now),
            Err(ManifestError::FutureTimestamp)
        ));

        let short_nonce = ModelManifest {
            nonce_b64: general_purpose::STANDARD.encode([1u8; 8]),
            ..good.clone()
        };
        assert!(matches!(
            short_nonce.validate(now),
            Err(ManifestError::Nonce(_))
        ));

        let v2 = ModelManifest {
            version: 2,
            ..good.clone()
        };
        assert!(matches!(
            v2.validate(now),
            Err(ManifestError::UnsupportedVersion(2))
        ));

        let unbound = ModelManifest {
            files: BTreeMap::new(),
            ..good
        };
        assert!(matches!(
            unbound.validate(now),
            Err(ManifestError::UnboundModel)
        ));
    }

    #[test]
    fn test_key_from_b64() {
        let key = signing_key().verifying_key();
        let b64 = general_purpose::STANDARD.encode(key.as_bytes());
        assert_eq!(verifying_key_from_b64(&format!("{b64}\n")).expect("key"), key);
        assert!(verifying_key_from_b64("AAAA").is_err());
    }

    #[test]
    fn test_shipped_models_verify_with_dev_key() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        let verifier = ManifestVerifier::new(dev_verifying_key().expect("dev key"));
        verifier.verify(&dir).expect("shipped model is signed");
    }
}
