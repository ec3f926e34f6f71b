//! Signs a RetinalGuard model directory.
//!
//! Writes `manifest.json` (SHA-256 of `fundus_model.json` plus serial,
//! timestamp and nonce) and `model.sig` (Ed25519 over the manifest bytes).
//!
//! # Usage
//!
//! ```bash
//! RETINALGUARD_MODEL_SIGNING_KEY_B64_FILE=/path/to/seed.b64 \
//!     cargo run --bin sign_model -- <model_dir> [--serial <n>]
//! ```
//!
//! The key file holds a base64 32-byte Ed25519 seed. Debug builds also
//! accept the seed directly in `RETINALGUARD_MODEL_SIGNING_KEY_B64`.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::SigningKey;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use retinalguard::adapters::model::manifest::{unix_now, ModelManifest, MODEL_FILE};

const KEY_FILE_ENV: &str = "RETINALGUARD_MODEL_SIGNING_KEY_B64_FILE";
const KEY_ENV: &str = "RETINALGUARD_MODEL_SIGNING_KEY_B64";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn read_seed_b64() -> Result<Zeroizing<String>> {
    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim()).context("reading signing key file")?,
        );
        return Ok(Zeroizing::new(content.trim().to_string()));
    }

    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV) {
            return Ok(Zeroizing::new(v.trim().to_string()));
        }
    }

    bail!("missing signing key: set {KEY_FILE_ENV} ({KEY_ENV} is accepted in debug builds)")
}

fn read_seed() -> Result<Seed> {
    let b64 = read_seed_b64()?;
    if b64.is_empty() {
        bail!("signing key is empty");
    }
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.as_bytes())
            .context("signing key is not valid base64")?,
    );
    if raw.len() != 32 {
        bail!("signing key seed must be 32 bytes, got {}", raw.len());
    }
    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

fn usage() -> String {
    "Usage: sign_model <model_dir> [--serial <u64>]".to_string()
}

fn parse_args() -> Result<(PathBuf, Option<u64>)> {
    let mut args = env::args().skip(1);
    let mut model_dir = None;
    let mut serial = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--serial" => {
                let v = args.next().ok_or_else(|| anyhow::anyhow!(usage()))?;
                serial = Some(v.trim().parse::<u64>().context("--serial must be a u64")?);
            }
            "-h" | "--help" => bail!(usage()),
            _ if model_dir.is_none() => model_dir = Some(PathBuf::from(arg)),
            _ => bail!(usage()),
        }
    }

    let model_dir = model_dir.ok_or_else(|| anyhow::anyhow!(usage()))?;
    Ok((model_dir, serial))
}

fn main() -> Result<()> {
    let (model_dir, serial) = parse_args()?;
    if !model_dir.join(MODEL_FILE).exists() {
        bail!("{MODEL_FILE} not found in {model_dir:?}");
    }

    let seed = read_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let serial = serial.unwrap_or_else(|| unix_now().max(1) as u64);
    let manifest = ModelManifest::for_files(&model_dir, &[MODEL_FILE], serial)?;
    manifest.write_signed(&model_dir, &signing_key)?;

    println!("Signed {MODEL_FILE} in {model_dir:?} (serial {serial})");
    println!(
        "Verifying key (base64): {}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );
    Ok(())
}
