//! Signed fundus model runtime.
//!
//! Loads `fundus_model.json` from a model directory only after the
//! Ed25519-signed manifest vouches for it (see `manifest`).
//!
//! The model is a compact linear head over per-channel statistics of the
//! normalized frame, followed by a sigmoid. It keeps the interface of a
//! tensor interpreter: fixed input shape, one float output.
//!
//! # Unsigned models
//!
//! Debug builds accept an unsigned directory when
//! `RETINALGUARD_ALLOW_UNSIGNED_MODELS=true`. Release builds never do.

pub mod manifest;

use std::fs;
use std::path::Path;

use ed25519_dalek::VerifyingKey;
use serde::Deserialize;

use crate::ports::{InferenceError, ModelRuntime, ModelSession};
use manifest::{ManifestVerifier, MODEL_FILE};

pub const ALLOW_UNSIGNED_MODELS_ENV: &str = "RETINALGUARD_ALLOW_UNSIGNED_MODELS";

const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct FundusModelFile {
    format_version: u32,
    #[serde(default)]
    name: Option<String>,
    input_shape: [usize; 4],
    channel_weights: Vec<f32>,
    bias: f32,
}

/// Model runtime that verifies the signed manifest before loading.
#[derive(Debug, Clone)]
pub struct SignedModelRuntime {
    verifier: ManifestVerifier,
    allow_unsigned: bool,
}

impl SignedModelRuntime {
    /// Runtime trusting models signed by `key`.
    #[must_use]
    pub fn new(key: VerifyingKey) -> Self {
        Self {
            verifier: ManifestVerifier::new(key),
            allow_unsigned: false,
        }
    }

    /// Runtime configured from the environment (verifying key and, in debug
    /// builds, the unsigned-model bypass).
    ///
    /// # Errors
    /// Returns `InferenceError::ModelLoad` if the verifying key is invalid.
    pub fn from_environment() -> Result<Self, InferenceError> {
        let verifier = ManifestVerifier::from_environment()?;
        let allow_unsigned = cfg!(debug_assertions)
            && std::env::var(ALLOW_UNSIGNED_MODELS_ENV)
                .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "YES"))
                .unwrap_or(false);
        Ok(Self {
            verifier,
            allow_unsigned,
        })
    }

    /// Accept unsigned model directories. Has no effect in release builds.
    #[must_use]
    pub fn allow_unsigned(mut self, allow: bool) -> Self {
        self.allow_unsigned = allow;
        self
    }

    fn check_signature(&self, dir: &Path) -> Result<(), InferenceError> {
        if !ManifestVerifier::is_signed(dir) && cfg!(debug_assertions) && self.allow_unsigned {
            tracing::warn!(
                "Loading UNSIGNED model from {:?} ({ALLOW_UNSIGNED_MODELS_ENV}=true)",
                dir
            );
            return Ok(());
        }
        self.verifier.verify(dir)?;
        Ok(())
    }
}

impl ModelRuntime for SignedModelRuntime {
    type Session = LinearFundusModel;

    fn load(&self, dir: &Path) -> Result<LinearFundusModel, InferenceError> {
        self.check_signature(dir)?;

        let path = dir.join(MODEL_FILE);
        let bytes = fs::read(&path)
            .map_err(|e| InferenceError::ModelLoad(format!("failed to read {path:?}: {e}")))?;
        LinearFundusModel::from_json(&bytes)
    }
}

/// Linear CVD risk head over per-channel means.
#[derive(Debug, Clone)]
pub struct LinearFundusModel {
    input_shape: [usize; 4],
    channel_weights: Vec<f32>,
    bias: f32,
}

impl LinearFundusModel {
    /// Parse and validate a model file.
    ///
    /// # Errors
    /// Returns `InferenceError::ModelLoad` for malformed or inconsistent
    /// parameters.
    pub fn from_json(bytes: &[u8]) -> Result<Self, InferenceError> {
        let file: FundusModelFile = serde_json::from_slice(bytes)
            .map_err(|e| InferenceError::ModelLoad(format!("invalid model file: {e}")))?;

        if file.format_version != MODEL_FORMAT_VERSION {
            return Err(InferenceError::ModelLoad(format!(
                "unsupported model format version {}",
                file.format_version
            )));
        }
        let [batch, height, width, channels] = file.input_shape;
        if batch != 1 || height == 0 || width == 0 || channels == 0 {
            return Err(InferenceError::ModelLoad(format!(
                "invalid input shape {:?}",
                file.input_shape
            )));
        }
        if file.channel_weights.len() != channels {
            return Err(InferenceError::ModelLoad(format!(
                "{} channel weights for {} channels",
                file.channel_weights.len(),
                channels
            )));
        }
        if !file.bias.is_finite() || file.channel_weights.iter().any(|w| !w.is_finite()) {
            return Err(InferenceError::ModelLoad(
                "model parameters must be finite".to_string(),
            ));
        }

        tracing::debug!(name = ?file.name, shape = ?file.input_shape, "Fundus model parsed");
        Ok(Self {
            input_shape: file.input_shape,
            channel_weights: file.channel_weights,
            bias: file.bias,
        })
    }
}

impl ModelSession for LinearFundusModel {
    fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    fn invoke(&mut self, input: &[f32]) -> Result<f32, InferenceError> {
        let expected: usize = self.input_shape.iter().product();
        if input.len() != expected {
            return Err(InferenceError::TensorCopy(format!(
                "input has {} values, tensor needs {expected}",
                input.len()
            )));
        }

        let channels = self.input_shape[3];
        let mut sums = vec![0f64; channels];
        for pixel in input.chunks_exact(channels) {
            for (sum, &v) in sums.iter_mut().zip(pixel) {
                *sum += f64::from(v);
            }
        }
        let pixels = (expected / channels) as f64;

        let logit = sums
            .iter()
            .zip(&self.channel_weights)
            .map(|(sum, &w)| sum / pixels * f64::from(w))
            .sum::<f64>()
            + f64::from(self.bias);

        Ok(sigmoid(logit) as f32)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use manifest::ModelManifest;

    const SMALL_MODEL: &str = r#"{
        "format_version": 1,
        "name": "test",
        "input_shape": [1, 2, 2, 3],
        "channel_weights": [1.0, 0.0, 0.0],
        "bias": 0.0
    }"#;

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[42u8; 32])
    }

    fn model_dir(signed: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(MODEL_FILE), SMALL_MODEL).expect("write model");
        if signed {
            ModelManifest::for_files(dir.path(), &[MODEL_FILE], 1)
                .expect("manifest")
                .write_signed(dir.path(), &key())
                .expect("sign");
        }
        dir
    }

    #[test]
    fn test_load_and_invoke_signed_model() {
        let dir = model_dir(true);
        let runtime = SignedModelRuntime::new(key().verifying_key());
        let mut session = runtime.load(dir.path()).expect("load");

        assert_eq!(session.input_shape(), [1, 2, 2, 3]);
        // Red channel mean 0 -> logit 0 -> 0.5
        let out = session.invoke(&[0.0; 12]).expect("invoke");
        assert!((out - 0.5).abs() < 1e-6);

        let bright_red: Vec<f32> = (0..12).map(|i| if i % 3 == 0 { 1.0 } else { -1.0 }).collect();
        let out = session.invoke(&bright_red).expect("invoke");
        assert!((f64::from(out) - sigmoid(1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_wrong_input_length() {
        let mut model = LinearFundusModel::from_json(SMALL_MODEL.as_bytes()).expect("parse");
        assert!(matches!(
            model.invoke(&[0.0; 11]),
            Err(InferenceError::TensorCopy(_))
        ));
    }

    #[test]
    fn test_unsigned_rejected_by_default() {
        let dir = model_dir(false);
        let runtime = SignedModelRuntime::new(key().verifying_key());
        assert!(matches!(
            runtime.load(dir.path()),
            Err(InferenceError::ModelLoad(_))
        ));
    }

    #[test]
    fn test_unsigned_allowed_in_debug() {
        let dir = model_dir(false);
        let runtime = SignedModelRuntime::new(key().verifying_key()).allow_unsigned(true);
        let result = runtime.load(dir.path());
        if cfg!(debug_assertions) {
            assert!(result.is_ok());
        } else {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_tampered_model_not_loaded() {
        let dir = model_dir(true);
        fs::write(
            dir.path().join(MODEL_FILE),
            SMALL_MODEL.replace("1.0, 0.0, 0.0", "9.0, 0.0, 0.0"),
        )
        .expect("tamper");

        let runtime = SignedModelRuntime::new(key().verifying_key()).allow_unsigned(true);
        assert!(runtime.load(dir.path()).is_err());
    }

    #[test]
    fn test_invalid_parameters() {
        let bad_weights = SMALL_MODEL.replace("[1.0, 0.0, 0.0]", "[1.0, 0.0]");
        assert!(LinearFundusModel::from_json(bad_weights.as_bytes()).is_err());

        let bad_shape = SMALL_MODEL.replace("[1, 2, 2, 3]", "[2, 2, 2, 3]");
        assert!(LinearFundusModel::from_json(bad_shape.as_bytes()).is_err());

        assert!(LinearFundusModel::from_json(b"not json").is_err());
    }

    #[test]
    fn test_shipped_model_runs_on_blank_frame() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("models");
        let runtime =
            SignedModelRuntime::new(manifest::dev_verifying_key().expect("dev key"));
        let mut session = runtime.load(&dir).expect("shipped model loads");

        assert_eq!(session.input_shape(), crate::ports::FUNDUS_INPUT_SHAPE);
        let out = session.invoke(&vec![-1.0; 256 * 256 * 3]).expect("invoke");
        assert!((0.0..=1.0).contains(&out));
    }
}
