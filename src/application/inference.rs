//! Image inference: CVD risk from the fundus model and the blood pressure
//! biomarker.
//!
//! The engine owns the model session. Until a model is loaded every call
//! fails with `InferenceError::Uninitialized`; a missing risk score is never
//! replaced by a default.

use std::path::Path;
use std::time::Instant;

use crate::domain::PixelBuffer;
use crate::ports::{InferenceError, ModelRuntime, ModelSession};

/// Normalize RGB bytes from [0, 255] to [-1, 1] (`v / 127.5 - 1`).
#[must_use]
pub fn preprocess(frame: &PixelBuffer) -> Vec<f32> {
    frame
        .as_bytes()
        .iter()
        .map(|&v| f32::from(v) / 127.5 - 1.0)
        .collect()
}

/// Maps a fundus frame to a CVD risk probability.
pub struct RiskInferenceEngine<S: ModelSession> {
    session: Option<S>,
}

impl<S: ModelSession> RiskInferenceEngine<S> {
    /// Create an engine with no model loaded.
    #[must_use]
    pub fn uninitialized() -> Self {
        Self { session: None }
    }

    /// Create an engine around an already loaded session.
    #[must_use]
    pub fn with_session(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Load the model through `runtime`, replacing any previous session.
    ///
    /// # Errors
    /// Returns `InferenceError::ModelLoad` if the runtime cannot load the model.
    pub fn initialize<R>(&mut self, runtime: &R, model_path: &Path) -> Result<(), InferenceError>
    where
        R: ModelRuntime<Session = S>,
    {
        let session = runtime.load(model_path)?;
        tracing::info!(
            "Model loaded from {:?} (input shape {:?})",
            model_path,
            session.input_shape()
        );
        self.session = Some(session);
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Input tensor shape of the loaded model, `None` without a model.
    #[must_use]
    pub fn input_shape(&self) -> Option<[usize; 4]> {
        self.session.as_ref().map(ModelSession::input_shape)
    }

    /// Release the model session.
    pub fn teardown(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("Model session released");
        }
    }

    /// Run the model on a frame.
    ///
    /// # Returns
    /// Risk in [0, 1]; out-of-range model output is clamped.
    ///
    /// # Errors
    /// Returns `InferenceError::Uninitialized` without a model,
    /// `InferenceError::TensorCopy` if the frame does not match the input
    /// tensor, `InferenceError::Invocation` if the run fails or yields NaN.
    pub fn infer(&mut self, frame: &PixelBuffer) -> Result<f64, InferenceError> {
        let session = self.session.as_mut().ok_or(InferenceError::Uninitialized)?;

        let shape = session.input_shape();
        let expected: usize = shape.iter().product();
        if frame.len() != expected {
            return Err(InferenceError::TensorCopy(format!(
                "frame has {} values, input tensor {:?} needs {}",
                frame.len(),
                shape,
                expected
            )));
        }

        let input = preprocess(frame);

        let start = Instant::now();
        let raw = session.invoke(&input)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if raw.is_nan() {
            return Err(InferenceError::Invocation(
                "model produced NaN output".to_string(),
            ));
        }

        let risk = f64::from(raw.clamp(0.0, 1.0));
        tracing::debug!(raw = f64::from(raw), risk, elapsed_ms, "Inference complete");
        Ok(risk)
    }
}

/// Estimates systolic blood pressure from the fundus frame.
///
/// Vessel-caliber analysis is not available on the device, so the estimate
/// is a fixed baseline. The call is pure and always yields a number.
#[derive(Debug, Clone, Copy)]
pub struct BloodPressureEstimator {
    baseline_mmhg: f64,
}

impl BloodPressureEstimator {
    /// Baseline systolic pressure in mmHg.
    pub const DEFAULT_BASELINE_MMHG: f64 = 120.0;

    #[must_use]
    pub fn new(baseline_mmhg: f64) -> Self {
        Self { baseline_mmhg }
    }

    #[must_use]
    pub fn estimate(&self, _frame: &PixelBuffer) -> f64 {
        self.baseline_mmhg
    }
}

impl Default for BloodPressureEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASELINE_MMHG)
    }
}
