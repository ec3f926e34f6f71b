//! Model runtime port: Trait for the on-device neural network runtime.
//!
//! This trait abstracts the model format and interpreter from the
//! inference engine. A loaded model is represented by a session handle that
//! owns all runtime resources and releases them on drop.

use std::path::Path;

/// Input tensor shape expected by the fundus model: `[batch, height, width, channels]`.
pub const FUNDUS_INPUT_SHAPE: [usize; 4] = [1, 256, 256, 3];

/// Errors raised by model loading and inference.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("Inference runtime not initialized")]
    Uninitialized,

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Input tensor copy failed: {0}")]
    TensorCopy(String),

    #[error("Model invocation failed: {0}")]
    Invocation(String),
}

/// Trait for a model runtime able to load a model file.
pub trait ModelRuntime {
    /// Session type produced by a successful load.
    type Session: ModelSession;

    /// Load a model and allocate its tensors.
    ///
    /// # Errors
    /// Returns `InferenceError::ModelLoad` if the model cannot be read,
    /// verified or allocated.
    fn load(&self, path: &Path) -> Result<Self::Session, InferenceError>;
}

/// A loaded model ready for invocation.
pub trait ModelSession: Send {
    /// Input tensor shape of this model.
    fn input_shape(&self) -> [usize; 4];

    /// Run the model on a normalized float32 input tensor.
    ///
    /// # Returns
    /// The raw scalar output (conceptually a sigmoid probability).
    ///
    /// # Errors
    /// Returns `InferenceError::TensorCopy` if the input does not fit the
    /// input tensor, `InferenceError::Invocation` if the run fails.
    fn invoke(&mut self, input: &[f32]) -> Result<f32, InferenceError>;
}
