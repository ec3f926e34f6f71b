//! Ports layer: Trait definitions for external collaborators.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the screening core and the device hardware, model runtime,
//! cloud transport and display.

mod camera;
mod display;
mod model_runtime;
mod sensors;
mod transport;

pub use camera::{Camera, CaptureError};
pub use display::{DisplayError, ResultDisplay};
pub use model_runtime::{InferenceError, ModelRuntime, ModelSession, FUNDUS_INPUT_SHAPE};
pub use sensors::{SensorError, VitalsSensor};
pub use transport::{ResultSink, TransportError};
