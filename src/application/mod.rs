//! Application layer: screening use cases.
//!
//! Each step of a screening cycle lives in its own module; the orchestrator
//! sequences them and the worker drives the orchestrator from a dedicated
//! thread.

mod capture;
mod commands;
mod fusion;
mod inference;
mod orchestrator;
mod state;
mod vitals;
mod worker;

pub use capture::ImageCapture;
pub use commands::{CommandDispatcher, CommandResponse, DeviceActivity, RemoteCommand, StatusReport};
pub use fusion::{FusionEngine, FusionWeights, RiskClassifier};
pub use inference::{preprocess, BloodPressureEstimator, RiskInferenceEngine};
pub use orchestrator::{CycleAborted, CycleReport, PhaseChange, ScreeningOrchestrator, ScreeningPhase};
pub use state::DeviceState;
pub use vitals::VitalsReader;
pub use worker::{
    CycleEvent, ScreenTrigger, ScreeningWorker, ScreeningWorkerHandle, TriggerOutcome,
    TriggerSource, WorkerOptions,
};
