//! Screening orchestrator: sequences one screening cycle.
//!
//! ```text
//! IDLE -> CAPTURING -> INFERRING -> READING_VITALS -> FUSING -> CLASSIFYING -> REPORTING -> IDLE
//!              \            \              \
//!               +------------+--------------+--> ABORTED -> IDLE
//! ```
//!
//! Capture, inference and vitals failures abort the cycle before any later
//! step runs and leave the last known result untouched. Display and
//! transport failures are logged; the result is still kept.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::capture::ImageCapture;
use super::fusion::{FusionEngine, RiskClassifier};
use super::inference::{BloodPressureEstimator, RiskInferenceEngine};
use super::state::DeviceState;
use super::vitals::VitalsReader;
use crate::domain::{RiskAssessment, ScreeningResult, CHANNELS};
use crate::ports::{Camera, InferenceError, ModelSession, ResultDisplay, ResultSink};
use crate::RetinalGuardError;

/// States of the screening state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreeningPhase {
    Idle,
    Capturing,
    Inferring,
    ReadingVitals,
    Fusing,
    Classifying,
    Reporting,
    Aborted,
}

impl std::fmt::Display for ScreeningPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "IDLE",
            Self::Capturing => "CAPTURING",
            Self::Inferring => "INFERRING",
            Self::ReadingVitals => "READING_VITALS",
            Self::Fusing => "FUSING",
            Self::Classifying => "CLASSIFYING",
            Self::Reporting => "REPORTING",
            Self::Aborted => "ABORTED",
        };
        f.write_str(label)
    }
}

/// One state transition, published to progress observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub cycle: u64,
    pub from: ScreeningPhase,
    pub to: ScreeningPhase,
}

/// A cycle that stopped before producing a result.
#[derive(Debug, thiserror::Error)]
#[error("screening aborted during {phase}: {error}")]
pub struct CycleAborted {
    /// Step that failed
    pub phase: ScreeningPhase,
    /// Underlying failure
    #[source]
    pub error: RetinalGuardError,
}

impl CycleAborted {
    fn new(phase: ScreeningPhase, error: impl Into<RetinalGuardError>) -> Self {
        Self {
            phase,
            error: error.into(),
        }
    }
}

/// Outcome of a completed cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The result now held as last known result
    pub result: Arc<ScreeningResult>,
    /// Whether the display accepted the result
    pub displayed: bool,
    /// Whether the cloud transport accepted the result
    pub published: bool,
}

/// Runs screening cycles against the device collaborators.
///
/// Not `Sync`: exactly one thread drives it (see `ScreeningWorker`).
pub struct ScreeningOrchestrator<C: Camera, S: ModelSession> {
    capture: ImageCapture<C>,
    engine: RiskInferenceEngine<S>,
    bp_estimator: BloodPressureEstimator,
    vitals: VitalsReader,
    fusion: FusionEngine,
    classifier: RiskClassifier,
    display: Box<dyn ResultDisplay>,
    sink: Box<dyn ResultSink>,
    state: DeviceState,
    frame_size: (u32, u32),
    phase: ScreeningPhase,
    cycle: u64,
    progress: Option<Sender<PhaseChange>>,
}

impl<C: Camera, S: ModelSession> ScreeningOrchestrator<C, S> {
    /// Assemble an orchestrator with default fusion, 256x256 frames and the
    /// baseline blood pressure estimator.
    #[must_use]
    pub fn new(
        capture: ImageCapture<C>,
        engine: RiskInferenceEngine<S>,
        vitals: VitalsReader,
        display: Box<dyn ResultDisplay>,
        sink: Box<dyn ResultSink>,
        state: DeviceState,
    ) -> Self {
        Self {
            capture,
            engine,
            bp_estimator: BloodPressureEstimator::default(),
            vitals,
            fusion: FusionEngine::default(),
            classifier: RiskClassifier,
            display,
            sink,
            state,
            frame_size: (256, 256),
            phase: ScreeningPhase::Idle,
            cycle: 0,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_fusion(mut self, fusion: FusionEngine) -> Self {
        self.fusion = fusion;
        self
    }

    #[must_use]
    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_size = (width, height);
        self
    }

    #[must_use]
    pub fn with_bp_estimator(mut self, estimator: BloodPressureEstimator) -> Self {
        self.bp_estimator = estimator;
        self
    }

    /// Publish every state transition on `tx`.
    #[must_use]
    pub fn with_progress(mut self, tx: Sender<PhaseChange>) -> Self {
        self.progress = Some(tx);
        self
    }

    #[must_use]
    pub fn phase(&self) -> ScreeningPhase {
        self.phase
    }

    #[must_use]
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Bring up every collaborator in device order: camera, model, cloud,
    /// display. Sensors are already up once the `VitalsReader` exists.
    ///
    /// # Errors
    /// Returns the first collaborator failure; the device must not start
    /// screening in that case. A frame size that does not match the model
    /// input is `RetinalGuardError::Config`.
    pub fn initialize(&mut self, device_id: &str) -> Result<(), RetinalGuardError> {
        self.capture.init()?;

        let shape = self
            .engine
            .input_shape()
            .ok_or(InferenceError::Uninitialized)?;
        let (width, height) = self.frame_size;
        let frame_shape = [1, height as usize, width as usize, CHANNELS];
        if shape != frame_shape {
            return Err(RetinalGuardError::Config(format!(
                "capture size {width}x{height} does not fit model input {shape:?}"
            )));
        }

        self.sink.connect(device_id)?;
        tracing::info!("Connected to cloud feed as configured device");

        self.display.init()?;
        tracing::info!("Display ready");
        Ok(())
    }

    /// Release the model session. Called when the worker stops.
    pub fn shutdown(&mut self) {
        self.engine.teardown();
    }

    /// Run one full screening cycle.
    ///
    /// # Errors
    /// Returns `CycleAborted` naming the failed step. The last known result
    /// is unchanged in that case.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CycleAborted> {
        self.cycle += 1;
        let span = tracing::info_span!("screening", cycle = self.cycle);
        let _enter = span.enter();

        let started = Instant::now();
        self.state.set_screening(true);
        let outcome = self.execute();
        self.state.set_screening(false);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(report) => {
                self.transition(ScreeningPhase::Idle);
                tracing::info!(
                    elapsed_ms,
                    tier = %report.result.tier,
                    fused_risk = report.result.fused_risk,
                    displayed = report.displayed,
                    published = report.published,
                    "Screening complete"
                );
                Ok(report)
            }
            Err(aborted) => {
                self.transition(ScreeningPhase::Aborted);
                self.state.record_abort();
                tracing::warn!(
                    elapsed_ms,
                    phase = %aborted.phase,
                    error = %aborted.error,
                    "Screening aborted"
                );
                self.transition(ScreeningPhase::Idle);
                Err(aborted)
            }
        }
    }

    fn execute(&mut self) -> Result<CycleReport, CycleAborted> {
        let (width, height) = self.frame_size;

        self.transition(ScreeningPhase::Capturing);
        let frame = self
            .capture
            .capture(width, height)
            .map_err(|e| CycleAborted::new(ScreeningPhase::Capturing, e))?;

        self.transition(ScreeningPhase::Inferring);
        let image_risk = self
            .engine
            .infer(&frame)
            .map_err(|e| CycleAborted::new(ScreeningPhase::Inferring, e))?;
        let estimated_systolic_bp = self.bp_estimator.estimate(&frame);
        tracing::debug!(image_risk, estimated_systolic_bp, "Image analysis done");
        // The frame is not needed past this point.
        drop(frame);

        self.transition(ScreeningPhase::ReadingVitals);
        let vitals = self
            .vitals
            .read()
            .map_err(|e| CycleAborted::new(ScreeningPhase::ReadingVitals, e))?;
        tracing::debug!(
            heart_rate = vitals.heart_rate,
            blood_oxygen = vitals.blood_oxygen,
            temperature = vitals.temperature,
            "Vitals read"
        );

        self.transition(ScreeningPhase::Fusing);
        let fused_risk = self.fusion.fuse(image_risk, &vitals);

        self.transition(ScreeningPhase::Classifying);
        let tier = self.classifier.classify(fused_risk);

        let assessment = RiskAssessment {
            image_risk,
            estimated_systolic_bp,
            fused_risk,
            tier,
        };
        let result = ScreeningResult::new(assessment, vitals);

        self.transition(ScreeningPhase::Reporting);
        let displayed = match self.display.show(result.fused_risk, &result.vitals, result.tier) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Display update failed; result kept locally");
                false
            }
        };
        let published = match self.sink.send(&result) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Cloud publish failed; result kept locally");
                false
            }
        };

        let result = self.state.publish(result);
        Ok(CycleReport {
            result,
            displayed,
            published,
        })
    }

    fn transition(&mut self, to: ScreeningPhase) {
        let from = self.phase;
        self.phase = to;
        tracing::debug!(cycle = self.cycle, %from, %to, "Phase transition");
        if let Some(tx) = &self.progress {
            let _ = tx.send(PhaseChange {
                cycle: self.cycle,
                from,
                to,
            });
        }
    }
}
