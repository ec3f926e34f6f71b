//! Remote command handling.
//!
//! Commands arrive as `(command, param)` pairs. `start_screening` asks the
//! worker for a cycle; the read-only commands answer from `DeviceState` and
//! never trigger one.

use std::sync::Arc;

use serde::Serialize;

use super::state::DeviceState;
use super::worker::{ScreenTrigger, TriggerOutcome, TriggerSource};
use crate::domain::{ClinicalReport, ScreeningResult};

/// Device activity as reported by `get_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceActivity {
    Ready,
    Screening,
}

/// Answer to `get_status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: DeviceActivity,
    pub cycles_completed: u64,
    pub cycles_aborted: u64,
    /// Absent until the first cycle completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<Arc<ScreeningResult>>,
}

/// Response to one remote command.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum CommandResponse {
    Accepted { outcome: TriggerOutcome },
    Status(StatusReport),
    Report(ClinicalReport),
    NoResultYet,
    Unknown { command: String },
    Unavailable { reason: String },
}

/// A parsed remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    StartScreening,
    GetStatus,
    GetReport { patient_id: Option<String> },
    Unknown(String),
}

impl RemoteCommand {
    /// Parse a command name and its parameter. Names are matched exactly.
    #[must_use]
    pub fn parse(command: &str, param: &str) -> Self {
        match command {
            "start_screening" => Self::StartScreening,
            "get_status" => Self::GetStatus,
            "get_report" => {
                let param = param.trim();
                Self::GetReport {
                    patient_id: (!param.is_empty()).then(|| param.to_string()),
                }
            }
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Split a `command [param]` line.
    #[must_use]
    pub fn parse_line(line: &str) -> Self {
        let line = line.trim();
        let (command, param) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        Self::parse(command, param)
    }
}

/// Routes remote commands to the worker and the device state.
#[derive(Clone)]
pub struct CommandDispatcher {
    trigger: ScreenTrigger,
    state: DeviceState,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(trigger: ScreenTrigger, state: DeviceState) -> Self {
        Self { trigger, state }
    }

    /// Handle one `(command, param)` pair.
    pub fn handle(&self, command: &str, param: &str) -> CommandResponse {
        self.dispatch(RemoteCommand::parse(command, param))
    }

    pub fn dispatch(&self, command: RemoteCommand) -> CommandResponse {
        match command {
            RemoteCommand::StartScreening => match self.trigger.request(TriggerSource::Remote) {
                Ok(outcome) => {
                    tracing::info!(?outcome, "Remote screening request");
                    CommandResponse::Accepted { outcome }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Remote screening request rejected");
                    CommandResponse::Unavailable {
                        reason: e.to_string(),
                    }
                }
            },
            RemoteCommand::GetStatus => CommandResponse::Status(self.status()),
            RemoteCommand::GetReport { patient_id } => match self.state.latest() {
                Some(result) => CommandResponse::Report(ClinicalReport::from_result(
                    &result,
                    patient_id.as_deref(),
                )),
                None => CommandResponse::NoResultYet,
            },
            RemoteCommand::Unknown(command) => {
                tracing::warn!(%command, "Unknown remote command");
                CommandResponse::Unknown { command }
            }
        }
    }

    fn status(&self) -> StatusReport {
        let state = if self.state.is_screening() {
            DeviceActivity::Screening
        } else {
            DeviceActivity::Ready
        };
        StatusReport {
            state,
            cycles_completed: self.state.cycles_completed(),
            cycles_aborted: self.state.cycles_aborted(),
            last_result: self.state.latest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{
        ImageCapture, RiskInferenceEngine, ScreeningOrchestrator, ScreeningWorker, VitalsReader,
        WorkerOptions,
    };
    use crate::domain::{RiskAssessment, RiskTier, VitalSigns};
    use crate::testing::{FakeCamera, FakeDisplay, FakeSensor, FakeSession, FakeSink, Recorder};
    use std::time::{Duration, Instant};

    fn spawn_device(
        state: &DeviceState,
    ) -> (CommandDispatcher, crate::application::ScreeningWorkerHandle) {
        let recorder = Recorder::default();
        let vitals =
            VitalsReader::spawn(FakeSensor::steady(), Duration::from_millis(500)).expect("sensor");
        let mut orch = ScreeningOrchestrator::new(
            ImageCapture::new(FakeCamera::zeros(recorder.clone())),
            RiskInferenceEngine::with_session(FakeSession::returning(0.2)),
            vitals,
            Box::new(FakeDisplay::new(recorder.clone())),
            Box::new(FakeSink::new(recorder)),
            state.clone(),
        );
        orch.initialize("cmd-test").expect("init");
        let handle =
            ScreeningWorker::spawn(orch, WorkerOptions::default(), None).expect("spawn worker");
        (CommandDispatcher::new(handle.trigger(), state.clone()), handle)
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            RemoteCommand::parse_line("start_screening"),
            RemoteCommand::StartScreening
        );
        assert_eq!(
            RemoteCommand::parse_line("  get_report  P-0042 "),
            RemoteCommand::GetReport {
                patient_id: Some("P-0042".to_string())
            }
        );
        assert_eq!(
            RemoteCommand::parse_line("get_report"),
            RemoteCommand::GetReport { patient_id: None }
        );
        assert_eq!(
            RemoteCommand::parse_line("reboot now"),
            RemoteCommand::Unknown("reboot".to_string())
        );
    }

    #[test]
    fn test_status_before_first_result() {
        let state = DeviceState::new();
        let (dispatcher, handle) = spawn_device(&state);

        let json = serde_json::to_value(dispatcher.handle("get_status", "")).expect("json");
        assert_eq!(json["response"], "status");
        assert_eq!(json["state"], "READY");
        assert!(json.get("last_result").is_none());
        assert_eq!(state.cycles_completed(), 0, "status must not trigger a cycle");

        assert!(matches!(
            dispatcher.handle("get_report", ""),
            CommandResponse::NoResultYet
        ));

        handle.shutdown();
        handle.join().expect("join");
    }

    #[test]
    fn test_start_screening_runs_cycle() {
        let state = DeviceState::new();
        let (dispatcher, handle) = spawn_device(&state);

        assert!(matches!(
            dispatcher.handle("start_screening", ""),
            CommandResponse::Accepted { .. }
        ));

        let deadline = Instant::now() + Duration::from_secs(2);
        while state.cycles_completed() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let json = serde_json::to_value(dispatcher.handle("get_status", "")).expect("json");
        assert_eq!(json["last_result"]["tier"], "LOW");
        assert_eq!(json["cycles_completed"], 1);

        match dispatcher.handle("get_report", "P-7") {
            CommandResponse::Report(report) => {
                assert_eq!(report.patient_id.as_deref(), Some("P-7"));
                assert_eq!(report.followup_days, 365);
            }
            other => panic!("unexpected response: {other:?}"),
        }

        handle.shutdown();
        handle.join().expect("join");
    }

    #[test]
    fn test_unknown_and_stopped_worker() {
        let state = DeviceState::new();
        let (dispatcher, handle) = spawn_device(&state);
        handle.shutdown();
        handle.join().expect("join");

        let json = serde_json::to_value(dispatcher.handle("self_destruct", "")).expect("json");
        assert_eq!(json["response"], "unknown");
        assert_eq!(json["command"], "self_destruct");

        assert!(matches!(
            dispatcher.handle("start_screening", ""),
            CommandResponse::Unavailable { .. }
        ));

        // Read-only commands still answer.
        state.publish(ScreeningResult::new(
            RiskAssessment {
                image_risk: 0.9,
                estimated_systolic_bp: 120.0,
                fused_risk: 0.9,
                tier: RiskTier::High,
            },
            VitalSigns::new(80, 97.0, 36.8),
        ));
        match dispatcher.handle("get_report", "") {
            CommandResponse::Report(report) => assert_eq!(report.followup_days, 7),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
