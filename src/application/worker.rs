//! Background screening worker.
//!
//! One thread owns the orchestrator and runs cycles one at a time. Triggers
//! come from the periodic timer and from remote commands. While a cycle is
//! running at most one further request is held; any more are coalesced into
//! it. Cycles therefore never overlap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::orchestrator::{CycleReport, ScreeningOrchestrator, ScreeningPhase};
use crate::ports::{Camera, ModelSession};
use crate::RetinalGuardError;

/// What asked for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Timer,
    Remote,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timer => f.write_str("timer"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// How a trigger request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// A cycle will run for this request
    Queued,
    /// A cycle was already pending; this request folds into it
    Coalesced,
}

/// Cycle outcomes reported by the worker.
#[derive(Debug, Clone)]
pub enum CycleEvent {
    Completed {
        cycle: u64,
        source: TriggerSource,
        report: CycleReport,
    },
    Aborted {
        cycle: u64,
        source: TriggerSource,
        phase: ScreeningPhase,
        error: String,
    },
}

/// Worker scheduling options.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerOptions {
    /// Idle time after each cycle before the timer fires again; `None` runs
    /// on request only
    pub interval: Option<Duration>,
    /// Stop after this many cycles
    pub max_cycles: Option<u64>,
}

enum Message {
    Run(TriggerSource),
    Stop,
}

/// Cloneable handle for requesting screening cycles.
#[derive(Clone)]
pub struct ScreenTrigger {
    tx: SyncSender<Message>,
}

impl ScreenTrigger {
    /// Ask for a cycle.
    ///
    /// # Errors
    /// Returns `RetinalGuardError::WorkerStopped` once the worker has exited.
    pub fn request(&self, source: TriggerSource) -> Result<TriggerOutcome, RetinalGuardError> {
        match self.tx.try_send(Message::Run(source)) {
            Ok(()) => Ok(TriggerOutcome::Queued),
            Err(TrySendError::Full(_)) => {
                tracing::debug!(%source, "Cycle already pending; request coalesced");
                Ok(TriggerOutcome::Coalesced)
            }
            Err(TrySendError::Disconnected(_)) => Err(RetinalGuardError::WorkerStopped),
        }
    }
}

/// Handle to a running screening worker.
pub struct ScreeningWorkerHandle {
    trigger: ScreenTrigger,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl ScreeningWorkerHandle {
    #[must_use]
    pub fn trigger(&self) -> ScreenTrigger {
        self.trigger.clone()
    }

    /// Ask the worker to stop after the current cycle. A pending request is
    /// dropped.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.trigger.tx.try_send(Message::Stop);
    }

    /// Wait for the worker to exit.
    ///
    /// # Returns
    /// Number of cycles run (completed or aborted).
    ///
    /// # Errors
    /// Returns `RetinalGuardError::WorkerStopped` if the worker panicked.
    pub fn join(self) -> Result<u64, RetinalGuardError> {
        self.handle
            .join()
            .map_err(|_| RetinalGuardError::WorkerStopped)
    }
}

/// Spawns the screening worker thread.
pub struct ScreeningWorker;

impl ScreeningWorker {
    /// Move `orchestrator` onto a new worker thread.
    ///
    /// With an interval the first cycle starts immediately and each later
    /// timer cycle starts `interval` after the previous cycle ended.
    ///
    /// # Errors
    /// Returns `RetinalGuardError::Io` if the thread cannot be spawned.
    pub fn spawn<C, S>(
        orchestrator: ScreeningOrchestrator<C, S>,
        options: WorkerOptions,
        events: Option<Sender<CycleEvent>>,
    ) -> Result<ScreeningWorkerHandle, RetinalGuardError>
    where
        C: Camera + 'static,
        S: ModelSession + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("screening-worker".to_string())
                .spawn(move || Self::run(orchestrator, options, &rx, &stop, events.as_ref()))?
        };

        Ok(ScreeningWorkerHandle {
            trigger: ScreenTrigger { tx },
            stop,
            handle,
        })
    }

    fn run<C: Camera, S: ModelSession>(
        mut orchestrator: ScreeningOrchestrator<C, S>,
        options: WorkerOptions,
        rx: &Receiver<Message>,
        stop: &AtomicBool,
        events: Option<&Sender<CycleEvent>>,
    ) -> u64 {
        tracing::info!(
            interval_ms = options.interval.map(|d| d.as_millis() as u64),
            max_cycles = options.max_cycles,
            "Screening worker started"
        );

        let mut next_tick = options.interval.map(|_| Instant::now());
        let mut cycles = 0u64;

        loop {
            if stop.load(Ordering::Acquire) {
                break;
            }

            let message = match next_tick {
                Some(at) => match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => Message::Run(TriggerSource::Timer),
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(message) => message,
                    Err(_) => break,
                },
            };

            let source = match message {
                Message::Stop => break,
                Message::Run(source) => source,
            };
            if stop.load(Ordering::Acquire) {
                break;
            }

            cycles += 1;
            let event = match orchestrator.run_cycle() {
                Ok(report) => CycleEvent::Completed {
                    cycle: cycles,
                    source,
                    report,
                },
                Err(aborted) => CycleEvent::Aborted {
                    cycle: cycles,
                    source,
                    phase: aborted.phase,
                    error: aborted.error.to_string(),
                },
            };
            // The interval is idle time after a cycle, whatever triggered it.
            next_tick = options.interval.map(|interval| Instant::now() + interval);
            if let Some(tx) = events {
                let _ = tx.send(event);
            }

            if options.max_cycles.is_some_and(|max| cycles >= max) {
                tracing::info!(cycles, "Cycle limit reached");
                break;
            }
        }

        orchestrator.shutdown();
        tracing::info!(cycles, "Screening worker stopped");
        cycles
    }
}
