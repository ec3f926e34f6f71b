//! RetinalGuard device entry point.
//!
//! Brings up the camera, model, sensors, cloud feed and display, then runs
//! screening cycles on the configured interval. Remote commands are read
//! from stdin as `command [param]` lines; each response is printed as one
//! JSON line on stdout.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use ratatui::backend::CrosstermBackend;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use retinalguard::adapters::camera::SimulatedCamera;
use retinalguard::adapters::display::{LogDisplay, TerminalDisplay};
use retinalguard::adapters::feed::FeedPublisher;
use retinalguard::adapters::model::{LinearFundusModel, SignedModelRuntime};
use retinalguard::adapters::sanitize::SanitizingMakeWriter;
use retinalguard::adapters::sensors::SimulatedVitalsSensor;
use retinalguard::application::{
    CommandDispatcher, CycleEvent, DeviceState, FusionEngine, ImageCapture, RemoteCommand,
    RiskInferenceEngine, ScreeningOrchestrator, ScreeningWorker, VitalsReader, WorkerOptions,
};
use retinalguard::config::DisplayMode;
use retinalguard::ports::{ResultDisplay, ResultSink};
use retinalguard::DeviceConfig;

/// Rows reserved for the inline result panel.
const PANEL_HEIGHT: u16 = 6;

fn main() -> Result<()> {
    let config = DeviceConfig::from_env().context("loading configuration")?;
    let _log_guard = init_logging(&config)?;

    tracing::info!(
        interval_ms = config.screening_interval.as_millis() as u64,
        display = ?config.display,
        "Starting RetinalGuard..."
    );

    let state = DeviceState::new();
    // Any init failure ends the process here; no cycle runs.
    let orchestrator = build_orchestrator(&config, &state)?;

    let (events_tx, events_rx) = mpsc::channel();
    let worker = ScreeningWorker::spawn(
        orchestrator,
        WorkerOptions {
            interval: Some(config.screening_interval),
            max_cycles: config.max_cycles,
        },
        Some(events_tx),
    )?;

    spawn_command_reader(CommandDispatcher::new(worker.trigger(), state.clone()))?;

    for event in events_rx {
        match event {
            CycleEvent::Completed { cycle, source, report } => tracing::info!(
                cycle,
                %source,
                tier = %report.result.tier,
                displayed = report.displayed,
                published = report.published,
                "Cycle finished"
            ),
            CycleEvent::Aborted {
                cycle,
                source,
                phase,
                error,
            } => tracing::warn!(cycle, %source, %phase, %error, "Cycle aborted"),
        }
    }

    let cycles = worker.join()?;
    tracing::info!(
        cycles,
        completed = state.cycles_completed(),
        aborted = state.cycles_aborted(),
        "RetinalGuard shutdown complete."
    );
    Ok(())
}

/// Logging follows `RETINALGUARD_LOG_MODE` (`auto`, `file`, `stdout`, `stderr`).
///
/// Log lines would tear the inline panel, so `auto` writes to a file when
/// the panel is on an interactive terminal and to stderr otherwise. Stdout
/// stays reserved for the feed and command responses.
fn init_logging(config: &DeviceConfig) -> Result<WorkerGuard> {
    let mode = std::env::var("RETINALGUARD_LOG_MODE").unwrap_or_else(|_| "auto".to_string());
    let panel_on_tty = config.display == DisplayMode::Terminal && io::stderr().is_terminal();

    let (writer, guard) = match mode.as_str() {
        "stdout" => tracing_appender::non_blocking(io::stdout()),
        "stderr" => tracing_appender::non_blocking(io::stderr()),
        "file" => tracing_appender::non_blocking(open_log_file()?),
        _ if panel_on_tty => tracing_appender::non_blocking(open_log_file()?),
        _ => tracing_appender::non_blocking(io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    Ok(guard)
}

fn open_log_file() -> Result<std::fs::File> {
    let path =
        std::env::var("RETINALGUARD_LOG_FILE").unwrap_or_else(|_| "retinalguard.log".to_string());
    if let Some(parent) = Path::new(&path).parent() {
        // A missing directory surfaces as the open error below.
        let _ = std::fs::create_dir_all(parent);
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {path}"))
}

fn build_orchestrator(
    config: &DeviceConfig,
    state: &DeviceState,
) -> Result<ScreeningOrchestrator<SimulatedCamera, LinearFundusModel>> {
    let runtime = SignedModelRuntime::from_environment()?;
    let mut engine = RiskInferenceEngine::uninitialized();
    engine
        .initialize(&runtime, &config.model_dir)
        .with_context(|| format!("loading model from {:?}", config.model_dir))?;

    let vitals = VitalsReader::spawn(
        SimulatedVitalsSensor::new().with_jitter(),
        config.sensor_timeout,
    )
    .context("initializing vital-sign sensors")?;

    let display: Box<dyn ResultDisplay> = match config.display {
        DisplayMode::Terminal => Box::new(TerminalDisplay::inline(
            CrosstermBackend::new(io::stderr()),
            PANEL_HEIGHT,
        )?),
        DisplayMode::Log => Box::new(LogDisplay),
    };

    let sink: Box<dyn ResultSink> = match &config.feed_file {
        Some(path) => Box::new(
            FeedPublisher::append_to(path, config.feed_topic.clone())
                .with_context(|| format!("opening feed file {path:?}"))?,
        ),
        None => Box::new(FeedPublisher::stdout(config.feed_topic.clone())),
    };

    let mut orchestrator = ScreeningOrchestrator::new(
        ImageCapture::new(SimulatedCamera::new()),
        engine,
        vitals,
        display,
        sink,
        state.clone(),
    )
    .with_fusion(FusionEngine::new(config.fusion, config.clamp_fused_risk))
    .with_frame_size(config.capture_width, config.capture_height);

    orchestrator
        .initialize(&config.device_id)
        .context("initializing device")?;
    Ok(orchestrator)
}

fn spawn_command_reader(dispatcher: CommandDispatcher) -> Result<()> {
    thread::Builder::new()
        .name("remote-commands".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "Command channel closed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                let response = dispatcher.dispatch(RemoteCommand::parse_line(&line));
                let written = serde_json::to_string(&response)
                    .map_err(io::Error::from)
                    .and_then(|json| writeln!(io::stdout().lock(), "{json}"));
                if let Err(e) = written {
                    tracing::warn!(error = %e, "Failed to write command response");
                }
            }
            tracing::debug!("Command reader stopped");
        })?;
    Ok(())
}
