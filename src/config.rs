//! Device configuration.
//!
//! Every field has a device default and can be overridden with a
//! `RETINALGUARD_*` environment variable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::FusionWeights;
use crate::RetinalGuardError;

const ENV_PREFIX: &str = "RETINALGUARD_";

/// Where finished screenings are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Inline ratatui panel on the terminal
    Terminal,
    /// Structured log event only
    Log,
}

impl FromStr for DisplayMode {
    type Err = RetinalGuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminal" => Ok(Self::Terminal),
            "log" => Ok(Self::Log),
            other => Err(RetinalGuardError::Config(format!(
                "DISPLAY must be 'terminal' or 'log', got '{other}'"
            ))),
        }
    }
}

/// Runtime configuration of the screening device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Identity used when connecting to the cloud broker
    pub device_id: String,
    /// Directory holding the signed fundus model
    pub model_dir: PathBuf,
    /// Capture width in pixels
    pub capture_width: u32,
    /// Capture height in pixels
    pub capture_height: u32,
    /// Idle delay between periodic screenings
    pub screening_interval: Duration,
    /// Upper bound on a vitals read
    pub sensor_timeout: Duration,
    /// Fusion weights and tachycardia penalty
    pub fusion: FusionWeights,
    /// Clamp the fused score into [0, 1] (off by default)
    pub clamp_fused_risk: bool,
    /// Feed topic results are published on
    pub feed_topic: String,
    /// Append published payloads to this file instead of stdout
    pub feed_file: Option<PathBuf>,
    /// Stop after this many cycles (unbounded when `None`)
    pub max_cycles: Option<u64>,
    /// Display backend
    pub display: DisplayMode,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: "retinalguard-dev".to_string(),
            model_dir: PathBuf::from("models"),
            capture_width: 256,
            capture_height: 256,
            screening_interval: Duration::from_millis(5_000),
            sensor_timeout: Duration::from_millis(2_000),
            fusion: FusionWeights::default(),
            clamp_fused_risk: false,
            feed_topic: "retinalguard/feeds".to_string(),
            feed_file: None,
            max_cycles: None,
            display: DisplayMode::Terminal,
        }
    }
}

impl DeviceConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    /// Returns `RetinalGuardError::Config` if a variable is malformed or out of range.
    pub fn from_env() -> Result<Self, RetinalGuardError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Keys are the full variable names (`RETINALGUARD_DEVICE_ID`, ...).
    ///
    /// # Errors
    /// Returns `RetinalGuardError::Config` if a value is malformed or out of range.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RetinalGuardError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Self::default();

        if let Some(v) = get("DEVICE_ID") {
            cfg.device_id = v;
        }
        if let Some(v) = get("MODEL_DIR") {
            cfg.model_dir = PathBuf::from(v);
        }
        if let Some(v) = get("CAPTURE_WIDTH") {
            cfg.capture_width = parse("CAPTURE_WIDTH", &v)?;
        }
        if let Some(v) = get("CAPTURE_HEIGHT") {
            cfg.capture_height = parse("CAPTURE_HEIGHT", &v)?;
        }
        if let Some(v) = get("SCREENING_INTERVAL_MS") {
            cfg.screening_interval = Duration::from_millis(parse("SCREENING_INTERVAL_MS", &v)?);
        }
        if let Some(v) = get("SENSOR_TIMEOUT_MS") {
            cfg.sensor_timeout = Duration::from_millis(parse("SENSOR_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("FUSION_IMAGE_WEIGHT") {
            cfg.fusion.image_weight = parse("FUSION_IMAGE_WEIGHT", &v)?;
        }
        if let Some(v) = get("TACHYCARDIA_BPM") {
            cfg.fusion.tachycardia_bpm = parse("TACHYCARDIA_BPM", &v)?;
        }
        if let Some(v) = get("TACHYCARDIA_PENALTY") {
            cfg.fusion.tachycardia_penalty = parse("TACHYCARDIA_PENALTY", &v)?;
        }
        if let Some(v) = get("CLAMP_FUSED_RISK") {
            cfg.clamp_fused_risk = parse_bool("CLAMP_FUSED_RISK", &v)?;
        }
        if let Some(v) = get("FEED_TOPIC") {
            cfg.feed_topic = v;
        }
        if let Some(v) = get("FEED_FILE") {
            cfg.feed_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MAX_CYCLES") {
            cfg.max_cycles = Some(parse("MAX_CYCLES", &v)?);
        }
        if let Some(v) = get("DISPLAY") {
            cfg.display = v.parse()?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `RetinalGuardError::Config` describing the first violation.
    pub fn validate(&self) -> Result<(), RetinalGuardError> {
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(RetinalGuardError::Config(format!(
                "capture dimensions must be > 0, got {}x{}",
                self.capture_width, self.capture_height
            )));
        }
        if self.sensor_timeout.is_zero() {
            return Err(RetinalGuardError::Config(
                "SENSOR_TIMEOUT_MS must be > 0".to_string(),
            ));
        }
        if !self.fusion.image_weight.is_finite() || !self.fusion.tachycardia_penalty.is_finite() {
            return Err(RetinalGuardError::Config(
                "fusion weights must be finite".to_string(),
            ));
        }
        if self.device_id.is_empty() {
            return Err(RetinalGuardError::Config("DEVICE_ID is empty".to_string()));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(name: &str, value: &str) -> Result<T, RetinalGuardError> {
    value.parse::<T>().map_err(|_| {
        RetinalGuardError::Config(format!("{ENV_PREFIX}{name} has invalid value '{value}'"))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, RetinalGuardError> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
        _ => Err(RetinalGuardError::Config(format!(
            "{ENV_PREFIX}{name} must be a boolean, got '{value}'"
        ))),
    }
}
