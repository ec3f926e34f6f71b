//! Adapters layer: Concrete implementations of ports.
//!
//! - `camera`: simulated fundus camera
//! - `sensors`: simulated PPG and temperature sensors
//! - `model`: signed fundus model runtime
//! - `feed`: JSON-line cloud feed publisher
//! - `display`: ratatui panel and log-only display
//! - `sanitize`: redaction for log output

pub mod camera;
pub mod display;
pub mod feed;
pub mod model;
pub mod sanitize;
pub mod sensors;
