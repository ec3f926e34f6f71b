//! Domain layer: Core screening types.
//!
//! Pure data types with no knowledge of hardware, model runtimes or transports.

mod image;
mod report;
mod screening;
mod vitals;

pub use image::{PixelBuffer, CHANNELS};
pub use report::{followup_days, ClinicalReport, ReportVitals, Urgency};
pub use screening::{RiskAssessment, RiskTier, ScreeningResult};
pub use vitals::VitalSigns;
