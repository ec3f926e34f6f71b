//! Display port: Trait for the on-device result display.

use crate::domain::{RiskTier, VitalSigns};

/// Errors raised by the display.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("Display not initialized")]
    NotInitialized,

    #[error("Display I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for the result display.
pub trait ResultDisplay: Send {
    /// Bring up the display.
    ///
    /// # Errors
    /// Returns `DisplayError` if the display cannot be initialized.
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Show a finished screening.
    ///
    /// # Errors
    /// Returns `DisplayError` if rendering fails.
    fn show(
        &mut self,
        fused_risk: f64,
        vitals: &VitalSigns,
        tier: RiskTier,
    ) -> Result<(), DisplayError>;
}
