//! Screening result types.
//!
//! Represents the output of one fused retinal + vital-sign screening cycle.

use serde::{Deserialize, Serialize};

use super::VitalSigns;

/// Discrete cardiovascular risk tier derived from the fused score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    /// Low cardiovascular risk
    Low,
    /// Moderate risk, follow-up recommended
    Moderate,
    /// High risk, urgent follow-up recommended
    High,
}

impl RiskTier {
    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - No significant indicators",
            Self::Moderate => "Moderate risk - Follow-up recommended",
            Self::High => "High risk - Cardiology consultation advised",
        }
    }

    /// Get the associated display color (RGB).
    #[must_use]
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            Self::Low => (16, 185, 129),      // Emerald (#10B981)
            Self::Moderate => (251, 191, 36), // Amber (#FBBF24)
            Self::High => (244, 63, 94),      // Rose (#F43F5E)
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

/// Intermediate values computed during a cycle.
///
/// `fused_risk` and `tier` only exist once both the image risk and the
/// vitals are available, so the assessment is built after fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Image-derived CVD risk (0.0 to 1.0)
    pub image_risk: f64,

    /// Estimated systolic blood pressure in mmHg
    pub estimated_systolic_bp: f64,

    /// Fused risk score (not re-clamped unless configured)
    pub fused_risk: f64,

    /// Tier derived from `fused_risk`
    pub tier: RiskTier,
}

/// Final record of a successfully completed screening cycle.
///
/// This is what gets displayed, published to the cloud feed and kept as
/// the last known result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    /// Unique identifier
    pub id: String,

    /// Final fused risk score
    pub fused_risk: f64,

    /// Raw image-derived risk before fusion
    pub image_risk: f64,

    /// Estimated systolic blood pressure in mmHg
    pub estimated_systolic_bp: f64,

    /// Full vitals snapshot used for fusion
    pub vitals: VitalSigns,

    /// Heart rate in bpm (flattened for feed consumers)
    pub heart_rate: u32,

    /// SpO2 in percent (flattened for feed consumers)
    pub blood_oxygen: f64,

    /// Temperature in Celsius (flattened for feed consumers)
    pub temperature: f64,

    /// Completion time of the cycle
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Risk tier
    pub tier: RiskTier,
}

impl ScreeningResult {
    /// Build the record from a finished assessment and its vitals.
    #[must_use]
    pub fn new(assessment: RiskAssessment, vitals: VitalSigns) -> Self {
        Self {
            id: uuid_v4(),
            fused_risk: assessment.fused_risk,
            image_risk: assessment.image_risk,
            estimated_systolic_bp: assessment.estimated_systolic_bp,
            heart_rate: vitals.heart_rate,
            blood_oxygen: vitals.blood_oxygen,
            temperature: vitals.temperature,
            vitals,
            timestamp: chrono::Utc::now(),
            tier: assessment.tier,
        }
    }

    /// Risk as a percentage string, e.g. `"14.0%"`.
    #[must_use]
    pub fn risk_percentage(&self) -> String {
        format!("{:.1}%", self.fused_risk * 100.0)
    }
}

/// Generate a random UUID v4 string.
fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
