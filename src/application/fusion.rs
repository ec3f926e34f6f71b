//! Sensor fusion and risk classification.

use crate::domain::{RiskTier, VitalSigns};

/// Weights used to combine the image risk with the vitals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    /// Multiplier applied to the image-derived risk
    pub image_weight: f64,
    /// Heart rate strictly above which the tachycardia penalty applies (bpm)
    pub tachycardia_bpm: u32,
    /// Additive penalty for tachycardia
    pub tachycardia_penalty: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            image_weight: 0.7,
            tachycardia_bpm: 90,
            tachycardia_penalty: 0.1,
        }
    }
}

/// Combines the image-derived risk with the vital signs.
///
/// `fused = image_risk * image_weight + penalty(vitals)`.
///
/// The fused score is not clamped by default, so with non-default weights it
/// can leave [0, 1]. Enable `clamp_output` to bound it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FusionEngine {
    weights: FusionWeights,
    clamp_output: bool,
}

impl FusionEngine {
    #[must_use]
    pub fn new(weights: FusionWeights, clamp_output: bool) -> Self {
        Self {
            weights,
            clamp_output,
        }
    }

    #[must_use]
    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Fuse the image risk and the vitals into one score.
    #[must_use]
    pub fn fuse(&self, image_risk: f64, vitals: &VitalSigns) -> f64 {
        let fused = image_risk * self.weights.image_weight + self.vitals_penalty(vitals);
        if self.clamp_output {
            fused.clamp(0.0, 1.0)
        } else {
            fused
        }
    }

    fn vitals_penalty(&self, vitals: &VitalSigns) -> f64 {
        if vitals.heart_rate > self.weights.tachycardia_bpm {
            self.weights.tachycardia_penalty
        } else {
            0.0
        }
    }
}

/// Maps a fused score to a risk tier.
///
/// Comparisons are strict, so a score sitting exactly on a threshold falls
/// into the lower tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskClassifier;

impl RiskClassifier {
    /// Scores strictly above this are HIGH.
    pub const HIGH_THRESHOLD: f64 = 0.7;
    /// Scores strictly above this (and not HIGH) are MODERATE.
    pub const MODERATE_THRESHOLD: f64 = 0.4;

    #[must_use]
    pub fn classify(&self, fused_risk: f64) -> RiskTier {
        if fused_risk > Self::HIGH_THRESHOLD {
            RiskTier::High
        } else if fused_risk > Self::MODERATE_THRESHOLD {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }
}
