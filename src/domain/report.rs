//! Human-readable clinical report built from a screening result.
//!
//! The report is what the clinic dashboard consumes: urgency, follow-up
//! interval, lay explanation and concrete recommendations.

use serde::{Deserialize, Serialize};

use super::{RiskTier, ScreeningResult};

/// Heart rate above which caffeine/stress advice is added (bpm).
const ELEVATED_HEART_RATE_BPM: u32 = 100;

/// Temperature above which a fever note is added (Celsius).
const FEVER_TEMPERATURE_C: f64 = 37.5;

/// How quickly the patient should be seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    Urgent,
    Standard,
    Routine,
}

impl From<RiskTier> for Urgency {
    fn from(tier: RiskTier) -> Self {
        match tier {
            RiskTier::High => Self::Urgent,
            RiskTier::Moderate => Self::Standard,
            RiskTier::Low => Self::Routine,
        }
    }
}

/// Vital signs block of the report, with units in the field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportVitals {
    pub heart_rate_bpm: u32,
    pub blood_oxygen_percent: f64,
    pub temperature_celsius: f64,
    pub systolic_bp_mmhg: f64,
}

/// Clinical report for one screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalReport {
    pub patient_id: Option<String>,
    pub screening_id: String,
    pub screening_timestamp: chrono::DateTime<chrono::Utc>,
    pub risk_level: RiskTier,
    pub cvd_risk_score: f64,
    pub risk_percentage: String,
    pub urgency: Urgency,
    pub vital_signs: ReportVitals,
    pub clinical_explanation: String,
    pub recommendations: Vec<String>,
    pub followup_days: u32,
}

impl ClinicalReport {
    /// Build a report for `result`, optionally tagged with a patient id.
    #[must_use]
    pub fn from_result(result: &ScreeningResult, patient_id: Option<&str>) -> Self {
        Self {
            patient_id: patient_id.map(str::to_string),
            screening_id: result.id.clone(),
            screening_timestamp: result.timestamp,
            risk_level: result.tier,
            cvd_risk_score: result.fused_risk,
            risk_percentage: result.risk_percentage(),
            urgency: Urgency::from(result.tier),
            vital_signs: ReportVitals {
                heart_rate_bpm: result.heart_rate,
                blood_oxygen_percent: result.blood_oxygen,
                temperature_celsius: result.temperature,
                systolic_bp_mmhg: result.estimated_systolic_bp,
            },
            clinical_explanation: clinical_explanation(result.tier).to_string(),
            recommendations: recommendations(result),
            followup_days: followup_days(result.tier),
        }
    }
}

/// Days until the recommended follow-up.
#[must_use]
pub fn followup_days(tier: RiskTier) -> u32 {
    match tier {
        RiskTier::High => 7,
        RiskTier::Moderate => 28,
        RiskTier::Low => 365,
    }
}

fn clinical_explanation(tier: RiskTier) -> &'static str {
    match tier {
        RiskTier::High => {
            "Your retinal images show signs associated with cardiovascular disease risk. \
             Blood vessels in the eye show changes that correlate with heart and blood \
             pressure problems. This does not mean you definitely have heart disease, but \
             it indicates a higher risk. We recommend urgent follow-up with a cardiologist \
             for further testing."
        }
        RiskTier::Moderate => {
            "Your screening shows moderate cardiovascular risk. While not urgent, we \
             recommend lifestyle modifications and follow-up with a doctor within 4 weeks. \
             Regular exercise, healthy diet, and stress management can significantly \
             reduce your risk."
        }
        RiskTier::Low => {
            "Your screening indicates low cardiovascular risk. Continue your current \
             healthy lifestyle habits. Regular exercise, balanced diet, and annual health \
             checkups help maintain good cardiovascular health."
        }
    }
}

fn recommendations(result: &ScreeningResult) -> Vec<String> {
    let base: &[&str] = match result.tier {
        RiskTier::High => &[
            "Consult a cardiologist within 1 week",
            "Schedule ECG and echocardiography",
            "Reduce sodium intake to <2300mg/day",
            "Increase physical activity: 30min/day moderate exercise",
            "Monitor blood pressure daily",
            "Consider blood pressure medication if not on one",
        ],
        RiskTier::Moderate => &[
            "Schedule cardiology appointment within 4 weeks",
            "Monitor blood pressure 2-3 times/week",
            "Maintain healthy diet (Mediterranean diet recommended)",
            "Exercise 30 minutes daily, 5 days/week",
            "Manage stress through meditation or yoga",
            "Avoid smoking and excessive alcohol",
        ],
        RiskTier::Low => &[
            "Maintain current lifestyle habits",
            "Continue regular exercise and healthy diet",
            "Recheck cardiovascular screening in 12 months",
            "Monitor blood pressure quarterly",
            "Annual health checkup recommended",
        ],
    };

    let mut out: Vec<String> = base.iter().map(|s| (*s).to_string()).collect();

    if result.heart_rate > ELEVATED_HEART_RATE_BPM {
        out.push("Heart rate elevated; reduce caffeine and stress".to_string());
    }
    if result.temperature > FEVER_TEMPERATURE_C {
        out.push("Slight fever detected; consult physician".to_string());
    }

    out
}
