use std::fmt;
use serde::{Deserialize, Serialize};

use super::error::DiagnosisError;

/// Label the classifier emits for "CKD present".
pub const POSITIVE_LABEL: i64 = 1;
/// Label the classifier emits for "CKD absent".
pub const NEGATIVE_LABEL: i64 = 0;
/// Index of the positive class in the probability row.
pub const POSITIVE_CLASS_INDEX: usize = 1;

/// The two mutually exclusive screening outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The classifier predicts Chronic Kidney Disease
    Likely,
    /// The classifier predicts no Chronic Kidney Disease
    NotLikely,
}

impl Verdict {
    /// Maps a classifier label to a verdict. Only 0 and 1 are valid.
    pub fn from_label(label: i64) -> Result<Self, DiagnosisError> {
        match label {
            POSITIVE_LABEL => Ok(Self::Likely),
            NEGATIVE_LABEL => Ok(Self::NotLikely),
            other => Err(DiagnosisError::InferenceFailure(format!(
                "Model returned unexpected label {} (expected {} or {})",
                other, NEGATIVE_LABEL, POSITIVE_LABEL
            ))),
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Likely)
    }

    /// Sentence shown to the user.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Likely => "The patient is likely to have Chronic Kidney Disease (CKD).",
            Self::NotLikely => "The patient is NOT likely to have Chronic Kidney Disease (CKD).",
        }
    }

    /// Follow-up advice, if any.
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            Self::Likely => Some("Please consult a doctor immediately."),
            Self::NotLikely => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Likely => write!(f, "likely CKD"),
            Self::NotLikely => write!(f, "not likely CKD"),
        }
    }
}

/// Scales a probability to a percentage rounded to two decimals.
pub fn confidence_percent(probability: f32) -> f64 {
    (f64::from(probability) * 100.0 * 100.0).round() / 100.0
}

/// Outcome of one screening.
///
/// `verdict` and `confidence` come from separate classifier outputs. A
/// confidence above 50 does not imply a positive verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub verdict: Verdict,
    /// Positive-class probability as a percentage in [0, 100], two decimals
    pub confidence: f64,
    /// Positive-class probability as returned by the model
    pub probability: f32,
    /// Label as returned by the model
    pub label: i64,
}

impl DiagnosisResult {
    /// Interprets a label and a two-class probability row.
    ///
    /// # Errors
    /// - `InferenceFailure` if the label is not 0 or 1
    /// - `InferenceFailure` if the row does not hold exactly two probabilities
    /// - `InferenceFailure` if the positive probability is not in [0, 1]
    pub fn from_model_output(label: i64, probabilities: &[f32]) -> Result<Self, DiagnosisError> {
        let verdict = Verdict::from_label(label)?;

        if probabilities.len() != 2 {
            return Err(DiagnosisError::InferenceFailure(format!(
                "Expected 2 class probabilities, got {}",
                probabilities.len()
            )));
        }
        let probability = probabilities[POSITIVE_CLASS_INDEX];
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(DiagnosisError::InferenceFailure(format!(
                "Positive class probability out of range: {}",
                probability
            )));
        }

        Ok(Self {
            verdict,
            confidence: confidence_percent(probability),
            probability,
            label,
        })
    }

    /// "Confidence Level: 87.50%"
    pub fn confidence_line(&self) -> String {
        format!("Confidence Level: {:.2}%", self.confidence)
    }
}

impl fmt::Display for DiagnosisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.confidence_line(), self.verdict.message())?;
        if let Some(advice) = self.verdict.advice() {
            write!(f, "\n{}", advice)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_mapping() {
        assert_eq!(Verdict::from_label(1).unwrap(), Verdict::Likely);
        assert_eq!(Verdict::from_label(0).unwrap(), Verdict::NotLikely);
        assert!(matches!(Verdict::from_label(2), Err(DiagnosisError::InferenceFailure(_))));
        assert!(matches!(Verdict::from_label(-1), Err(DiagnosisError::InferenceFailure(_))));
    }

    #[test]
    fn test_confidence_rounding() {
        assert_eq!(confidence_percent(0.0), 0.0);
        assert_eq!(confidence_percent(1.0), 100.0);
        assert_eq!(confidence_percent(0.5), 50.0);
        assert_eq!(confidence_percent(0.123456), 12.35);
        assert_eq!(confidence_percent(0.87654), 87.65);
    }

    #[test]
    fn test_label_and_probability_are_independent() {
        let result = DiagnosisResult::from_model_output(0, &[0.2, 0.8]).unwrap();
        assert_eq!(result.verdict, Verdict::NotLikely);
        assert_eq!(result.confidence, 80.0);

        let result = DiagnosisResult::from_model_output(1, &[0.9, 0.1]).unwrap();
        assert_eq!(result.verdict, Verdict::Likely);
        assert_eq!(result.confidence, 10.0);
    }

    #[test]
    fn test_malformed_probabilities() {
        assert!(DiagnosisResult::from_model_output(1, &[0.5]).is_err());
        assert!(DiagnosisResult::from_model_output(1, &[0.1, 0.2, 0.7]).is_err());
        assert!(DiagnosisResult::from_model_output(1, &[0.5, f32::NAN]).is_err());
        assert!(DiagnosisResult::from_model_output(1, &[-0.5, 1.5]).is_err());
    }

    #[test]
    fn test_display() {
        let result = DiagnosisResult::from_model_output(1, &[0.125, 0.875]).unwrap();
        let text = result.to_string();
        assert!(text.starts_with("Confidence Level: 87.50%"));
        assert!(text.contains("likely to have Chronic Kidney Disease"));
        assert!(text.contains("consult a doctor"));

        let result = DiagnosisResult::from_model_output(0, &[0.75, 0.25]).unwrap();
        assert!(result.to_string().contains("NOT likely"));
        assert_eq!(result.verdict.advice(), None);
    }
}
