use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::error::DiagnosisError;

/// Number of features the classifier was trained on.
pub const NUM_FEATURES: usize = 8;

/// The accepted range and input granularity of one lab value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDomain {
    /// Field name as used in feature order
    pub name: &'static str,
    /// Label shown by the input-collection layer
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    /// Increment used by the input-collection layer
    pub step: f64,
}

impl FeatureDomain {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Clamps `value` into the domain. NaN maps to the minimum.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

/// Domains in feature order. Hypertension is binary and encoded as 0/1.
pub const FEATURE_DOMAINS: [FeatureDomain; NUM_FEATURES] = [
    FeatureDomain { name: "specific_gravity", label: "Specific Gravity (Sg)", min: 1.0, max: 1.05, step: 0.01 },
    FeatureDomain { name: "albumin", label: "Albumin (Al)", min: 0.0, max: 5.0, step: 0.1 },
    FeatureDomain { name: "blood_urea", label: "Blood Urea (Bu)", min: 1.5, max: 391.0, step: 1.0 },
    FeatureDomain { name: "serum_creatinine", label: "Serum Creatinine (Sc)", min: 0.4, max: 76.0, step: 0.1 },
    FeatureDomain { name: "sodium", label: "Sodium (Sod)", min: 4.5, max: 163.0, step: 1.0 },
    FeatureDomain { name: "potassium", label: "Potassium (Pot)", min: 2.5, max: 47.0, step: 0.1 },
    FeatureDomain { name: "hemoglobin", label: "Hemoglobin (Hemo)", min: 3.1, max: 17.8, step: 0.1 },
    FeatureDomain { name: "hypertension", label: "Hypertension (Htn)", min: 0.0, max: 1.0, step: 1.0 },
];

/// Returns the feature names in the order the classifier expects.
pub fn feature_names() -> Vec<&'static str> {
    FEATURE_DOMAINS.iter().map(|d| d.name).collect()
}

/// Eight patient lab values for a single screening.
///
/// Field order matches the column order the classifier was trained on; see
/// [`DiagnosisRequest::to_features`].
///
/// ```
/// use renalguard::DiagnosisRequest;
///
/// let request = DiagnosisRequest {
///     specific_gravity: 1.02,
///     albumin: 1.0,
///     blood_urea: 40.0,
///     serum_creatinine: 1.2,
///     sodium: 140.0,
///     potassium: 4.5,
///     hemoglobin: 13.5,
///     hypertension: false,
/// };
/// assert!(request.validate().is_ok());
/// assert_eq!(request.to_features()[7], 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    pub specific_gravity: f64,
    pub albumin: f64,
    pub blood_urea: f64,
    pub serum_creatinine: f64,
    pub sodium: f64,
    pub potassium: f64,
    pub hemoglobin: f64,
    pub hypertension: bool,
}

impl DiagnosisRequest {
    /// The seven real-valued fields in feature order.
    fn measurements(&self) -> [f64; NUM_FEATURES - 1] {
        [
            self.specific_gravity,
            self.albumin,
            self.blood_urea,
            self.serum_creatinine,
            self.sodium,
            self.potassium,
            self.hemoglobin,
        ]
    }

    /// Encodes the request as a feature vector:
    /// `[sg, al, bu, sc, sod, pot, hemo, htn]` with hypertension as 1.0 or 0.0.
    pub fn to_features(&self) -> [f32; NUM_FEATURES] {
        let mut features = [0.0f32; NUM_FEATURES];
        for (slot, value) in features.iter_mut().zip(self.measurements()) {
            *slot = value as f32;
        }
        features[NUM_FEATURES - 1] = if self.hypertension { 1.0 } else { 0.0 };
        features
    }

    /// Single-row matrix of shape `[1, 8]` suitable for model input.
    pub fn to_feature_matrix(&self) -> Result<Array2<f32>, DiagnosisError> {
        Array2::from_shape_vec((1, NUM_FEATURES), self.to_features().to_vec())
            .map_err(|e| DiagnosisError::InferenceFailure(format!("Failed to create feature matrix: {}", e)))
    }

    /// Checks every real-valued field against its domain.
    ///
    /// This belongs to the input-collection layer; the diagnosis service
    /// itself does not call it.
    ///
    /// # Errors
    /// - `ValidationError` naming the first field outside its domain
    pub fn validate(&self) -> Result<(), DiagnosisError> {
        for (domain, value) in FEATURE_DOMAINS.iter().zip(self.measurements()) {
            if !domain.contains(value) {
                return Err(DiagnosisError::ValidationError(format!(
                    "{} must be between {} and {}, got {}",
                    domain.label, domain.min, domain.max, value
                )));
            }
        }
        Ok(())
    }

    /// Returns a copy with every real-valued field clamped to its domain.
    pub fn clamped(&self) -> Self {
        let [sg, al, bu, sc, sod, pot, hemo] = self.measurements();
        let d = &FEATURE_DOMAINS;
        Self {
            specific_gravity: d[0].clamp(sg),
            albumin: d[1].clamp(al),
            blood_urea: d[2].clamp(bu),
            serum_creatinine: d[3].clamp(sc),
            sodium: d[4].clamp(sod),
            potassium: d[5].clamp(pot),
            hemoglobin: d[6].clamp(hemo),
            hypertension: self.hypertension,
        }
    }

    /// Request with every real-valued field at its domain minimum.
    pub fn minimum() -> Self {
        let d = &FEATURE_DOMAINS;
        Self {
            specific_gravity: d[0].min,
            albumin: d[1].min,
            blood_urea: d[2].min,
            serum_creatinine: d[3].min,
            sodium: d[4].min,
            potassium: d[5].min,
            hemoglobin: d[6].min,
            hypertension: false,
        }
    }
}

impl Default for DiagnosisRequest {
    /// Domain minimums, matching the initial state of the input form.
    fn default() -> Self {
        Self::minimum()
    }
}
