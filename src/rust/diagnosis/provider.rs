use std::fmt::Debug;
use ndarray::ArrayView2;

use super::error::DiagnosisError;

/// A pre-trained binary classifier over the eight-feature vector.
///
/// Implementations are loaded once and then only read, so they must be
/// shareable across threads. Both methods receive the same `[1, 8]` matrix
/// for a given request; neither result is derived from the other.
pub trait ModelProvider: Send + Sync + Debug {
    /// Returns the predicted class label (0 = CKD absent, 1 = CKD present).
    fn predict_label(&self, features: ArrayView2<'_, f32>) -> Result<i64, DiagnosisError>;

    /// Returns class membership probabilities `[p0, p1]` for the first row.
    fn predict_probabilities(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f32>, DiagnosisError>;

    /// Short human-readable description used in logs and service info.
    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}
