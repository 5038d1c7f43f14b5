use std::sync::Arc;
use log::{debug, warn};

use super::error::DiagnosisError;
use super::provider::ModelProvider;
use super::request::{feature_names, DiagnosisRequest};
use super::result::DiagnosisResult;
use super::ServiceInfo;

/// Turns patient lab values into a CKD verdict using an injected classifier.
///
/// The provider is loaded once by the caller and shared read-only, so a
/// service can be cloned or wrapped in `Arc` and used from several threads.
///
/// ```
/// # use std::sync::Arc;
/// # use ndarray::ArrayView2;
/// use renalguard::{DiagnosisError, DiagnosisRequest, DiagnosisService, ModelProvider, Verdict};
///
/// #[derive(Debug)]
/// struct AlwaysHealthy;
///
/// impl ModelProvider for AlwaysHealthy {
///     fn predict_label(&self, _: ArrayView2<'_, f32>) -> Result<i64, DiagnosisError> {
///         Ok(0)
///     }
///     fn predict_probabilities(&self, _: ArrayView2<'_, f32>) -> Result<Vec<f32>, DiagnosisError> {
///         Ok(vec![0.9, 0.1])
///     }
/// }
///
/// let service = DiagnosisService::new(Arc::new(AlwaysHealthy));
/// let result = service.diagnose(&DiagnosisRequest::default())?;
/// assert_eq!(result.verdict, Verdict::NotLikely);
/// assert_eq!(result.confidence, 10.0);
/// # Ok::<(), DiagnosisError>(())
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosisService {
    provider: Arc<dyn ModelProvider>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<DiagnosisService>();
    }
};

impl DiagnosisService {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    /// Returns information about the service's configuration
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            provider: self.provider.describe(),
            feature_names: feature_names(),
        }
    }

    /// Scores one request.
    ///
    /// The request is expected to be within its domains already; boundary
    /// values are passed through untouched. The label and the probabilities
    /// are requested separately and the verdict always follows the label.
    ///
    /// # Errors
    /// - `InferenceFailure` for any failure while assembling features,
    ///   calling the model or interpreting its output
    pub fn diagnose(&self, request: &DiagnosisRequest) -> Result<DiagnosisResult, DiagnosisError> {
        self.try_diagnose(request).map_err(|e| {
            warn!("Diagnosis failed: {}", e);
            match e {
                DiagnosisError::InferenceFailure(msg) => DiagnosisError::InferenceFailure(msg),
                other => DiagnosisError::InferenceFailure(other.to_string()),
            }
        })
    }

    fn try_diagnose(&self, request: &DiagnosisRequest) -> Result<DiagnosisResult, DiagnosisError> {
        let features = request.to_feature_matrix()?;
        debug!("Scoring feature vector {:?}", features.row(0).to_vec());

        let label = self.provider.predict_label(features.view())?;
        let probabilities = self.provider.predict_probabilities(features.view())?;
        debug!("Model returned label {} and probabilities {:?}", label, probabilities);

        DiagnosisResult::from_model_output(label, &probabilities)
    }
}
