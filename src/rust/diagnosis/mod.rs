mod error;
mod onnx;
mod provider;
mod request;
mod result;
mod service;

pub use error::DiagnosisError;
pub use onnx::{OnnxModel, OnnxModelBuilder, DEFAULT_LABEL_OUTPUT, DEFAULT_PROBABILITY_OUTPUT};
pub use provider::ModelProvider;
pub use request::{feature_names, DiagnosisRequest, FeatureDomain, FEATURE_DOMAINS, NUM_FEATURES};
pub use result::{confidence_percent, DiagnosisResult, Verdict};
pub use service::DiagnosisService;

/// Information about the current configuration of a diagnosis service
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Description of the loaded model provider
    pub provider: String,
    /// Feature names in the order they are passed to the model
    pub feature_names: Vec<&'static str>,
}
