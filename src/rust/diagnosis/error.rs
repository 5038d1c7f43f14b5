use ort::Error as OrtError;

/// Represents the different types of errors that can occur while screening a patient.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiagnosisError {
    /// Feature assembly or model invocation failed during a diagnosis
    #[error("Diagnosis failed: {0}")]
    InferenceFailure(String),
    /// Error occurred while loading or running the ONNX model
    #[error("Model error: {0}")]
    ModelError(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    BuildError(String),
    /// A collected input fell outside its declared domain
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<OrtError> for DiagnosisError {
    fn from(err: OrtError) -> Self {
        DiagnosisError::ModelError(err.to_string())
    }
}
