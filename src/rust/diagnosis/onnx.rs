use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use ndarray::{ArrayView2, ArrayViewD};
use ort::session::Session;
use ort::value::{DynValue, Tensor};
use log::{debug, error, info};

use super::error::DiagnosisError;
use super::provider::ModelProvider;
use super::request::NUM_FEATURES;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Default output name for the int64 class label tensor.
pub const DEFAULT_LABEL_OUTPUT: &str = "label";
/// Default output name for the float probability tensor.
pub const DEFAULT_PROBABILITY_OUTPUT: &str = "probabilities";

/// A CKD classifier exported to ONNX and executed with ONNX Runtime.
///
/// The graph is expected to take one float input of shape `[batch, 8]` and
/// produce an int64 label tensor `[batch]` and a float probability tensor
/// `[batch, 2]`. This is the layout gradient-boosted classifiers have when
/// converted with ZipMap disabled.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use renalguard::OnnxModel;
///
/// let model = OnnxModel::builder()
///     .with_model_path("models/ckd/model.onnx")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OnnxModel {
    pub model_path: String,
    pub session: Arc<Session>,
    pub input_name: String,
    pub label_output: String,
    pub probability_output: String,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxModel>();
    }
};

impl OnnxModel {
    /// Creates a new OnnxModelBuilder for fluent construction
    pub fn builder() -> OnnxModelBuilder {
        OnnxModelBuilder::new()
    }

    /// Runs the session on `features` and returns the named output as an owned array.
    fn run_output<T, F>(&self, features: ArrayView2<'_, f32>, output: &str, extract: F) -> Result<T, DiagnosisError>
    where
        F: FnOnce(&DynValue) -> Result<T, DiagnosisError>,
    {
        check_feature_shape(features)?;

        let input_dyn = features.to_owned().into_dyn();
        let input = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(self.input_name.as_str(), Tensor::from_array(&input)
            .map_err(|e| DiagnosisError::InferenceFailure(format!("Failed to create input tensor: {}", e)))?);

        let outputs = self.session.run(input_tensors)
            .map_err(|e| DiagnosisError::InferenceFailure(format!("Failed to run model: {}", e)))?;
        let value = outputs.get(output)
            .ok_or_else(|| DiagnosisError::InferenceFailure(format!("Model produced no '{}' output", output)))?;

        extract(value)
    }
}

impl ModelProvider for OnnxModel {
    fn predict_label(&self, features: ArrayView2<'_, f32>) -> Result<i64, DiagnosisError> {
        self.run_output(features, &self.label_output, extract_label)
    }

    fn predict_probabilities(&self, features: ArrayView2<'_, f32>) -> Result<Vec<f32>, DiagnosisError> {
        self.run_output(features, &self.probability_output, extract_probabilities)
    }

    fn describe(&self) -> String {
        format!(
            "onnx model {} (input '{}', outputs '{}'/'{}')",
            self.model_path, self.input_name, self.label_output, self.probability_output
        )
    }
}

fn check_feature_shape(features: ArrayView2<'_, f32>) -> Result<(), DiagnosisError> {
    if features.ncols() != NUM_FEATURES {
        return Err(DiagnosisError::InferenceFailure(format!(
            "Expected {} features per row, got {}",
            NUM_FEATURES,
            features.ncols()
        )));
    }
    if features.nrows() == 0 {
        return Err(DiagnosisError::InferenceFailure("Feature matrix has no rows".into()));
    }
    Ok(())
}

/// Label of the first row from an int64 `[batch]` tensor.
fn extract_label(value: &DynValue) -> Result<i64, DiagnosisError> {
    let labels = value.try_extract_tensor::<i64>()
        .map_err(|e| DiagnosisError::InferenceFailure(format!("Failed to extract label tensor: {}", e)))?;
    first_label(labels)
}

fn first_label(labels: ArrayViewD<'_, i64>) -> Result<i64, DiagnosisError> {
    labels.iter().next().copied()
        .ok_or_else(|| DiagnosisError::InferenceFailure("Label tensor is empty".into()))
}

/// Probabilities of the first row from a float `[batch, classes]` tensor.
fn extract_probabilities(value: &DynValue) -> Result<Vec<f32>, DiagnosisError> {
    let probabilities = value.try_extract_tensor::<f32>()
        .map_err(|e| DiagnosisError::InferenceFailure(format!("Failed to extract probability tensor: {}", e)))?;
    first_row(probabilities)
}

fn first_row(probabilities: ArrayViewD<'_, f32>) -> Result<Vec<f32>, DiagnosisError> {
    let shape = probabilities.shape();
    if shape.len() != 2 || shape[0] == 0 {
        return Err(DiagnosisError::InferenceFailure(format!(
            "Unexpected probability tensor shape {:?}",
            shape
        )));
    }
    let row = probabilities.slice(ndarray::s![0, ..]);
    Ok(row.iter().copied().collect())
}

/// A builder for constructing an OnnxModel with a fluent interface.
#[derive(Debug, Default)]
pub struct OnnxModelBuilder {
    model_path: Option<String>,
    input_name: Option<String>,
    label_output: Option<String>,
    probability_output: Option<String>,
    runtime_config: RuntimeConfig,
}

impl OnnxModelBuilder {
    /// Creates a new empty OnnxModelBuilder instance with default configuration
    pub fn new() -> Self {
        Self {
            model_path: None,
            input_name: None,
            label_output: None,
            probability_output: None,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration for ONNX model execution
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Name of the feature input. Defaults to the graph's first input.
    pub fn with_input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = Some(name.into());
        self
    }

    /// Name of the label output. Defaults to `label`.
    pub fn with_label_output(mut self, name: impl Into<String>) -> Self {
        self.label_output = Some(name.into());
        self
    }

    /// Name of the probability output. Defaults to `probabilities`.
    pub fn with_probability_output(mut self, name: impl Into<String>) -> Self {
        self.probability_output = Some(name.into());
        self
    }

    /// Sets the path to the serialized classifier
    ///
    /// # Returns
    /// * `Result<Self, DiagnosisError>` - The builder instance if successful, or a `BuildError` if:
    ///   - The path is empty
    ///   - The path is already set
    ///   - The file doesn't exist
    pub fn with_model_path(mut self, model_path: impl AsRef<Path>) -> Result<Self, DiagnosisError> {
        let model_path = model_path.as_ref();
        if model_path.as_os_str().is_empty() {
            return Err(DiagnosisError::BuildError("Model path cannot be empty".to_string()));
        }
        if self.model_path.is_some() {
            return Err(DiagnosisError::BuildError("Model path already set".to_string()));
        }
        if !model_path.exists() {
            return Err(DiagnosisError::BuildError(format!("Model file not found: {}", model_path.display())));
        }

        self.model_path = Some(model_path.to_string_lossy().to_string());
        Ok(self)
    }

    /// Loads the model and returns the final OnnxModel instance
    ///
    /// # Returns
    /// * `Result<OnnxModel, DiagnosisError>` - The loaded model if successful, or an error if:
    ///   - No model path is set
    ///   - ONNX Runtime failed to load the file
    ///   - The graph does not expose the configured input and outputs
    pub fn build(self) -> Result<OnnxModel, DiagnosisError> {
        let model_path = self.model_path
            .ok_or_else(|| DiagnosisError::BuildError("Model path must be set".to_string()))?;

        info!("Loading classifier from {}", model_path);
        let session = create_session_builder(&self.runtime_config)?
            .commit_from_file(&model_path)
            .map_err(|e| {
                error!("Failed to load model: {}", e);
                DiagnosisError::ModelError(format!("Failed to load model {}: {}", model_path, e))
            })?;

        let label_output = self.label_output.unwrap_or_else(|| DEFAULT_LABEL_OUTPUT.to_string());
        let probability_output = self.probability_output.unwrap_or_else(|| DEFAULT_PROBABILITY_OUTPUT.to_string());
        let input_name = Self::validate_model(&session, self.input_name, &label_output, &probability_output)?;
        info!("Model structure validated successfully");
        debug!("Using input '{}', outputs '{}' and '{}'", input_name, label_output, probability_output);

        Ok(OnnxModel {
            model_path,
            session: Arc::new(session),
            input_name,
            label_output,
            probability_output,
        })
    }

    /// Validates that the model has the expected input/output structure and
    /// returns the resolved input name.
    fn validate_model(
        session: &Session,
        input_name: Option<String>,
        label_output: &str,
        probability_output: &str,
    ) -> Result<String, DiagnosisError> {
        let inputs = &session.inputs;
        let input_name = match input_name {
            Some(name) => {
                if !inputs.iter().any(|i| i.name == name) {
                    return Err(DiagnosisError::ModelError(format!("Model has no input named '{}'", name)));
                }
                name
            }
            None => inputs.first()
                .map(|i| i.name.clone())
                .ok_or_else(|| DiagnosisError::ModelError("Model must have at least 1 input".to_string()))?,
        };

        let outputs = &session.outputs;
        for expected in [label_output, probability_output] {
            if !outputs.iter().any(|o| o.name == expected) {
                return Err(DiagnosisError::ModelError(format!(
                    "Model has no output named '{}' (found: {})",
                    expected,
                    outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>().join(", ")
                )));
            }
        }

        Ok(input_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, ArrayD, IxDyn};

    #[test]
    fn test_feature_shape_guard() {
        assert!(check_feature_shape(Array2::<f32>::zeros((1, NUM_FEATURES)).view()).is_ok());
        assert!(matches!(
            check_feature_shape(Array2::<f32>::zeros((1, 7)).view()),
            Err(DiagnosisError::InferenceFailure(ref msg)) if msg.contains("got 7")
        ));
        assert!(check_feature_shape(Array2::<f32>::zeros((0, NUM_FEATURES)).view()).is_err());
    }

    #[test]
    fn test_extract_label_from_tensor() -> Result<(), Box<dyn std::error::Error>> {
        let value = Tensor::from_array(Array1::from(vec![1i64]))?.into_dyn();
        assert_eq!(extract_label(&value)?, 1);

        let value = Tensor::from_array(Array1::from(vec![0i64, 1]))?.into_dyn();
        assert_eq!(extract_label(&value)?, 0);
        Ok(())
    }

    #[test]
    fn test_extract_label_rejects_float_tensor() -> Result<(), Box<dyn std::error::Error>> {
        let value = Tensor::from_array(Array1::from(vec![1.0f32]))?.into_dyn();
        assert!(matches!(extract_label(&value), Err(DiagnosisError::InferenceFailure(_))));
        Ok(())
    }

    #[test]
    fn test_empty_label_tensor() {
        let labels = ArrayD::<i64>::zeros(IxDyn(&[0]));
        assert!(matches!(
            first_label(labels.view()),
            Err(DiagnosisError::InferenceFailure(ref msg)) if msg.contains("empty")
        ));
    }

    #[test]
    fn test_extract_probabilities_from_tensor() -> Result<(), Box<dyn std::error::Error>> {
        let value = Tensor::from_array(Array2::from_shape_vec((1, 2), vec![0.25f32, 0.75])?)?.into_dyn();
        assert_eq!(extract_probabilities(&value)?, vec![0.25, 0.75]);

        // Only the first row is read
        let value = Tensor::from_array(Array2::from_shape_vec((2, 2), vec![0.9f32, 0.1, 0.3, 0.7])?)?.into_dyn();
        assert_eq!(extract_probabilities(&value)?, vec![0.9, 0.1]);
        Ok(())
    }

    #[test]
    fn test_probabilities_need_two_dimensions() -> Result<(), Box<dyn std::error::Error>> {
        let value = Tensor::from_array(Array1::from(vec![0.25f32, 0.75]))?.into_dyn();
        assert!(matches!(extract_probabilities(&value), Err(DiagnosisError::InferenceFailure(_))));

        let value = Tensor::from_array(Array1::from(vec![1i64, 0]))?.into_dyn();
        assert!(matches!(extract_probabilities(&value), Err(DiagnosisError::InferenceFailure(_))));
        Ok(())
    }

    #[test]
    fn test_probabilities_need_a_row() {
        let probabilities = ArrayD::<f32>::zeros(IxDyn(&[0, 2]));
        assert!(matches!(
            first_row(probabilities.view()),
            Err(DiagnosisError::InferenceFailure(ref msg)) if msg.contains("[0, 2]")
        ));
        let probabilities = ArrayD::<f32>::zeros(IxDyn(&[2]));
        assert!(first_row(probabilities.view()).is_err());
    }

    #[test]
    fn test_empty_model_path() {
        let result = OnnxModel::builder().with_model_path("");
        assert!(matches!(result, Err(DiagnosisError::BuildError(_))));
    }

    #[test]
    fn test_missing_model_file() {
        let result = OnnxModel::builder().with_model_path("/nonexistent/renalguard/model.onnx");
        assert!(matches!(result, Err(DiagnosisError::BuildError(ref msg)) if msg.contains("not found")));
    }

    #[test]
    fn test_build_without_path() {
        let result = OnnxModel::builder().build();
        assert!(matches!(result, Err(DiagnosisError::BuildError(_))));
    }

    #[test]
    fn test_path_already_set() -> Result<(), Box<dyn std::error::Error>> {
        let file = tempfile::NamedTempFile::new()?;
        let result = OnnxModel::builder()
            .with_model_path(file.path())?
            .with_model_path(file.path());
        assert!(matches!(result, Err(DiagnosisError::BuildError(_))));
        Ok(())
    }

    #[test]
    fn test_invalid_model_file() -> Result<(), Box<dyn std::error::Error>> {
        let file = tempfile::NamedTempFile::new()?;
        std::fs::write(file.path(), b"not an onnx graph")?;
        let result = OnnxModel::builder()
            .with_model_path(file.path())?
            .build();
        assert!(matches!(result, Err(DiagnosisError::ModelError(_))));
        Ok(())
    }
}
