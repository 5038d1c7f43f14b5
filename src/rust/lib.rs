//! Chronic Kidney Disease screening from eight patient lab values.
//!
//! A pre-trained binary classifier is loaded once, handed to a
//! [`DiagnosisService`], and asked for a label and class probabilities for
//! each request. The service turns those into a [`Verdict`] and a confidence
//! percentage.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use renalguard::{DiagnosisRequest, DiagnosisService, OnnxModel};
//!
//! let model = OnnxModel::builder()
//!     .with_model_path("models/ckd/model.onnx")?
//!     .build()?;
//! let service = DiagnosisService::new(Arc::new(model));
//!
//! let request = DiagnosisRequest {
//!     specific_gravity: 1.02,
//!     albumin: 1.0,
//!     blood_urea: 40.0,
//!     serum_creatinine: 1.2,
//!     sodium: 140.0,
//!     potassium: 4.5,
//!     hemoglobin: 13.5,
//!     hypertension: false,
//! };
//! let result = service.diagnose(&request)?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The service only reads from its model, so it can be shared across threads
//! using `Arc` or by cloning it.

pub mod diagnosis;
mod runtime;
pub mod model_manager;

pub use diagnosis::{
    confidence_percent, feature_names, DiagnosisError, DiagnosisRequest, DiagnosisResult,
    DiagnosisService, FeatureDomain, ModelProvider, OnnxModel, OnnxModelBuilder, ServiceInfo,
    Verdict, FEATURE_DOMAINS, NUM_FEATURES,
};
pub use runtime::{RuntimeConfig, create_session_builder, ensure_initialized};
pub use model_manager::{ModelManager, ModelError, ModelInfo};

pub fn init_logger() {
    env_logger::init();
}
