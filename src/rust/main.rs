use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use log::info;
use renalguard::{
    DiagnosisError, DiagnosisRequest, DiagnosisResult, DiagnosisService, ModelInfo, ModelManager, OnnxModel,
    RuntimeConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum YesNo {
    No,
    Yes,
}

#[derive(Parser)]
#[command(author, version, about = "Early detection of Chronic Kidney Disease from patient lab values", long_about = None)]
struct Args {
    /// Specific Gravity (Sg), 1.00 - 1.05
    #[arg(long, default_value_t = 1.0)]
    sg: f64,
    /// Albumin (Al), 0.0 - 5.0
    #[arg(long, default_value_t = 0.0)]
    al: f64,
    /// Blood Urea (Bu), 1.5 - 391.0
    #[arg(long, default_value_t = 1.5)]
    bu: f64,
    /// Serum Creatinine (Sc), 0.4 - 76.0
    #[arg(long, default_value_t = 0.4)]
    sc: f64,
    /// Sodium (Sod), 4.5 - 163.0
    #[arg(long, default_value_t = 4.5)]
    sod: f64,
    /// Potassium (Pot), 2.5 - 47.0
    #[arg(long, default_value_t = 2.5)]
    pot: f64,
    /// Hemoglobin (Hemo), 3.1 - 17.8
    #[arg(long, default_value_t = 3.1)]
    hemo: f64,
    /// Hypertension (Htn)
    #[arg(long, value_enum, default_value_t = YesNo::No)]
    htn: YesNo,

    /// Path to the ONNX classifier
    #[arg(short, long, conflicts_with = "model_name")]
    model: Option<PathBuf>,
    /// Name of a cached model under the renalguard cache directory
    #[arg(long, default_value = "ckd-xgb")]
    model_name: String,
    /// URL to fetch the cached model from when it is missing
    #[arg(long, requires = "model_sha256", conflicts_with = "model")]
    model_url: Option<String>,
    /// Expected SHA-256 of the fetched model
    #[arg(long, requires = "model_url")]
    model_sha256: Option<String>,
    /// Force a fresh download of the model file
    #[arg(short, long, conflicts_with = "model")]
    fresh: bool,

    /// Clamp out-of-range values instead of rejecting them
    #[arg(long)]
    clamp: bool,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
    /// Use one ONNX Runtime thread
    #[arg(long)]
    single_threaded: bool,
}

impl Args {
    fn request(&self) -> DiagnosisRequest {
        DiagnosisRequest {
            specific_gravity: self.sg,
            albumin: self.al,
            blood_urea: self.bu,
            serum_creatinine: self.sc,
            sodium: self.sod,
            potassium: self.pot,
            hemoglobin: self.hemo,
            hypertension: matches!(self.htn, YesNo::Yes),
        }
    }
}

async fn resolve_model_path(args: &Args) -> anyhow::Result<PathBuf> {
    if let Some(path) = &args.model {
        return Ok(path.clone());
    }

    let manager = ModelManager::new_default().context("Failed to create model cache directory")?;
    let (Some(url), Some(hash)) = (&args.model_url, &args.model_sha256) else {
        if args.fresh {
            bail!("--fresh requires --model-url and --model-sha256");
        }
        return Ok(manager.require_model(&args.model_name)?);
    };

    let info = ModelInfo {
        name: args.model_name.clone(),
        model_url: url.clone(),
        model_hash: hash.clone(),
    };
    if args.fresh {
        info!("Fresh download requested - removing any existing model file...");
        manager.remove_download(&info.name)?;
    }
    Ok(manager.ensure_model_downloaded(&info).await?)
}

fn render(result: &DiagnosisResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("RENALGUARD");
    println!("A Machine Learning powered tool for early detection of Chronic Kidney Disease");
    println!("---");
    println!("{}", result);
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut request = args.request();
    if args.clamp {
        request = request.clamped();
    } else {
        request.validate()?;
    }

    let model_path = resolve_model_path(&args).await?;
    let runtime_config = if args.single_threaded {
        RuntimeConfig::single_threaded()
    } else {
        RuntimeConfig::default()
    };
    let model = OnnxModel::builder()
        .with_runtime_config(runtime_config)
        .with_model_path(&model_path)?
        .build()?;
    let service = DiagnosisService::new(Arc::new(model));
    info!("Loaded {}", service.info().provider);

    let result = service.diagnose(&request)?;
    render(&result, args.json)
}

#[tokio::main]
async fn main() -> ExitCode {
    renalguard::init_logger();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Inference failures already read "Diagnosis failed: ..."
            match e.downcast_ref::<DiagnosisError>() {
                Some(DiagnosisError::InferenceFailure(_)) => eprintln!("{}", e),
                _ => eprintln!("Diagnosis failed: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_request() {
        let args = Args::parse_from([
            "renalguard", "--sg", "1.02", "--al", "1.0", "--bu", "40", "--sc", "1.2",
            "--sod", "140", "--pot", "4.5", "--hemo", "13.5", "--htn", "yes",
        ]);
        let request = args.request();
        assert_eq!(request.to_features(), [1.02f32, 1.0, 40.0, 1.2, 140.0, 4.5, 13.5, 1.0]);
    }

    #[test]
    fn test_defaults_are_domain_minimums() {
        let args = Args::parse_from(["renalguard"]);
        assert_eq!(args.request(), DiagnosisRequest::minimum());
        assert!(args.request().validate().is_ok());
    }

    #[test]
    fn test_model_url_requires_hash() {
        let result = Args::try_parse_from(["renalguard", "--model-url", "https://example.invalid/model.onnx"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_model_hash_requires_url() {
        let result = Args::try_parse_from(["renalguard", "--model-sha256", "abc123"]);
        assert!(result.is_err());

        let args = Args::try_parse_from([
            "renalguard", "--model-url", "https://example.invalid/model.onnx", "--model-sha256", "abc123",
        ]);
        assert!(args.is_ok());
    }

    #[test]
    fn test_local_model_conflicts_with_fetch_flags() {
        assert!(Args::try_parse_from(["renalguard", "--model", "model.onnx", "--fresh"]).is_err());
        assert!(Args::try_parse_from([
            "renalguard", "--model", "model.onnx",
            "--model-url", "https://example.invalid/model.onnx", "--model-sha256", "abc123",
        ]).is_err());
        assert!(Args::try_parse_from(["renalguard", "--model", "model.onnx"]).is_ok());
    }
}
