use std::path::{Component, Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use tokio::sync::Mutex;
use sha2::{Sha256, Digest};

/// Environment variable overriding the model cache location.
pub const CACHE_ENV_VAR: &str = "RENALGUARD_CACHE";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid model name '{0}': must be a single path component")]
    InvalidName(String),
    #[error("Model verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Where a serialized classifier can be fetched from and what it must hash to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub model_url: String,
    /// Lowercase hex SHA-256 of the model file
    pub model_hash: String,
}

/// Locates, fetches and verifies model artifacts in a local cache directory.
#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(CACHE_ENV_VAR) {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("renalguard").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("renalguard").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("renalguard").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Returns `<models_dir>/<name>/model.onnx`.
    ///
    /// `name` must be one plain path component so the result stays inside
    /// the cache directory.
    pub fn get_model_path(&self, name: &str) -> Result<PathBuf, ModelError> {
        Ok(self.models_dir.join(validate_model_name(name)?).join("model.onnx"))
    }

    pub fn is_model_downloaded(&self, name: &str) -> bool {
        match self.get_model_path(name) {
            Ok(model_path) => {
                log::debug!("Model path: {:?} (exists: {})", model_path, model_path.exists());
                model_path.exists()
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Returns the cached model path, or `NotDownloaded` if it is absent.
    pub fn require_model(&self, name: &str) -> Result<PathBuf, ModelError> {
        let model_path = self.get_model_path(name)?;
        if !model_path.exists() {
            return Err(ModelError::NotDownloaded(name.to_string()));
        }
        Ok(model_path)
    }

    pub async fn download_model(&self, info: &ModelInfo) -> Result<(), ModelError> {
        let model_path = self.get_model_path(&info.name)?;
        let _lock = self.download_lock.lock().await;

        let model_dir = self.models_dir.join(&info.name);
        log::info!("Creating model directory at {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        let result = if model_path.exists() {
            log::info!("Model file exists at {:?}, verifying...", model_path);
            if !self.verify_file(&model_path, &info.model_hash)? {
                log::warn!("Model file verification failed, redownloading");
                self.download_and_verify_file(&info.model_url, &model_path, &info.model_hash, "model").await
            } else {
                log::info!("Existing model file verified successfully");
                Ok(())
            }
        } else {
            log::info!("Model file does not exist, downloading...");
            self.download_and_verify_file(&info.model_url, &model_path, &info.model_hash, "model").await
        };

        if let Err(e) = result {
            log::error!("Failed to setup model file: {}", e);
            // Cleanup on failure
            let _ = self.remove_download(&info.name);
            return Err(e);
        }
        log::info!("Model ready to use");
        Ok(())
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Verifying {:?}: {} bytes, hash {}, expected {}", path, bytes.len(), hash, expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    pub fn verify_model(&self, info: &ModelInfo) -> Result<bool, ModelError> {
        let model_path = self.get_model_path(&info.name)?;
        if !model_path.exists() {
            log::info!("Model file {:?} does not exist", model_path);
            return Ok(false);
        }

        let model_ok = self.verify_file(&model_path, &info.model_hash)?;
        log::info!("Model hash verification: {}", model_ok);
        Ok(model_ok)
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: &str,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = sha256_hex(&bytes);
        if !hash.eq_ignore_ascii_case(expected_hash) {
            log::error!("{} hash mismatch: expected {}, got {}", file_type, expected_hash, hash);
            return Err(ModelError::HashMismatch {
                file_type: file_type.to_string(),
                expected: expected_hash.to_string(),
                actual: hash,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        log::info!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(path, &bytes)?;

        // Verify after writing
        if !self.verify_file(path, expected_hash)? {
            return Err(ModelError::VerificationFailed);
        }

        log::info!("{} file downloaded and verified successfully", file_type);
        Ok(())
    }

    pub fn remove_download(&self, name: &str) -> Result<(), ModelError> {
        let model_path = self.get_model_path(name)?;
        if model_path.exists() {
            fs::remove_file(&model_path)?;
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, info: &ModelInfo) -> Result<PathBuf, ModelError> {
        let model_path = self.get_model_path(&info.name)?;
        log::info!("Checking if model {} is downloaded...", info.name);
        if !self.is_model_downloaded(&info.name) {
            log::info!("Model not found, downloading...");
            self.download_model(info).await?;
        } else if !self.verify_model(info)? {
            log::info!("Model verification failed, re-downloading...");
            self.remove_download(&info.name)?;
            self.download_model(info).await?;
        } else {
            log::info!("Model verification successful");
        }
        Ok(model_path)
    }
}

/// Accepts names that are exactly one normal path component.
fn validate_model_name(name: &str) -> Result<&str, ModelError> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || name.contains(['/', '\\']) {
        return Err(ModelError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        // Test with environment variable
        env::set_var(CACHE_ENV_VAR, "/tmp/test-renalguard-cache");
        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("/tmp/test-renalguard-cache/models"));
        env::remove_var(CACHE_ENV_VAR);

        // Test without environment variable
        let path = ModelManager::get_default_models_dir();
        assert!(path.to_str().unwrap().contains("renalguard"));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_model_name_validation() {
        for name in ["ckd-xgb", "model.v2", "ckd_xgb"] {
            assert!(validate_model_name(name).is_ok(), "{} rejected", name);
        }
        for name in ["", ".", "..", "../victim", "a/b", "a\\b", "/etc", "ckd/.."] {
            assert!(matches!(validate_model_name(name), Err(ModelError::InvalidName(_))), "{} accepted", name);
        }
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
