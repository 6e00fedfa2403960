use facegate_core::{DetectionMode, DEFAULT_TOLERANCE};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Server configuration.
///
/// Resolution order: built-in defaults, then the TOML file named by
/// `FACEGATE_CONFIG` (if set), then `FACEGATE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:5000).
    pub bind_addr: SocketAddr,
    /// Directory of enrollment images; file stems become identity labels.
    pub gallery_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the SQLite audit database.
    pub db_path: PathBuf,
    /// Maximum Euclidean descriptor distance for a positive match.
    pub tolerance: f32,
    /// Detector input resolution.
    pub detection_mode: DetectionMode,
    /// Pending identify requests the engine queue holds before callers wait.
    pub engine_queue: usize,
    /// Mark the session cookie `Secure` (only sent over HTTPS).
    pub secure_cookies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            gallery_dir: PathBuf::from("known_faces"),
            model_dir: facegate_core::default_model_dir(),
            db_path: PathBuf::from("login_history.db"),
            tolerance: DEFAULT_TOLERANCE,
            detection_mode: DetectionMode::Fast,
            engine_queue: 16,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    /// Load configuration from the optional file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var_os("FACEGATE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `FACEGATE_*` overrides read through `lookup`.
    ///
    /// Unparseable values are rejected rather than silently ignored so a typo
    /// in the tolerance cannot loosen the gate.
    pub fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup("FACEGATE_BIND_ADDR") {
            self.bind_addr = parse("FACEGATE_BIND_ADDR", v)?;
        }
        if let Some(v) = lookup("FACEGATE_GALLERY_DIR") {
            self.gallery_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEGATE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEGATE_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEGATE_TOLERANCE") {
            self.tolerance = parse("FACEGATE_TOLERANCE", v)?;
        }
        if let Some(v) = lookup("FACEGATE_DETECTION_MODE") {
            self.detection_mode = parse("FACEGATE_DETECTION_MODE", v)?;
        }
        if let Some(v) = lookup("FACEGATE_ENGINE_QUEUE") {
            self.engine_queue = parse("FACEGATE_ENGINE_QUEUE", v)?;
        }
        if let Some(v) = lookup("FACEGATE_SECURE_COOKIES") {
            self.secure_cookies = v != "0" && !v.eq_ignore_ascii_case("false");
        }

        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::Invalid {
                key: "tolerance",
                value: self.tolerance.to_string(),
            });
        }
        self.engine_queue = self.engine_queue.max(1);
        Ok(self)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}
