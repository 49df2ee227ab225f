use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8081;
const DEFAULT_MAX_IMAGE_MB: usize = 10;
const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub catalog_path: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub detection: DetectionSettings,
}

/// Per-request knobs for `POST /api/detect`.
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub delay: Duration,
    /// When set, every request replays the same random draws.
    pub seed: Option<u64>,
    pub max_image_mb: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            seed: None,
            max_image_mb: DEFAULT_MAX_IMAGE_MB,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let delay_ms: u64 = parse_or(&non_empty, "DETECTION_DELAY_MS", 0)?;
        let max_image_mb: usize = parse_or(&non_empty, "MAX_IMAGE_MB", DEFAULT_MAX_IMAGE_MB)?;
        // Must be non-zero and still fit in bytes.
        if max_image_mb == 0 || max_image_mb.checked_mul(BYTES_PER_MB).is_none() {
            return Err(ConfigError::Invalid {
                key: "MAX_IMAGE_MB",
                value: max_image_mb.to_string(),
            });
        }
        let seed = match non_empty("DETECTION_SEED") {
            Some(value) => Some(parse_value("DETECTION_SEED", &value)?),
            None => None,
        };

        Ok(Self {
            host: non_empty("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&non_empty, "PORT", DEFAULT_PORT)?,
            catalog_path: non_empty("CATALOG_PATH").map(PathBuf::from),
            static_dir: non_empty("STATIC_DIR").map(PathBuf::from),
            detection: DetectionSettings {
                delay: Duration::from_millis(delay_ms),
                seed,
                max_image_mb,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
