use facerelay_backends::VISION_DEFAULT_ENDPOINT;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
/// Base64 inflates by 4/3, so this admits images up to ~12 MiB.
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{0} is required")]
    Missing(&'static str),
}

/// Daemon configuration.
///
/// Resolved from built-in defaults, then an optional TOML file named by
/// `FACERELAY_CONFIG`, then `FACERELAY_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Cloud Vision `images:annotate` URL.
    pub vision_endpoint: String,
    /// Cloud Vision API key.
    pub vision_api_key: String,
    /// Timeout in seconds for one detection call.
    pub vision_timeout_secs: u64,
    /// Upper bound on faces requested from the provider per image.
    pub max_faces: u32,
    /// Directory holding stored blobs.
    pub storage_dir: PathBuf,
    /// Keep blobs in memory instead of `storage_dir`.
    pub ephemeral_storage: bool,
    /// Request body size limit in bytes.
    pub max_body_bytes: usize,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

/// On-disk layout of the optional TOML file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    listen_addr: Option<String>,
    vision_endpoint: Option<String>,
    vision_api_key: Option<String>,
    vision_timeout_secs: Option<u64>,
    max_faces: Option<u32>,
    storage_dir: Option<PathBuf>,
    ephemeral_storage: Option<bool>,
    max_body_bytes: Option<usize>,
    cors_origins: Option<Vec<String>>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&src).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match std::env::var("FACERELAY_CONFIG") {
            Ok(path) => {
                tracing::info!(path = %path, "reading config file");
                FileConfig::read(Path::new(&path))?
            }
            Err(_) => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge file values with environment overrides looked up through `env`.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let listen_raw = env("FACERELAY_LISTEN_ADDR")
            .or(file.listen_addr)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            key: "listen_addr",
            value: listen_raw.clone(),
        })?;

        let vision_api_key = env("FACERELAY_VISION_API_KEY")
            .or(file.vision_api_key)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("FACERELAY_VISION_API_KEY"))?;

        let storage_dir = env("FACERELAY_STORAGE_DIR")
            .map(PathBuf::from)
            .or(file.storage_dir)
            .unwrap_or_else(|| default_data_dir(&env).join("blobs"));

        let ephemeral_storage = match env("FACERELAY_EPHEMERAL_STORAGE") {
            Some(raw) => parse_flag("FACERELAY_EPHEMERAL_STORAGE", &raw)?,
            None => file.ephemeral_storage.unwrap_or(false),
        };

        let cors_origins = match env("FACERELAY_CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect(),
            None => file.cors_origins.unwrap_or_default(),
        };

        Ok(Self {
            listen_addr,
            vision_endpoint: env("FACERELAY_VISION_ENDPOINT")
                .or(file.vision_endpoint)
                .unwrap_or_else(|| VISION_DEFAULT_ENDPOINT.to_string()),
            vision_api_key,
            vision_timeout_secs: env_parse(&env, "FACERELAY_VISION_TIMEOUT_SECS")
                .or(file.vision_timeout_secs)
                .unwrap_or(10),
            max_faces: env_parse(&env, "FACERELAY_MAX_FACES")
                .or(file.max_faces)
                .unwrap_or(20),
            storage_dir,
            ephemeral_storage,
            max_body_bytes: env_parse(&env, "FACERELAY_MAX_BODY_BYTES")
                .or(file.max_body_bytes)
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            cors_origins,
        })
    }
}

fn default_data_dir(env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    env("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facerelay")
}

/// Boolean env switch. Unrecognized values are an error, not a default.
fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

fn env_parse<T: std::str::FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    env(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::resolve(FileConfig::default(), |key| match key {
        "FACERELAY_VISION_API_KEY" => Some("test-key".to_string()),
        _ => None,
    })
    .unwrap()
}
