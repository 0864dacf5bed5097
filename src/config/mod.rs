//! Environment-backed configuration.
//!
//! Every setting has a default. Overrides come from the environment variables
//! the deployment image already sets (`MODEL_NAME`, `DEVICE`, `MAX_LENGTH`, ...).

pub mod error;

#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::env;
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use candle_core::DType;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_SERVICE_URL,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_LENGTH, DEFAULT_RERANKER_MODEL,
    DEFAULT_RERANKER_SERVICE_URL,
};

/// Requested compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Use the first compiled-in GPU backend that initialises, else CPU.
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl FromStr for DevicePreference {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "metal" | "mps" => Ok(Self::Metal),
            _ => Err(ConfigError::UnknownDevice {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Metal => "metal",
        };
        f.write_str(name)
    }
}

/// Numeric precision for model weights and activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    #[default]
    Float16,
    BFloat16,
    Float32,
}

impl Precision {
    pub fn dtype(self) -> DType {
        match self {
            Self::Float16 => DType::F16,
            Self::BFloat16 => DType::BF16,
            Self::Float32 => DType::F32,
        }
    }
}

impl FromStr for Precision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float16" | "fp16" | "half" => Ok(Self::Float16),
            "bfloat16" | "bf16" => Ok(Self::BFloat16),
            "float32" | "fp32" | "float" => Ok(Self::Float32),
            _ => Err(ConfigError::UnknownDtype {
                value: s.to_string(),
            }),
        }
    }
}

/// Process configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read overrides on top of [`Config::default`].
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8000`.
    pub port: u16,

    /// IP address to bind to. Default: `0.0.0.0`.
    pub bind_addr: IpAddr,

    /// Single-model identifier or local path (reranker worker). `MODEL_NAME`.
    pub model_name: String,

    /// Engine array models, `;`-separated in `MODEL_NAMES`.
    pub model_names: Vec<String>,

    /// Per-engine batch sizes, `;`-separated in `BATCH_SIZES`.
    pub batch_sizes: Vec<usize>,

    /// Compute backend. `DEVICE`.
    pub device: DevicePreference,

    /// Maximum tokens per scored sequence. `MAX_LENGTH`.
    pub max_length: usize,

    /// Concurrency hint for the job runtime. `RUNPOD_MAX_CONCURRENCY`.
    pub max_concurrency: usize,

    /// `USE_FLASH_ATTENTION`. Parsed and reported; no flash kernels are linked.
    pub use_flash_attention: bool,

    /// Weight precision. `TORCH_DTYPE`.
    pub precision: Precision,

    /// Hugging Face Hub cache directory. `HF_HOME`.
    pub hf_home: Option<PathBuf>,

    /// Copy container models onto the persistent volume at startup. `COPY_TO_VOLUME`.
    pub copy_to_volume: bool,

    /// Embedding backend base URL used by the gateway. `EMBEDDING_SERVICE_URL`.
    pub embedding_service_url: String,

    /// Reranker backend base URL used by the gateway. `RERANKER_SERVICE_URL`.
    pub reranker_service_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
            model_name: DEFAULT_RERANKER_MODEL.to_string(),
            model_names: vec![
                DEFAULT_EMBEDDING_MODEL.to_string(),
                DEFAULT_RERANKER_MODEL.to_string(),
            ],
            batch_sizes: vec![DEFAULT_BATCH_SIZE, DEFAULT_BATCH_SIZE],
            device: DevicePreference::Auto,
            max_length: DEFAULT_MAX_LENGTH,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            use_flash_attention: false,
            precision: Precision::Float16,
            hf_home: None,
            copy_to_volume: false,
            embedding_service_url: DEFAULT_EMBEDDING_SERVICE_URL.to_string(),
            reranker_service_url: DEFAULT_RERANKER_SERVICE_URL.to_string(),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "PORT";
    const ENV_BIND_ADDR: &'static str = "BIND_ADDR";
    const ENV_MODEL_NAME: &'static str = "MODEL_NAME";
    const ENV_MODEL_NAMES: &'static str = "MODEL_NAMES";
    const ENV_BATCH_SIZES: &'static str = "BATCH_SIZES";
    const ENV_DEVICE: &'static str = "DEVICE";
    const ENV_MAX_LENGTH: &'static str = "MAX_LENGTH";
    const ENV_MAX_CONCURRENCY: &'static str = "RUNPOD_MAX_CONCURRENCY";
    const ENV_FLASH_ATTENTION: &'static str = "USE_FLASH_ATTENTION";
    const ENV_DTYPE: &'static str = "TORCH_DTYPE";
    const ENV_HF_HOME: &'static str = "HF_HOME";
    const ENV_COPY_TO_VOLUME: &'static str = "COPY_TO_VOLUME";
    const ENV_EMBEDDING_URL: &'static str = "EMBEDDING_SERVICE_URL";
    const ENV_RERANKER_URL: &'static str = "RERANKER_SERVICE_URL";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let model_name = Self::parse_string_from_env(Self::ENV_MODEL_NAME, defaults.model_name);
        let model_names = Self::parse_list_from_env(Self::ENV_MODEL_NAMES)
            .unwrap_or(defaults.model_names);
        let batch_sizes = match Self::parse_list_from_env(Self::ENV_BATCH_SIZES) {
            Some(values) => values
                .iter()
                .map(|v| Self::parse_usize(Self::ENV_BATCH_SIZES, v))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![DEFAULT_BATCH_SIZE; model_names.len()],
        };
        let device = match env::var(Self::ENV_DEVICE) {
            Ok(value) => value.parse()?,
            Err(_) => defaults.device,
        };
        let max_length = Self::parse_usize_from_env(Self::ENV_MAX_LENGTH, defaults.max_length)?;
        let max_concurrency =
            Self::parse_usize_from_env(Self::ENV_MAX_CONCURRENCY, defaults.max_concurrency)?;
        let use_flash_attention =
            Self::parse_bool_from_env(Self::ENV_FLASH_ATTENTION, defaults.use_flash_attention);
        let precision = match env::var(Self::ENV_DTYPE) {
            Ok(value) => value.parse()?,
            Err(_) => defaults.precision,
        };
        let hf_home = Self::parse_optional_path_from_env(Self::ENV_HF_HOME);
        let copy_to_volume =
            Self::parse_bool_from_env(Self::ENV_COPY_TO_VOLUME, defaults.copy_to_volume);
        let embedding_service_url =
            Self::parse_string_from_env(Self::ENV_EMBEDDING_URL, defaults.embedding_service_url);
        let reranker_service_url =
            Self::parse_string_from_env(Self::ENV_RERANKER_URL, defaults.reranker_service_url);

        Ok(Self {
            port,
            bind_addr,
            model_name,
            model_names,
            batch_sizes,
            device,
            max_length,
            max_concurrency,
            use_flash_attention,
            precision,
            hf_home,
            copy_to_volume,
            embedding_service_url,
            reranker_service_url,
        })
    }

    /// Validates basic invariants (does not touch the filesystem).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_length == 0 {
            return Err(ConfigError::MustBePositive {
                name: Self::ENV_MAX_LENGTH,
                value: self.max_length,
            });
        }

        if self.max_concurrency == 0 {
            return Err(ConfigError::MustBePositive {
                name: Self::ENV_MAX_CONCURRENCY,
                value: self.max_concurrency,
            });
        }

        if self.model_names.is_empty() {
            return Err(ConfigError::NoModels);
        }

        if self.batch_sizes.len() != self.model_names.len() {
            return Err(ConfigError::BatchSizeMismatch {
                models: self.model_names.len(),
                batch_sizes: self.batch_sizes.len(),
            });
        }

        if let Some(&value) = self.batch_sizes.iter().find(|&&b| b == 0) {
            return Err(ConfigError::MustBePositive {
                name: Self::ENV_BATCH_SIZES,
                value,
            });
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
    }

    fn parse_list_from_env(var_name: &str) -> Option<Vec<String>> {
        let values: Vec<String> = env::var(var_name)
            .ok()?
            .split(';')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        (!values.is_empty()).then_some(values)
    }

    fn parse_usize_from_env(var_name: &'static str, default: usize) -> Result<usize, ConfigError> {
        match env::var(var_name) {
            Ok(value) => Self::parse_usize(var_name, &value),
            Err(_) => Ok(default),
        }
    }

    fn parse_usize(var_name: &'static str, value: &str) -> Result<usize, ConfigError> {
        value
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidNumber {
                name: var_name,
                value: value.to_string(),
                source: e,
            })
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        env::var(var_name)
            .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
            .unwrap_or(default)
    }
}
