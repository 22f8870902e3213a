use energy_client::store::roster_queries::RosterColumns;
use serde::Deserialize;
use std::{env, fs, path::PathBuf};

const CONFIG_ENV: &str = "COLLECTOR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "collector-config.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("environment variable {0} is not set")]
    MissingServiceKey(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub roster_file: PathBuf,
    pub energy_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub visualization_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            roster_file: PathBuf::from("csv/20250328_단지_기본정보_수도권.csv"),
            energy_dir: PathBuf::from("data/energy"),
            analysis_dir: PathBuf::from("data/analysis"),
            visualization_dir: PathBuf::from("data/visualization"),
            processed_dir: PathBuf::from("data/processed"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the service key.
    pub service_key_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://apis.data.go.kr/1613000/ApHusEnergyUseInfoOfferServiceV2/getHsmpApHusUsgQtyInfoSearchV2"
                .to_string(),
            timeout_secs: 30,
            service_key_env: "SERVICE_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Trends fitted on fewer points are left out of the merged table.
    pub min_data_points: usize,
    /// Slopes below this magnitude are reported as steady.
    pub slope_threshold: f64,
    /// Mean correlation above which a complex counts as high efficiency.
    pub efficiency_threshold: f64,
    pub efficiency_energy_type: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_data_points: 5,
            slope_threshold: 0.001,
            efficiency_threshold: 0.619,
            efficiency_energy_type: "waterCool".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub roster: RosterColumns,
    pub analysis: AnalysisConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load the configuration named by `COLLECTOR_CONFIG`.
    ///
    /// Without the variable the default path is tried and, when absent, the
    /// built-in defaults are used. An explicitly named file must exist.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path),
            Err(_) if fs::metadata(DEFAULT_CONFIG_PATH).is_ok() => Self::from_file(DEFAULT_CONFIG_PATH),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// The API service key from the process environment.
    pub fn service_key(&self) -> Result<String, ConfigError> {
        match env::var(&self.api.service_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingServiceKey(self.api.service_key_env.clone())),
        }
    }
}
