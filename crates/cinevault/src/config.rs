use std::path::PathBuf;

use dirs::home_dir;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::{CineError, CineResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CineConfig {
    pub rest: RestConfig,
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub telemetry: TelemetryConfig,
}

impl CineConfig {
    /// Layers the config file (explicit path, or `~/.cinevault/config.yaml`
    /// when present) under `CINEVAULT_*` environment overrides.
    pub fn load(path: Option<PathBuf>) -> CineResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Env values stay strings; typed fields are converted on deserialize so
    /// keys like `01234567` survive intact.
    fn load_with_env(
        path: Option<PathBuf>,
        env: Option<config::Map<String, String>>,
    ) -> CineResult<Self> {
        let mut settings = config::Config::builder();
        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path));
        } else {
            let default = default_config_path();
            if default.exists() {
                settings = settings.add_source(config::File::from(default));
            }
        }
        settings = settings.add_source(
            config::Environment::with_prefix("CINEVAULT")
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );
        let cfg = settings
            .build()
            .map_err(|err| CineError::Configuration(err.to_string()))?;
        cfg.try_deserialize()
            .map_err(|err| CineError::Configuration(err.to_string()))
    }

    /// Startup checks. A missing storage connection string is fatal.
    pub fn validate(&self) -> CineResult<()> {
        match self.storage.url.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(CineError::Configuration(
                    "storage connection string (storage.url) is not configured".into(),
                ))
            }
            Some(_) => {}
        }
        self.catalog
            .validate()
            .map_err(|err| CineError::Configuration(err.to_string()))?;
        self.rest
            .bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| CineError::Configuration(format!("rest.bind_addr: {err}")))?;
        Ok(())
    }

    pub fn template() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|dir| dir.join("cinevault"))
            .unwrap_or_else(|| PathBuf::from("./data"));
        Self {
            storage: StorageConfig {
                url: Some(format!("lmdb://{}", data_dir.join("movies").display())),
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }
}

pub fn default_config_path() -> PathBuf {
    home_dir()
        .map(|dir| dir.join(".cinevault").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("./cinevault.yaml"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    pub bind_addr: String,
    #[serde(deserialize_with = "list_or_csv")]
    pub cors_allowed_origins: Vec<String>,
}

fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Csv(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            cors_allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `memory://`, `lmdb://<dir>` or a bare directory path.
    pub url: Option<String>,
    pub map_size_mb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: None,
            map_size_mb: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CatalogConfig {
    #[validate(url)]
    pub base_url: String,
    pub api_key: Option<String>,
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.omdbapi.com/".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_format: LogFormat,
    pub enable_metrics: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            enable_metrics: true,
        }
    }
}
