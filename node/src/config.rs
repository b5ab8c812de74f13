use anyhow::{bail, Result};
use clap::ArgMatches;
use config::{Config, File as ConfigFile};
use std::path::{Path, PathBuf};

/// Secret shipped for local development only
pub const DEFAULT_SECRET_KEY: &str = "dev-secret-key-change-in-production";

/// Configuration file picked up when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub secret_key: String,
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    pub dataset_path: PathBuf,
    pub log_level: String,
    pub log_format: String,
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    /// Layer the optional config file under the process environment
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            path.exists().then_some(path)
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::default());

        let mut config = Self::from_config(&builder.build()?)?;
        config.config_path = resolved_path;
        Ok(config)
    }

    /// Read every key from an already layered `Config`, applying defaults
    pub fn from_config(config: &Config) -> Result<Self> {
        let debug = get_bool_value(config, "debug", false);
        let data_dir = PathBuf::from(get_string_value(config, "data_dir").unwrap_or_else(|| "data".into()));

        let port = match get_string_value(config, "port") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) => port,
                Err(err) => bail!("PORT must be a valid port number, got '{raw}': {err}"),
            },
            None => 5000,
        };

        let default_level = if debug { "debug" } else { "info" };

        Ok(Self {
            secret_key: get_string_value(config, "secret_key").unwrap_or_else(|| DEFAULT_SECRET_KEY.into()),
            debug,
            host: get_string_value(config, "host").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            model_path: get_string_value(config, "model_path")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_model_path(&data_dir)),
            scaler_path: get_string_value(config, "scaler_path")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_scaler_path(&data_dir)),
            dataset_path: get_string_value(config, "dataset_path")
                .map(PathBuf::from)
                .unwrap_or_else(|| default_dataset_path(&data_dir)),
            data_dir,
            log_level: get_string_value(config, "log_level").unwrap_or_else(|| default_level.into()),
            log_format: get_string_value(config, "log_format").unwrap_or_else(|| "pretty".into()),
            config_path: None,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("PORT must be greater than zero");
        }
        if self.host.trim().is_empty() {
            bail!("HOST must not be empty");
        }
        for (label, path) in [
            ("DATA_DIR", &self.data_dir),
            ("MODEL_PATH", &self.model_path),
            ("SCALER_PATH", &self.scaler_path),
            ("DATASET_PATH", &self.dataset_path),
        ] {
            if path.as_os_str().is_empty() {
                bail!("{label} must not be empty");
            }
        }
        if !matches!(self.log_format.as_str(), "pretty" | "compact") {
            bail!("LOG_FORMAT must be 'pretty' or 'compact', got '{}'", self.log_format);
        }
        Ok(())
    }

    /// Warnings that do not prevent startup
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.debug && self.secret_key == DEFAULT_SECRET_KEY {
            warnings.push("SECRET_KEY is the development default; set a real secret outside debug mode".to_string());
        }
        warnings
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_model_path(data_dir: &Path) -> PathBuf {
    data_dir.join("models").join("yield_predictor.bin")
}

fn default_scaler_path(data_dir: &Path) -> PathBuf {
    data_dir.join("models").join("scaler.bin")
}

fn default_dataset_path(data_dir: &Path) -> PathBuf {
    data_dir.join("raw").join("sample_data.csv")
}

fn get_string_value(config: &Config, key: &str) -> Option<String> {
    config
        .get_string(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn get_bool_value(config: &Config, key: &str, default: bool) -> bool {
    if let Ok(value) = config.get_bool(key) {
        return value;
    }
    match get_string_value(config, key) {
        Some(raw) => matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

pub fn load_config_with_overrides(matches: &ArgMatches) -> Result<AppConfig> {
    let config_path = matches.get_one::<String>("config").map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

pub fn apply_overrides(matches: &ArgMatches, config: &mut AppConfig) {
    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.data_dir = PathBuf::from(data_dir);
        config.model_path = default_model_path(&config.data_dir);
        config.scaler_path = default_scaler_path(&config.data_dir);
        config.dataset_path = default_dataset_path(&config.data_dir);
    }

    if let Some(path) = matches.get_one::<String>("model-path") {
        config.model_path = PathBuf::from(path);
    }

    if let Some(path) = matches.get_one::<String>("scaler-path") {
        config.scaler_path = PathBuf::from(path);
    }

    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }

    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    if matches.get_flag("debug") {
        config.debug = true;
        config.log_level = "debug".to_string();
    }
}
