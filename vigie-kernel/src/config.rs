use crate::classifier::ClassificationTable;
use crate::snmp::DEFAULT_SNMP_PORT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::UtcOffset;
use tokio::fs;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "VIGIE_KERNEL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "kernel.yaml";
/// Une semaine
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Yaml { path: PathBuf, source: serde_yaml::Error },
    #[error("invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub polling: PollingConf,
    pub snmp: SnmpConf,
    pub storage: StorageConf,
    pub http: HttpConf,
    pub mqtt: Option<MqttConf>,
    /// Surcharges de la table de classification, fusionnées sur la table par défaut
    pub classification: Option<ClassificationTable>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConf {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub max_concurrent_polls: usize,
    pub utc_offset_hours: i8,
}

impl Default for PollingConf {
    fn default() -> Self {
        Self { enabled: true, interval_minutes: 5, max_concurrent_polls: 16, utc_offset_hours: 7 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SnmpConf {
    pub port: u16,
}

impl Default for SnmpConf {
    fn default() -> Self {
        Self { port: DEFAULT_SNMP_PORT }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConf {
    pub targets_file: PathBuf,
    pub metrics_file: PathBuf,
}

impl Default for StorageConf {
    fn default() -> Self {
        Self {
            targets_file: PathBuf::from("./data/targets.json"),
            metrics_file: PathBuf::from("./data/metrics.jsonl"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
}

fn default_mqtt_port() -> u16 {
    1883
}

impl KernelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_minutes.saturating_mul(60))
    }

    pub fn report_offset(&self) -> Result<UtcOffset, ConfigError> {
        UtcOffset::from_hms(self.polling.utc_offset_hours, 0, 0)
            .map_err(|e| ConfigError::Invalid(format!("polling.utc_offset_hours: {e}")))
    }

    /// Table par défaut + surcharges éventuelles
    pub fn classification_table(&self) -> ClassificationTable {
        match &self.classification {
            Some(overrides) => ClassificationTable::default().merge(overrides.clone()),
            None => ClassificationTable::default(),
        }
    }

    /// SNMP_POLL_INTERVAL (minutes) et ENABLE_SCHEDULER
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("SNMP_POLL_INTERVAL") {
            self.polling.interval_minutes = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { name: "SNMP_POLL_INTERVAL", value: value.clone() })?;
        }
        if let Some(value) = lookup("ENABLE_SCHEDULER") {
            self.polling.enabled = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => return Err(ConfigError::Env { name: "ENABLE_SCHEDULER", value }),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling.interval_minutes < 1 {
            return Err(ConfigError::Invalid("polling.interval_minutes must be at least 1".into()));
        }
        if self.polling.interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "polling.interval_minutes must be at most {MAX_INTERVAL_MINUTES}"
            )));
        }
        if self.polling.max_concurrent_polls < 1 {
            return Err(ConfigError::Invalid("polling.max_concurrent_polls must be at least 1".into()));
        }
        if !(-23..=23).contains(&self.polling.utc_offset_hours) {
            return Err(ConfigError::Invalid("polling.utc_offset_hours must be within ±23".into()));
        }
        self.classification_table().validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

pub fn parse_config(path: &Path, txt: &str) -> Result<KernelConfig, ConfigError> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    serde_yaml::from_str(txt).map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source })
}

pub async fn load_config_from(path: &Path) -> Result<KernelConfig, ConfigError> {
    if !path.exists() {
        warn!(path = %path.display(), "no config file, using defaults");
        return Ok(KernelConfig::default());
    }
    let txt = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let config = parse_config(path, &txt)?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Fichier ($VIGIE_KERNEL_CONFIG ou kernel.yaml), puis variables d'environnement, puis validation
pub async fn load_config() -> Result<KernelConfig, ConfigError> {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
    let mut config = load_config_from(Path::new(&path)).await?;
    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}
