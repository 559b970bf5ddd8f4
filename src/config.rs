use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::overdue::CutoffPolicy;

/// Main configuration structure for Cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CadenceConfig {
    /// Database settings
    pub database: DatabaseConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Overdue detector settings
    pub detector: DetectorConfig,
    /// Minutes document settings
    pub minutes: MinutesConfig,
    /// Notification dispatch settings
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file path or connection string
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON-formatted structured logs
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorConfig {
    /// Seconds between overdue scans
    pub scan_interval_seconds: u64,
    /// Hour of the local day after which a pending appointment is overdue
    pub cutoff_hour: u32,
    /// Fixed UTC offset for cutoff evaluation; host-local when unset
    pub utc_offset_minutes: Option<i32>,
}

impl DetectorConfig {
    pub fn cutoff_policy(&self) -> CutoffPolicy {
        match self.utc_offset_minutes {
            Some(offset) => CutoffPolicy {
                cutoff_hour: self.cutoff_hour,
                utc_offset_minutes: offset,
            },
            None => CutoffPolicy::local(self.cutoff_hour),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MinutesConfig {
    /// Textual prefix (and counter family) for minutes codes
    pub code_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Outbound sends per second
    pub sends_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
    /// Per-send timeout in seconds
    pub send_timeout_seconds: u64,
    /// Delivery attempts before a message is marked failed
    pub max_attempts: u32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://.cadence/cadence.db".to_string(),
                max_connections: 10,
                auto_migrate: true,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
            detector: DetectorConfig {
                scan_interval_seconds: 300, // 5 minutes
                cutoff_hour: 17,
                utc_offset_minutes: None,
            },
            minutes: MinutesConfig {
                code_prefix: "MIN".to_string(),
            },
            notifications: NotificationConfig {
                sends_per_second: 5,
                burst_capacity: 20,
                send_timeout_seconds: 10,
                max_attempts: 3,
            },
        }
    }
}

impl CadenceConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration files (cadence.toml, .cadence-rc)
    /// 3. Environment variables (prefixed with CADENCE_)
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .add_source(Config::try_from(&defaults)?);

        if Path::new("cadence.toml").exists() {
            builder = builder.add_source(File::with_name("cadence"));
        }

        if Path::new(".cadence-rc").exists() {
            builder = builder.add_source(File::with_name(".cadence-rc"));
        }

        builder = builder.add_source(
            Environment::with_prefix("CADENCE")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

static CONFIG: OnceLock<CadenceConfig> = OnceLock::new();

/// Process-wide configuration, loaded on first access.
pub fn config() -> Result<&'static CadenceConfig> {
    if let Some(existing) = CONFIG.get() {
        return Ok(existing);
    }
    let loaded = CadenceConfig::load()?;
    Ok(CONFIG.get_or_init(|| loaded))
}

/// Eagerly load and cache configuration.
pub fn init_config() -> Result<&'static CadenceConfig> {
    config()
}
