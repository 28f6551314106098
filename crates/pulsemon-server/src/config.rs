use anyhow::Context;
use clap::{ArgAction, Parser};

/// Server configuration. Flags are parsed first; the mirrored
/// environment variables are applied afterwards and take precedence.
#[derive(Debug, Clone, Parser)]
#[command(name = "pulsemon-server", version, about = "Metrics collection server")]
pub struct ServerConfig {
    /// Listen address. Environment variable ADDRESS
    #[arg(short = 'a', long = "address", default_value = "localhost:8080")]
    pub address: String,

    /// Log level: DEBUG, INFO, WARN or ERROR. Environment variable LOG_LEVEL
    #[arg(long = "log", default_value = "INFO")]
    pub log_level: String,

    /// Seconds between snapshot writes; 0 writes synchronously after each
    /// successful update. Environment variable STORE_INTERVAL
    #[arg(short = 'i', long = "store-interval", default_value_t = 300)]
    pub store_interval: u64,

    /// Snapshot file path. Environment variable FILE_STORAGE_PATH
    #[arg(short = 'f', long = "file-storage-path", default_value = "metrics.dat")]
    pub file_storage_path: String,

    /// Restore metrics from the snapshot file on start. Environment variable RESTORE
    #[arg(short = 'r', long = "restore", default_value_t = true, action = ArgAction::Set)]
    pub restore: bool,

    /// Relational database path; empty keeps metrics in memory.
    /// Environment variable DATABASE_DSN
    #[arg(short = 'd', long = "database-dsn", default_value = "")]
    pub database_dsn: String,

    /// Request verification key; empty disables verification.
    /// Environment variable KEY
    #[arg(short = 'k', long = "key", default_value = "")]
    pub key: String,
}

impl ServerConfig {
    /// Parses CLI flags, then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::parse();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(address) = std::env::var("ADDRESS") {
            self.address = address;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            match level.as_str() {
                "DEBUG" | "INFO" | "WARN" | "ERROR" => self.log_level = level,
                other => {
                    eprintln!("unknown log level {other:?} in environment, using INFO");
                    self.log_level = "INFO".to_string();
                }
            }
        }
        if let Ok(raw) = std::env::var("STORE_INTERVAL") {
            self.store_interval = raw
                .parse()
                .context("invalid value in environment variable STORE_INTERVAL")?;
        }
        if let Ok(path) = std::env::var("FILE_STORAGE_PATH") {
            self.file_storage_path = path;
        }
        if let Ok(raw) = std::env::var("RESTORE") {
            self.restore = raw
                .parse()
                .context("invalid value in environment variable RESTORE")?;
        }
        if let Ok(dsn) = std::env::var("DATABASE_DSN") {
            self.database_dsn = dsn;
        }
        if let Ok(key) = std::env::var("KEY") {
            self.key = key;
        }
        Ok(())
    }
}
