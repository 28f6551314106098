use anyhow::{bail, Context};
use clap::{ArgAction, Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportMode {
    Json,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    Gzip,
    None,
}

/// Agent configuration. Flags are parsed first; the mirrored environment
/// variables are applied afterwards and take precedence.
#[derive(Debug, Clone, Parser)]
#[command(name = "pulsemon-agent", version, about = "Telemetry collection agent")]
pub struct AgentConfig {
    /// Server endpoint address. Environment variable ADDRESS
    #[arg(short = 'a', long = "address", default_value = "localhost:8080")]
    pub address: String,

    /// Metrics poll interval, seconds. Environment variable POLL_INTERVAL
    #[arg(short = 'p', long = "poll-interval", default_value_t = 2)]
    pub poll_interval_secs: u64,

    /// Metrics report interval, seconds. Environment variable REPORT_INTERVAL
    #[arg(short = 'r', long = "report-interval", default_value_t = 10)]
    pub report_interval_secs: u64,

    /// Log level: DEBUG, INFO, WARN or ERROR. Environment variable LOG_LEVEL
    #[arg(long = "log", default_value = "INFO")]
    pub log_level: String,

    /// Report method: json or raw. Environment variable REPORT_MODE
    #[arg(short = 'm', long = "report-mode", value_enum, default_value_t = ReportMode::Json)]
    pub report_mode: ReportMode,

    /// Request body compression: gzip or none. Environment variable COMPRESS
    #[arg(short = 'c', long = "compress", value_enum, default_value_t = Compression::Gzip)]
    pub compress: Compression,

    /// Send all metrics of a poll in one batch request. Environment variable BATCH
    #[arg(short = 'b', long = "batch", default_value_t = true, action = ArgAction::Set)]
    pub batch: bool,

    /// Request signing key; empty disables signing. Environment variable KEY
    #[arg(short = 'k', long = "key", default_value = "")]
    pub key: String,

    /// Number of report workers; 0 sends from a single task. Environment variable RATE_LIMIT
    #[arg(short = 'l', long = "rate-limit", default_value_t = 0)]
    pub rate_limit: usize,
}

impl AgentConfig {
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
        if let Ok(raw) = std::env::var("POLL_INTERVAL") {
            self.poll_interval_secs = raw
                .parse()
                .context("invalid value in environment variable POLL_INTERVAL")?;
        }
        if let Ok(raw) = std::env::var("REPORT_INTERVAL") {
            self.report_interval_secs = raw
                .parse()
                .context("invalid value in environment variable REPORT_INTERVAL")?;
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
        if let Ok(mode) = std::env::var("REPORT_MODE") {
            self.report_mode = match mode.as_str() {
                "json" => ReportMode::Json,
                "raw" => ReportMode::Raw,
                other => bail!("unknown report mode in environment variable: {other}"),
            };
        }
        if let Ok(compress) = std::env::var("COMPRESS") {
            match compress.as_str() {
                "gzip" => self.compress = Compression::Gzip,
                "none" => self.compress = Compression::None,
                other => {
                    eprintln!("unknown compress method {other:?} in environment, using gzip");
                    self.compress = Compression::Gzip;
                }
            }
        }
        if let Ok(raw) = std::env::var("BATCH") {
            self.batch = raw
                .parse()
                .context("invalid value in environment variable BATCH")?;
        }
        if let Ok(key) = std::env::var("KEY") {
            self.key = key;
        }
        if let Ok(raw) = std::env::var("RATE_LIMIT") {
            self.rate_limit = raw
                .parse()
                .context("invalid value in environment variable RATE_LIMIT")?;
        }
        Ok(())
    }

    /// Capacity of the poller → reporter channel: enough for every poll
    /// of one report cycle plus one, or a fixed 128 when a worker pool
    /// drains it.
    pub fn channel_capacity(&self) -> usize {
        if self.rate_limit > 0 {
            return 128;
        }
        let poll = self.poll_interval_secs.max(1);
        let ticks = self.report_interval_secs.div_ceil(poll);
        (ticks as usize + 1).max(1)
    }
}
