//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::engine::{DEFAULT_BULK_CONCURRENCY, EngineOptions};
use crate::cache::CacheConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "deskroute";
const ENV_PREFIX: &str = "DESKROUTE";
const DEFAULT_CANDIDATE_LIMIT: usize = 5;

/// Command-line arguments for the deskroute binary.
#[derive(Debug, Parser)]
#[command(
    name = "deskroute",
    version,
    about = "Workload-aware ticket routing engine"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "DESKROUTE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the best candidates, ranked by assignment score.
    Rank(RankArgs),
    /// Print aggregate workload statistics.
    Workload(DataArgs),
    /// Change one record's availability and print it recomputed.
    Availability(AvailabilityArgs),
}

impl Command {
    pub fn data(&self) -> &PathBuf {
        match self {
            Command::Rank(args) => &args.data.data,
            Command::Workload(args) => &args.data,
            Command::Availability(args) => &args.data.data,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// JSON file seeding the in-memory backend.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub data: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct RankArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Restrict to one category; without it every record is ranked.
    #[arg(long, value_name = "ID")]
    pub category: Option<i64>,

    /// Maximum number of candidates to print.
    #[arg(long, default_value_t = DEFAULT_CANDIDATE_LIMIT)]
    pub limit: usize,
}

#[derive(Debug, Args, Clone)]
pub struct AvailabilityArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Specialization record id.
    #[arg(long, value_name = "ID")]
    pub id: i64,

    /// New availability.
    #[arg(
        long,
        value_name = "BOOL",
        action = clap::ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub available: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the window in which identical fetches are coalesced.
    #[arg(long = "cache-coalesce-window-ms", value_name = "MILLIS", global = true)]
    pub coalesce_window_ms: Option<u64>,

    /// Override the bulk mutation concurrency.
    #[arg(long = "bulk-concurrency", value_name = "COUNT", global = true)]
    pub bulk_concurrency: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheConfig,
    pub engine: EngineSettings,
}

impl Settings {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            cache: self.cache.clone(),
            bulk_concurrency: self.engine.bulk_concurrency.get(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub bulk_concurrency: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    engine: RawEngineSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(window) = overrides.coalesce_window_ms {
            self.cache.coalesce_window_ms = Some(window);
        }
        if let Some(concurrency) = overrides.bulk_concurrency {
            self.engine.bulk_concurrency = Some(concurrency);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            engine,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            engine: build_engine_settings(engine)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheConfig, LoadError> {
    let defaults = CacheConfig::default();
    Ok(CacheConfig {
        specializations_ttl_secs: non_zero(
            cache.specializations_ttl_secs,
            defaults.specializations_ttl_secs,
            "cache.specializations_ttl_secs",
        )?,
        workload_ttl_secs: non_zero(
            cache.workload_ttl_secs,
            defaults.workload_ttl_secs,
            "cache.workload_ttl_secs",
        )?,
        catalog_ttl_secs: non_zero(
            cache.catalog_ttl_secs,
            defaults.catalog_ttl_secs,
            "cache.catalog_ttl_secs",
        )?,
        categories_ttl_secs: non_zero(
            cache.categories_ttl_secs,
            defaults.categories_ttl_secs,
            "cache.categories_ttl_secs",
        )?,
        tickets_ttl_secs: non_zero(
            cache.tickets_ttl_secs,
            defaults.tickets_ttl_secs,
            "cache.tickets_ttl_secs",
        )?,
        coalesce_window_ms: non_zero(
            cache.coalesce_window_ms,
            defaults.coalesce_window_ms,
            "cache.coalesce_window_ms",
        )?,
        cleanup_interval_secs: non_zero(
            cache.cleanup_interval_secs,
            defaults.cleanup_interval_secs,
            "cache.cleanup_interval_secs",
        )?,
        stale_multiplier: non_zero(
            cache.stale_multiplier,
            defaults.stale_multiplier,
            "cache.stale_multiplier",
        )?,
    })
}

fn build_engine_settings(engine: RawEngineSettings) -> Result<EngineSettings, LoadError> {
    let value = engine.bulk_concurrency.unwrap_or(DEFAULT_BULK_CONCURRENCY);
    let bulk_concurrency = NonZeroUsize::new(value).ok_or_else(|| {
        LoadError::invalid("engine.bulk_concurrency", "must be greater than zero")
    })?;
    Ok(EngineSettings { bulk_concurrency })
}

fn non_zero<T>(value: Option<T>, default: T, key: &'static str) -> Result<T, LoadError>
where
    T: PartialEq + Default,
{
    let value = value.unwrap_or(default);
    if value == T::default() {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    specializations_ttl_secs: Option<u64>,
    workload_ttl_secs: Option<u64>,
    catalog_ttl_secs: Option<u64>,
    categories_ttl_secs: Option<u64>,
    tickets_ttl_secs: Option<u64>,
    coalesce_window_ms: Option<u64>,
    cleanup_interval_secs: Option<u64>,
    stale_multiplier: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEngineSettings {
    bulk_concurrency: Option<usize>,
}
