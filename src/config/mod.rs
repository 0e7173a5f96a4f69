//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "lectern";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 3;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_CONNECT_ATTEMPTS: u32 = 6;
const DEFAULT_DB_CONNECT_RETRY_SECS: u64 = 10;
const DEFAULT_KV_URL: &str = "redis://127.0.0.1/";
const DEFAULT_KV_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_SESSION_KEY_PREFIX: &str = "session";
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_CACHE_KEY_PREFIX: &str = "cache";
const DEFAULT_POST_READ_LIMIT: u64 = 500;
const DEFAULT_POST_LIST_LIMIT: u64 = 100;
const DEFAULT_USER_READ_LIMIT: u64 = 500;
const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 3_000;

/// Command-line arguments for the Lectern binary.
#[derive(Debug, Parser)]
#[command(name = "lectern", version, about = "Lectern blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LECTERN_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    #[command(name = "migrate")]
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the key-value store URL (`redis://…` or `memory://`).
    #[arg(long = "kv-url", value_name = "URL")]
    pub kv_url: Option<String>,

    /// Toggle the read-through cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the session lifetime.
    #[arg(long = "session-ttl-seconds", value_name = "SECONDS")]
    pub session_ttl_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub kv: KvSettings,
    pub session: SessionSettings,
    pub cache: CacheSettings,
    pub admission: AdmissionSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub connect_attempts: NonZeroU32,
    pub connect_retry: Duration,
}

/// Where sessions and cached reads live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvBackend {
    Redis(String),
    Memory,
}

#[derive(Debug, Clone)]
pub struct KvSettings {
    pub backend: KvBackend,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl: Duration,
    pub key_prefix: String,
}

#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    pub post_read_limit: NonZeroUsize,
    pub post_list_limit: NonZeroUsize,
    pub user_read_limit: NonZeroUsize,
    pub backend_timeout: Duration,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("LECTERN").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    kv: RawKvSettings,
    session: RawSessionSettings,
    cache: RawCacheSettings,
    admission: RawAdmissionSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(url) = overrides.kv_url.as_ref() {
            self.kv.url = Some(url.clone());
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(seconds) = overrides.session_ttl_seconds {
            self.session.ttl_seconds = Some(seconds);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            kv,
            session,
            cache,
            admission,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let kv = build_kv_settings(kv)?;
        let session = build_session_settings(session)?;
        let cache = build_cache_settings(cache)?;
        let admission = build_admission_settings(admission)?;

        if session.key_prefix == cache.key_prefix {
            return Err(LoadError::invalid(
                "cache.key_prefix",
                "must differ from session.key_prefix",
            ));
        }

        Ok(Self {
            server,
            logging,
            database,
            kv,
            session,
            cache,
            admission,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    let graceful_shutdown = seconds(graceful_secs, "server.graceful_shutdown_seconds")?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
    })
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

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;
    let connect_attempts = non_zero_u32(
        database
            .connect_attempts
            .unwrap_or(DEFAULT_DB_CONNECT_ATTEMPTS)
            .into(),
        "database.connect_attempts",
    )?;
    let connect_retry = seconds(
        database
            .connect_retry_seconds
            .unwrap_or(DEFAULT_DB_CONNECT_RETRY_SECS),
        "database.connect_retry_seconds",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
        connect_attempts,
        connect_retry,
    })
}

fn build_kv_settings(kv: RawKvSettings) -> Result<KvSettings, LoadError> {
    let url = kv.url.unwrap_or_else(|| DEFAULT_KV_URL.to_string());
    let url = url.trim();
    let backend = if url == "memory://" {
        KvBackend::Memory
    } else if url.starts_with("redis://") || url.starts_with("rediss://") {
        KvBackend::Redis(url.to_string())
    } else {
        return Err(LoadError::invalid(
            "kv.url",
            format!("unsupported scheme in `{url}`; expected redis://, rediss:// or memory://"),
        ));
    };

    let timeout = millis(
        kv.timeout_ms.unwrap_or(DEFAULT_KV_TIMEOUT_MS),
        "kv.timeout_ms",
    )?;

    Ok(KvSettings { backend, timeout })
}

fn build_session_settings(session: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let ttl = seconds(
        session.ttl_seconds.unwrap_or(DEFAULT_SESSION_TTL_SECS),
        "session.ttl_seconds",
    )?;
    let key_prefix = key_prefix(
        session.key_prefix,
        DEFAULT_SESSION_KEY_PREFIX,
        "session.key_prefix",
    )?;

    Ok(SessionSettings { ttl, key_prefix })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl = seconds(
        cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.ttl_seconds",
    )?;
    let key_prefix = key_prefix(cache.key_prefix, DEFAULT_CACHE_KEY_PREFIX, "cache.key_prefix")?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        ttl,
        key_prefix,
    })
}

fn build_admission_settings(
    admission: RawAdmissionSettings,
) -> Result<AdmissionSettings, LoadError> {
    Ok(AdmissionSettings {
        post_read_limit: non_zero_usize(
            admission.post_read_limit.unwrap_or(DEFAULT_POST_READ_LIMIT),
            "admission.post_read_limit",
        )?,
        post_list_limit: non_zero_usize(
            admission.post_list_limit.unwrap_or(DEFAULT_POST_LIST_LIMIT),
            "admission.post_list_limit",
        )?,
        user_read_limit: non_zero_usize(
            admission.user_read_limit.unwrap_or(DEFAULT_USER_READ_LIMIT),
            "admission.user_read_limit",
        )?,
        backend_timeout: millis(
            admission
                .backend_timeout_ms
                .unwrap_or(DEFAULT_BACKEND_TIMEOUT_MS),
            "admission.backend_timeout_ms",
        )?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    connect_attempts: Option<u32>,
    connect_retry_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawKvSettings {
    url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    ttl_seconds: Option<u64>,
    key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_seconds: Option<u64>,
    key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdmissionSettings {
    post_read_limit: Option<u64>,
    post_list_limit: Option<u64>,
    user_read_limit: Option<u64>,
    backend_timeout_ms: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn key_prefix(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    let prefix = value.unwrap_or_else(|| default.to_string());
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    if prefix.contains(':') {
        return Err(LoadError::invalid(key, "must not contain `:`"));
    }
    Ok(prefix.to_string())
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
