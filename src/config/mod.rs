//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    path::PathBuf,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::MAX_TTL_SECONDS;

pub use cli::{
    CacheArgs, CacheClearArgs, CacheCommand, CliArgs, Command, DatabaseOverride, MigrateArgs,
    RemoteCacheOverride, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "whelmed";
const ENV_PREFIX: &str = "WHELMED";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_DB_USER: &str = "postgres";
const DEFAULT_DB_PASSWORD: &str = "password";
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "blog_db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_CACHE_EXPIRE_SECS: u64 = 86_400;
const DEFAULT_CACHE_REMOTE_URL: &str = "redis://localhost:6379/0";
const DEFAULT_CACHE_LOCAL_CAPACITY: usize = 10_000;
const DEFAULT_CACHE_KEY_PREFIX: &str = "blog";
const DEFAULT_MAIL_PORT: u16 = 587;
const DEFAULT_MAIL_FROM_NAME: &str = "The Whelmed Engineers";
const DEFAULT_CONTACT_RECIPIENT: &str = "atharva@whelmedthinker.com";
const DEFAULT_SITE_TITLE: &str = "atharva";
const DEFAULT_SITE_DESCRIPTION: &str = "Engineer, tinkerer, occasional scribbler.";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub mail: MailSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    /// Directory served under `/assets` (resume and other linked files).
    pub assets_dir: PathBuf,
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
    pub url: String,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub expire_seconds: u64,
    pub use_remote: bool,
    pub remote_url: String,
    pub local_capacity: NonZeroUsize,
    pub key_prefix: String,
}

/// SMTP settings. `server == None` disables outbound mail.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub server: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: Option<String>,
    pub from_name: String,
    pub starttls: bool,
    pub ssl_tls: bool,
    pub validate_certs: bool,
    pub contact_recipient: String,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub description: String,
    pub contact_email: String,
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        Some(Command::Cache(args)) => raw.apply_remote_cache_override(&args.remote),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
///
/// A `.env` file in the working directory is loaded into the environment first.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    mail: RawMailSettings,
    site: RawSiteSettings,
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

        self.apply_database_override(&overrides.database);
        self.apply_remote_cache_override(&overrides.cache);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }

    fn apply_remote_cache_override(&mut self, overrides: &RemoteCacheOverride) {
        if let Some(url) = overrides.remote_url.as_ref() {
            self.cache.remote_url = Some(url.clone());
        }
        if let Some(use_remote) = overrides.use_remote {
            self.cache.use_remote = Some(use_remote);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            mail,
            site,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            mail: build_mail_settings(mail)?,
            site: build_site_settings(site),
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
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let assets_dir = server
        .assets_dir
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR));

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
        assets_dir,
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
    let explicit = database.url.and_then(|value| non_blank(&value));

    let url = match explicit {
        Some(url) => url,
        None => {
            let port = database.port.unwrap_or(DEFAULT_DB_PORT);
            if port == 0 {
                return Err(LoadError::invalid(
                    "database.port",
                    "port must be greater than zero",
                ));
            }
            format!(
                "postgres://{}:{}@{}:{}/{}",
                database.user.as_deref().unwrap_or(DEFAULT_DB_USER),
                database.password.as_deref().unwrap_or(DEFAULT_DB_PASSWORD),
                database.host.as_deref().unwrap_or(DEFAULT_DB_HOST),
                port,
                database.name.as_deref().unwrap_or(DEFAULT_DB_NAME),
            )
        }
    };

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let remote_url = cache
        .remote_url
        .and_then(|value| non_blank(&value))
        .unwrap_or_else(|| DEFAULT_CACHE_REMOTE_URL.to_string());

    let capacity = cache.local_capacity.unwrap_or(DEFAULT_CACHE_LOCAL_CAPACITY);
    let local_capacity = NonZeroUsize::new(capacity)
        .ok_or_else(|| LoadError::invalid("cache.local_capacity", "must be greater than zero"))?;

    let key_prefix = cache
        .key_prefix
        .and_then(|value| non_blank(&value))
        .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_string());
    if key_prefix.contains('*') {
        return Err(LoadError::invalid(
            "cache.key_prefix",
            "prefix must not contain `*`",
        ));
    }

    let expire_seconds = cache.expire_seconds.unwrap_or(DEFAULT_CACHE_EXPIRE_SECS);
    if expire_seconds > MAX_TTL_SECONDS {
        return Err(LoadError::invalid(
            "cache.expire_seconds",
            format!("must not exceed {MAX_TTL_SECONDS} seconds"),
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        expire_seconds,
        use_remote: cache.use_remote.unwrap_or(false),
        remote_url,
        local_capacity,
        key_prefix,
    })
}

fn build_mail_settings(mail: RawMailSettings) -> Result<MailSettings, LoadError> {
    let port = mail.port.unwrap_or(DEFAULT_MAIL_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "mail.port",
            "port must be greater than zero",
        ));
    }

    let starttls = mail.starttls.unwrap_or(true);
    let ssl_tls = mail.ssl_tls.unwrap_or(false);
    if starttls && ssl_tls {
        return Err(LoadError::invalid(
            "mail.ssl_tls",
            "cannot be combined with mail.starttls",
        ));
    }

    Ok(MailSettings {
        server: mail.server.and_then(|value| non_blank(&value)),
        port,
        username: mail.username.and_then(|value| non_blank(&value)),
        password: mail.password,
        from: mail.from.and_then(|value| non_blank(&value)),
        from_name: mail
            .from_name
            .unwrap_or_else(|| DEFAULT_MAIL_FROM_NAME.to_string()),
        starttls,
        ssl_tls,
        validate_certs: mail.validate_certs.unwrap_or(true),
        contact_recipient: mail
            .contact_recipient
            .and_then(|value| non_blank(&value))
            .unwrap_or_else(|| DEFAULT_CONTACT_RECIPIENT.to_string()),
    })
}

fn build_site_settings(site: RawSiteSettings) -> SiteSettings {
    SiteSettings {
        title: site
            .title
            .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
        description: site
            .description
            .unwrap_or_else(|| DEFAULT_SITE_DESCRIPTION.to_string()),
        contact_email: site
            .contact_email
            .unwrap_or_else(|| DEFAULT_CONTACT_RECIPIENT.to_string()),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    assets_dir: Option<PathBuf>,
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
    user: Option<String>,
    password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    name: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    expire_seconds: Option<u64>,
    use_remote: Option<bool>,
    remote_url: Option<String>,
    local_capacity: Option<usize>,
    key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    server: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    from: Option<String>,
    from_name: Option<String>,
    starttls: Option<bool>,
    ssl_tls: Option<bool>,
    validate_certs: Option<bool>,
    contact_recipient: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    description: Option<String>,
    contact_email: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
