use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the whelmed binary.
#[derive(Debug, Parser)]
#[command(name = "whelmed", version, about = "Portfolio and scribblings server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "WHELMED_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP server.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    #[command(name = "migrate")]
    Migrate(MigrateArgs),
    /// Inspect or clear the response cache.
    #[command(name = "cache")]
    Cache(CacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RemoteCacheOverride {
    /// Override the remote cache URL.
    #[arg(long = "cache-remote-url", value_name = "URL")]
    pub remote_url: Option<String>,

    /// Toggle the remote cache tier.
    #[arg(
        long = "cache-use-remote",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub use_remote: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub cache: RemoteCacheOverride,

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
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(flatten)]
    pub remote: RemoteCacheOverride,

    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Print cache tier information.
    #[command(name = "info")]
    Info,
    /// Remove every cached key starting with the given prefix.
    #[command(name = "clear")]
    Clear(CacheClearArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CacheClearArgs {
    /// Key prefix to clear; defaults to the configured cache key prefix.
    #[arg(long = "prefix", value_name = "PREFIX")]
    pub prefix: Option<String>,
}
