use std::{process, sync::Arc, time::Duration};

use lettre::Address;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use whelmed::{
    application::{
        blog::BlogService, contact::ContactService, error::AppError, repos::BlogRepo,
        sections::SectionService,
    },
    cache::{CacheConfig, CacheManager},
    config::{self, CacheCommand, Command, Settings},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        assets::DiskAssets,
        http::{self, HttpState},
        mail, telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Migrate(_) => run_migrate(settings).await,
        Command::Cache(args) => run_cache(settings, args.command).await,
    }
}

async fn connect_repositories(settings: &Settings) -> Result<Arc<PostgresRepositories>, AppError> {
    let pool = PostgresRepositories::connect(
        &settings.database.url,
        settings.database.max_connections.get(),
    )
    .await
    .map_err(|err| InfraError::database(err.to_string()))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn run_migrate(settings: Settings) -> Result<(), AppError> {
    connect_repositories(&settings).await?;
    info!("Database migrations applied");
    Ok(())
}

async fn run_cache(settings: Settings, command: CacheCommand) -> Result<(), AppError> {
    let cache = CacheManager::connect(CacheConfig::from(&settings.cache)).await;

    match command {
        CacheCommand::Info => {
            if !cache.has_remote() {
                warn!(
                    "No remote cache connected; in-memory entries belong to the serving process \
                     and are not visible here"
                );
            }
            let info = serde_json::to_string_pretty(&cache.info())
                .map_err(|err| AppError::unexpected(err.to_string()))?;
            println!("{info}");
        }
        CacheCommand::Clear(args) => {
            if !cache.has_remote() {
                return Err(InfraError::configuration(
                    "cache clear needs a reachable remote cache; enable cache.use_remote \
                     or restart the server to drop its in-memory entries",
                )
                .into());
            }
            let prefix = args
                .prefix
                .unwrap_or_else(|| format!("{}:", settings.cache.key_prefix));
            let cleared = cache.clear_prefix(&prefix).await;
            println!(
                "cleared {} remote key(s) with prefix `{prefix}`",
                cleared.remote
            );
        }
    }

    Ok(())
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let repositories = connect_repositories(&settings).await?;
    let cache = Arc::new(CacheManager::connect(CacheConfig::from(&settings.cache)).await);
    info!(
        remote = cache.has_remote(),
        enabled = cache.config().enabled,
        "Cache ready"
    );
    let state = build_http_state(&settings, repositories, cache.clone())?;

    let result = serve_http(&settings, state).await;
    cache.shutdown();
    result
}

fn build_http_state(
    settings: &Settings,
    repositories: Arc<PostgresRepositories>,
    cache: Arc<CacheManager>,
) -> Result<HttpState, AppError> {
    let posts: Arc<dyn BlogRepo> = repositories;
    let blog = Arc::new(BlogService::new(posts.clone(), cache.clone()));
    let sections = Arc::new(SectionService::new(blog.clone()));

    let recipient = settings
        .mail
        .contact_recipient
        .parse::<Address>()
        .map_err(|err| {
            InfraError::configuration(format!(
                "mail.contact_recipient `{}` is not an email address: {err}",
                settings.mail.contact_recipient
            ))
        })?;
    let mailer = mail::build_mailer(&settings.mail).map_err(InfraError::from)?;
    let contact = Arc::new(ContactService::new(
        mailer,
        recipient,
        settings.site.title.clone(),
    ));

    Ok(HttpState {
        blog,
        sections,
        contact,
        cache,
        posts,
        site: Arc::new(settings.site.clone()),
        assets: Arc::new(DiskAssets::new(settings.server.assets_dir.clone())),
    })
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "Listening");

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });
    let mut handle = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut handle => return finish_server(joined),
        _ = shutdown_signal() => {}
    }

    shutdown.notify_one();
    drain_server(handle, settings.server.graceful_shutdown).await
}

async fn drain_server(
    mut handle: tokio::task::JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(joined) => finish_server(joined),
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs(),
                "Connections still open after the grace period; aborting"
            );
            handle.abort();
            Ok(())
        }
    }
}

fn finish_server(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(InfraError::from(err).into()),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = wait_for_signal("Ctrl+C", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Resolve once `signal` fires. A handler that failed to install never resolves.
async fn wait_for_signal(name: &'static str, signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!(signal = name, "Received shutdown signal"),
        Err(err) => {
            warn!(signal = name, error = %err, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}
