use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use talentdesk::{
    application::{
        Repositories, build_commands, build_mediator, commands::Writers, error::AppError,
    },
    cache::{CacheProviderKind, CacheServices, CacheStore, MemoryStore, SharedCacheConfig},
    config,
    infra::{
        db::{PostgresRepositories, PostgresStore},
        error::InfraError,
        http::{self, AdminAuth, AppState},
        telemetry,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    for warning in &settings.warnings {
        warn!(target = "talentdesk::config", "{warning}");
    }

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_database(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "talentdesk::migrate", "migrations applied");
    Ok(())
}

async fn connect_database(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_database(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let db = Arc::new(PostgresRepositories::new(pool));

    let shutdown = CancellationToken::new();
    let store = build_cache_store(&settings, &shutdown).await?;
    let cache = CacheServices::new(SharedCacheConfig::new(settings.cache.clone()), store);

    let repos = Repositories {
        employees: db.clone(),
        positions: db.clone(),
        dashboard: db.clone(),
    };
    let writers = Writers {
        employees: db.clone(),
        positions: db.clone(),
        departments: db.clone(),
        salary_ranges: db.clone(),
    };
    let auth = AdminAuth::new(&settings.auth.admin_tokens);
    if auth.is_empty() {
        warn!(
            target = "talentdesk::serve",
            "no admin tokens configured; administration endpoints are unreachable"
        );
    }

    let state = AppState {
        mediator: Arc::new(build_mediator(repos, &cache)),
        commands: Arc::new(build_commands(writers, &cache)),
        cache,
        auth: Arc::new(auth),
        db: Some(db),
    };

    let result = serve_http(&settings, state, shutdown.clone()).await;
    shutdown.cancel();
    result
}

async fn build_cache_store(
    settings: &config::Settings,
    shutdown: &CancellationToken,
) -> Result<Arc<dyn CacheStore>, AppError> {
    let cache = &settings.cache;
    match (
        cache.provider,
        cache.distributed_connection_string.as_deref(),
    ) {
        (CacheProviderKind::Distributed, Some(connection)) => {
            let pool =
                PostgresRepositories::connect(connection, settings.database.max_connections.get())
                    .await
                    .map_err(|err| AppError::from(InfraError::from(err)))?;
            let store = PostgresStore::new(pool);
            store
                .clone()
                .spawn_sweeper(CACHE_SWEEP_INTERVAL, shutdown.clone());
            info!(target = "talentdesk::serve", "using distributed cache store");
            Ok(Arc::new(store))
        }
        (CacheProviderKind::Distributed, None) => {
            warn!(
                target = "talentdesk::serve",
                "distributed cache requested without a connection string; using in-memory store"
            );
            Ok(Arc::new(MemoryStore::new(cache)))
        }
        (CacheProviderKind::Memory, _) => Ok(Arc::new(MemoryStore::new(cache))),
    }
}

async fn serve_http(
    settings: &config::Settings,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(settings.server.addr, err)))?;
    info!(
        target = "talentdesk::serve",
        addr = %settings.server.addr,
        environment = %settings.environment,
        "listening"
    );

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    let mut server = std::pin::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::from(InfraError::Serve(err)));
        }
        _ = shutdown.cancelled() => {}
    }

    let drain = settings.server.graceful_shutdown;
    match tokio::time::timeout(drain, server).await {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::Serve(err))),
        Err(_) => {
            warn!(
                target = "talentdesk::serve",
                timeout_secs = drain.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "talentdesk::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "talentdesk::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => return,
    }
    info!(target = "talentdesk::serve", "shutdown signal received");
    shutdown.cancel();
}
