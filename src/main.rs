use std::{process, sync::Arc};

use lectern::{
    application::{
        accounts::AccountService,
        error::AppError,
        posts::PostService,
        repos::{HealthRepo, PostsRepo, PostsWriteRepo, UsersRepo},
        session::SessionManager,
        users::UserService,
    },
    cache::{Admission, AdmissionLimits, CacheAside, CacheConfig, KvStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        kv, telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = PostgresRepositories::connect_with_retry(&settings.database).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    info!("migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let kv = kv::connect(&settings.kv).await.map_err(InfraError::from)?;

    let pool = PostgresRepositories::connect_with_retry(&settings.database).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    let repositories = Arc::new(PostgresRepositories::new(pool));

    let state = build_http_state(&settings, repositories, kv);
    serve_http(&settings, state).await
}

fn build_http_state(
    settings: &config::Settings,
    repositories: Arc<PostgresRepositories>,
    kv: Arc<dyn KvStore>,
) -> HttpState {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let post_writes: Arc<dyn PostsWriteRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let database: Arc<dyn HealthRepo> = repositories;

    let cache_config = CacheConfig::from(&settings.cache);
    let limits = AdmissionLimits::from(&settings.admission);
    let backend_timeout = limits.backend_timeout;
    let admission = Arc::new(Admission::new(&limits));
    let cache = CacheAside::new(kv.clone(), &cache_config, backend_timeout);

    let sessions = SessionManager::new(
        cache.scoped(&settings.session.key_prefix),
        users_repo.clone(),
        settings.session.ttl,
        backend_timeout,
    );
    let accounts = AccountService::new(users_repo.clone(), backend_timeout);
    let posts = PostService::new(
        posts_repo,
        post_writes,
        cache.clone(),
        admission.clone(),
        cache_config.ttl,
        backend_timeout,
    );
    let users = UserService::new(
        users_repo,
        cache,
        admission,
        cache_config.ttl,
        backend_timeout,
    );

    HttpState {
        sessions: Arc::new(sessions),
        accounts: Arc::new(accounts),
        posts: Arc::new(posts),
        users: Arc::new(users),
        kv,
        database,
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "listening");

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let stop = stop.clone();
        async move { stop.notified().await }
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => {
            return joined
                .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
                .map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        () = shutdown_signal() => {}
    }

    info!(
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown signal received; draining requests"
    );
    stop.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(Ok(result)) => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        Ok(Err(err)) => Err(AppError::unexpected(format!("server task failed: {err}"))),
        Err(_) => {
            warn!("graceful shutdown window elapsed; dropping remaining connections");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
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
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
