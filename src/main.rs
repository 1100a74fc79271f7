use std::{future::IntoFuture, process, sync::Arc};

use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use trendcache::{
    application::{error::AppError, search::SearchService, trending::TrendingService},
    cache::{CacheBackend, CacheStore, MemoryCacheStore},
    config,
    infra::{
        error::InfraError,
        http::{self, ApiState},
        reddit::RedditClient,
        redis::RedisCacheStore,
        search::{ElasticsearchClient, log_index_definition, posts_index_definition},
        startup, telemetry,
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Bootstrap(_) => run_bootstrap(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let credential = settings
        .upstream
        .credential()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let search = Arc::new(search_client(&settings)?);
    if settings.startup.bootstrap_on_serve {
        ensure_indices(&settings, &search).await?;
    }

    let cache = build_cache_store(&settings).await?;
    let upstream = Arc::new(RedditClient::new(
        settings.upstream.base_url.clone(),
        &settings.upstream.user_agent,
        settings.upstream.timeout,
    )?);

    let state = ApiState {
        trending: Arc::new(TrendingService::new(cache, upstream)),
        search: Arc::new(SearchService::new(search)),
        credential,
    };

    serve_http(&settings, state).await
}

async fn run_bootstrap(settings: config::Settings) -> Result<(), AppError> {
    let search = search_client(&settings)?;
    ensure_indices(&settings, &search).await?;

    if settings.cache.backend == CacheBackend::Redis {
        wait_for_redis(&settings).await?;
    }

    info!(target = "trendcache::bootstrap", "bootstrap complete");
    Ok(())
}

fn search_client(settings: &config::Settings) -> Result<ElasticsearchClient, AppError> {
    ElasticsearchClient::new(
        settings.search.url.clone(),
        settings.search.posts_index.clone(),
    )
    .map_err(AppError::from)
}

/// Wait for the search backend, then create the posts and log indices when missing.
async fn ensure_indices(
    settings: &config::Settings,
    search: &ElasticsearchClient,
) -> Result<(), AppError> {
    startup::wait_for(
        "search",
        settings.startup.wait_attempts,
        settings.startup.wait_interval,
        move || search.ping(),
    )
    .await?;

    let indices = [
        (search.posts_index(), posts_index_definition()),
        (settings.logging.sink.index.as_str(), log_index_definition()),
    ];
    for (name, definition) in indices {
        let created = search.ensure_index(name, &definition).await?;
        info!(
            target = "trendcache::bootstrap",
            index = name,
            created,
            "search index ensured"
        );
    }
    Ok(())
}

async fn wait_for_redis(settings: &config::Settings) -> Result<RedisCacheStore, AppError> {
    let url = settings.cache.redis_url.as_str();
    let store = startup::wait_for(
        "redis",
        settings.startup.wait_attempts,
        settings.startup.wait_interval,
        move || async move {
            let store = RedisCacheStore::connect(url).await?;
            store.ping().await?;
            Ok::<_, trendcache::cache::CacheError>(store)
        },
    )
    .await?;
    Ok(store)
}

async fn build_cache_store(settings: &config::Settings) -> Result<Arc<dyn CacheStore>, AppError> {
    let store: Arc<dyn CacheStore> = match settings.cache.backend {
        CacheBackend::Redis => Arc::new(wait_for_redis(settings).await?),
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new(&settings.cache)),
    };
    info!(
        target = "trendcache::serve",
        backend = settings.cache.backend.as_str(),
        "cache store ready"
    );
    Ok(store)
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let cors = http::cors_layer(&settings.server.cors_origins)?;
    let router = http::build_router(state, cors);

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "trendcache::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let (signal_tx, mut signal_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signal_tx.send(true);
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let drain_deadline = async move {
        let _ = signal_rx.wait_for(|fired| *fired).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline => {
            warn!(
                target = "trendcache::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "trendcache::serve", "server stopped");
    Ok(())
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
    info!(target = "trendcache::serve", "shutdown signal received");
}
