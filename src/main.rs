//! Lumen HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use lumen::config::{BackendKind, Config};
use lumen::constants::DEFAULT_EMBEDDING_DIM;
use lumen::embedding::{Embedder, HttpEmbedder, MemoEmbedder, StubEmbedder};
use lumen::gateway::{HandlerState, serve_until_shutdown};
use lumen::knowledge::{
    DEFAULT_MAX_CONNECTIONS, KnowledgeBackend, KnowledgeStore, MemoryBackend, SqliteBackend,
};
use lumen::lifecycle::MaintenanceScheduler;
use lumen::responder::SmartResponder;
use lumen::upstream::{GenaiUpstream, MockUpstream, UpstreamProvider};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        backend = config.backend.as_str(),
        mock_provider = config.mock_provider,
        "Lumen starting"
    );

    tokio::fs::create_dir_all(&config.storage_path).await?;

    let embedder = build_embedder(&config)?;
    let upstream = build_upstream(&config);

    match config.backend {
        BackendKind::Memory => {
            let snapshot = config.snapshot_file();
            tracing::info!(path = %snapshot.path().display(), "Loading knowledge snapshot");
            let backend = MemoryBackend::open(snapshot)?;
            tracing::info!(entries = backend.len(), "Snapshot loaded");
            serve(&config, addr, backend, embedder, upstream).await
        }
        BackendKind::Sqlite => {
            let url = config.database_url();
            let backend = SqliteBackend::connect(&url, DEFAULT_MAX_CONNECTIONS).await?;
            serve(&config, addr, backend, embedder, upstream).await
        }
    }
}

fn build_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let inner: Arc<dyn Embedder> = if config.mock_provider {
        tracing::warn!("LUMEN_MOCK_PROVIDER set, using the offline stub embedder");
        Arc::new(StubEmbedder::new(
            config.embedding_dim.unwrap_or(DEFAULT_EMBEDDING_DIM),
        ))
    } else {
        if config.embedding_api_key.is_none() {
            tracing::warn!("No LUMEN_EMBEDDING_API_KEY configured, sending unauthenticated requests");
        }
        Arc::new(HttpEmbedder::new(config.http_embedder_config())?)
    };
    Ok(Arc::new(MemoEmbedder::new(inner, config.memo_capacity)))
}

fn build_upstream(config: &Config) -> Arc<dyn UpstreamProvider> {
    if config.mock_provider {
        tracing::warn!("LUMEN_MOCK_PROVIDER set, upstream generation returns canned payloads");
        Arc::new(MockUpstream::new())
    } else {
        Arc::new(GenaiUpstream::new(
            config.upstream_model.clone(),
            config.upstream_timeout,
        ))
    }
}

async fn serve<B: KnowledgeBackend>(
    config: &Config,
    addr: SocketAddr,
    backend: B,
    embedder: Arc<dyn Embedder>,
    upstream: Arc<dyn UpstreamProvider>,
) -> anyhow::Result<()> {
    let store = KnowledgeStore::open(backend, embedder, config.store_config()).await?;
    let responder = SmartResponder::new(store, upstream, config.responder_config())?;

    let scheduler = Arc::new(MaintenanceScheduler::new(
        responder.clone(),
        config.maintenance_config(),
    )?);
    scheduler.start();

    let state = HandlerState::new(responder).with_request_timeout(config.request_timeout);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    serve_until_shutdown(listener, state, shutdown_signal_with_scheduler(scheduler)).await?;

    tracing::info!("Lumen shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("LUMEN_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let Ok(rt) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    else {
        return 1;
    };

    rt.block_on(async {
        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
        else {
            return 1;
        };

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal_with_scheduler<B: KnowledgeBackend>(
    scheduler: Arc<MaintenanceScheduler<B>>,
) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    tracing::info!("Stopping maintenance scheduler, draining requests...");
    if let Err(e) = scheduler.shutdown().await {
        tracing::error!("Failed to flush knowledge store: {}", e);
    }
}
