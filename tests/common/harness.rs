//! Test server harness.

use lumen::embedding::{Embedder, MemoEmbedder, StubEmbedder};
use lumen::gateway::{HandlerState, serve_until_shutdown};
use lumen::knowledge::{KnowledgeBackend, KnowledgeStore, MemoryBackend, SqliteBackend, StoreConfig};
use lumen::responder::{ResponderConfig, SmartResponder};
use lumen::storage::SnapshotFile;
use lumen::upstream::MockUpstream;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;
pub const TEST_EMBEDDING_DIM: usize = 32;

#[derive(Clone)]
pub struct TestServerConfig {
    pub request_timeout: Duration,
    pub upstream: Arc<MockUpstream>,
    pub responder: ResponderConfig,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            upstream: Arc::new(MockUpstream::new()),
            responder: ResponderConfig::default(),
        }
    }
}

pub struct TestServer<B: KnowledgeBackend> {
    pub addr: SocketAddr,
    pub responder: SmartResponder<B>,
    pub upstream: Arc<MockUpstream>,
    server_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    temp_dir: Option<TempDir>,
}

impl<B: KnowledgeBackend> TestServer<B> {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Signals shutdown, waits for the drain and final flush, and hands back
    /// the storage directory so the caller can reopen it.
    pub async fn stop(mut self) -> Option<TempDir> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.await.expect("server task panicked");
        }
        self.temp_dir.take()
    }
}

impl<B: KnowledgeBackend> Drop for TestServer<B> {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => {
                tokio::time::sleep(interval).await;
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Server startup failed: {0}")]
    StartupFailed(String),
}

/// Stub embeddings behind the memo layer, the same stack `lumen` builds with
/// `LUMEN_MOCK_PROVIDER=true`.
pub fn test_embedder() -> Arc<dyn Embedder> {
    let inner: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(TEST_EMBEDDING_DIM));
    Arc::new(MemoEmbedder::new(inner, 1_000))
}

/// Builds a responder over `backend` with the stub embedder and the config's upstream.
pub async fn build_responder<B: KnowledgeBackend>(
    backend: B,
    config: &TestServerConfig,
) -> Result<SmartResponder<B>, ServerStartupError> {
    let store = KnowledgeStore::open(backend, test_embedder(), StoreConfig::default())
        .await
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    SmartResponder::new(store, config.upstream.clone(), config.responder.clone())
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))
}

pub async fn sqlite_backend(dir: &TempDir) -> Result<SqliteBackend, ServerStartupError> {
    let url = format!("sqlite://{}", dir.path().join("knowledge.db").display());
    SqliteBackend::connect(&url, 8)
        .await
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))
}

/// Serves `backend` on an ephemeral port with every external dependency mocked.
pub async fn spawn_server_with<B: KnowledgeBackend>(
    backend: B,
    config: TestServerConfig,
    temp_dir: Option<TempDir>,
) -> Result<TestServer<B>, ServerStartupError> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let local_addr = listener.local_addr()?;

    let responder = build_responder(backend, &config).await?;
    let state =
        HandlerState::new(responder.clone()).with_request_timeout(config.request_timeout);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        serve_until_shutdown(listener, state, async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    wait_for_server_ready(
        local_addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr: local_addr,
        responder,
        upstream: config.upstream,
        server_handle: Some(server_handle),
        shutdown_tx: Some(shutdown_tx),
        temp_dir,
    })
}

/// In-memory backend persisted to a snapshot in a fresh temp dir.
pub async fn spawn_memory_server(
    config: TestServerConfig,
) -> Result<TestServer<MemoryBackend>, ServerStartupError> {
    let temp_dir = TempDir::new()?;
    let backend = MemoryBackend::open(SnapshotFile::in_dir(temp_dir.path()))
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    spawn_server_with(backend, config, Some(temp_dir)).await
}

/// SQLite backend in a fresh temp dir.
pub async fn spawn_sqlite_server(
    config: TestServerConfig,
) -> Result<TestServer<SqliteBackend>, ServerStartupError> {
    let temp_dir = TempDir::new()?;
    let backend = sqlite_backend(&temp_dir).await?;
    spawn_server_with(backend, config, Some(temp_dir)).await
}
