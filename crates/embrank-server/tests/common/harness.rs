//! Test server harness: real listeners on ephemeral ports, stub models.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use embrank::{
    Embedder, EmbedderConfig, EngineArray, EngineOptions, EngineSpec, EngineWorker, JobHandler,
    RerankService, Reranker, RerankerWorker,
};
use embrank_server::gateway::{
    EmbeddingState, ProxyState, RerankerState, UpstreamClient, WorkerState,
    create_embedding_router, create_gateway_router, create_reranker_router, create_worker_router,
};

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

pub struct TestServer {
    pub addr: SocketAddr,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
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
            Err(_) => tokio::time::sleep(interval).await,
        }
    }
}

/// Serves `app` on `127.0.0.1:0` until the returned server is dropped.
pub async fn spawn_router(app: Router) -> Result<TestServer, ServerStartupError> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let local_addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
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
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
    })
}

/// Embedding server with a stub embedder already loaded.
pub async fn spawn_embedding_server() -> Result<TestServer, ServerStartupError> {
    let embedder = Embedder::load(EmbedderConfig::stub())
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    let state = EmbeddingState::ready("Qwen3-Embedding-0.6B", embedder);
    spawn_router(create_embedding_router(state)).await
}

/// Reranker server whose model never finishes loading.
pub async fn spawn_loading_reranker_server() -> Result<TestServer, ServerStartupError> {
    spawn_router(create_reranker_router(RerankerState::loading(
        "Qwen3-Reranker-0.6B",
    )))
    .await
}

/// Reranker server with a stub reranker already loaded.
pub async fn spawn_reranker_server() -> Result<TestServer, ServerStartupError> {
    spawn_router(create_reranker_router(RerankerState::ready(
        "Qwen3-Reranker-0.6B",
        stub_rerank_service()?,
        "cpu",
    )))
    .await
}

pub async fn spawn_gateway(
    embedding_url: &str,
    reranker_url: &str,
) -> Result<TestServer, ServerStartupError> {
    let upstream = UpstreamClient::new(embedding_url, reranker_url)
        .map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    spawn_router(create_gateway_router(ProxyState::new(upstream))).await
}

pub async fn spawn_worker(
    handler: Arc<dyn JobHandler>,
) -> Result<TestServer, ServerStartupError> {
    spawn_router(create_worker_router(WorkerState::new(handler))).await
}

pub fn stub_rerank_service() -> Result<RerankService, ServerStartupError> {
    let reranker =
        Reranker::stub().map_err(|e| ServerStartupError::StartupFailed(e.to_string()))?;
    Ok(RerankService::new(Arc::new(reranker)))
}

pub fn stub_reranker_worker(max_concurrency: usize) -> Result<RerankerWorker, ServerStartupError> {
    Ok(RerankerWorker::new(stub_rerank_service()?, max_concurrency))
}

/// Engine worker over stub embedding and rerank engines (not yet started).
pub fn stub_engine_worker(max_concurrency: usize) -> EngineWorker {
    let engines = EngineArray::new(
        vec![
            EngineSpec::new("/models/Qwen3-Embedding-0.6B", 8).with_stub(true),
            EngineSpec::new("/models/Qwen3-Reranker-0.6B", 8).with_stub(true),
        ],
        EngineOptions::default(),
    );
    EngineWorker::new(Arc::new(engines), max_concurrency)
}
