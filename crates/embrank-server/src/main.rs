//! embrank entrypoint: one HTTP surface per process, chosen by the first argument.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use embrank::config::Config;
use embrank::constants::{
    DEFAULT_EMBEDDING_MODEL, UPSTREAM_HEALTH_INTERVAL_SECS, UPSTREAM_HEALTH_RETRIES,
};
use embrank::embedding::device::device_label;
use embrank::{
    CopyOutcome, Embedder, EmbedderConfig, EngineArray, EngineWorker, JobHandler, ModelVolume,
    RerankService, Reranker, RerankerConfig, RerankerWorker, sample_rerank_job,
};
use embrank_server::ServerMode;
use embrank_server::gateway::{
    EmbeddingState, ProxyState, RerankerState, UpstreamClient, WorkerState,
    create_embedding_router, create_gateway_router, create_reranker_router, create_worker_router,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const ENV_PORT: &str = "PORT";
const ENV_MODEL_NAME: &str = "MODEL_NAME";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = ServerMode::from_args(&args)?;

    if args.iter().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check(mode).await);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(mode, &args).await {
        tracing::error!(mode = %mode, error = ?e, "embrank failed");
        return Err(e);
    }

    Ok(())
}

async fn run(mode: ServerMode, args: &[String]) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    config.validate()?;

    if std::env::var(ENV_PORT).is_err() {
        config.port = mode.default_port();
    }
    if mode == ServerMode::Embedding && std::env::var(ENV_MODEL_NAME).is_err() {
        config.model_name = DEFAULT_EMBEDDING_MODEL.to_string();
    }
    if config.use_flash_attention {
        tracing::warn!("USE_FLASH_ATTENTION is set but flash attention kernels are not available");
    }

    prepare_volume(&mut config);

    if args.iter().any(|arg| arg == "--test-job") {
        return run_test_job(&config).await;
    }

    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        mode = %mode,
        bind_addr = %config.bind_addr,
        port = config.port,
        device = ?config.device,
        precision = ?config.precision,
        "embrank starting"
    );

    match mode {
        ServerMode::Embedding => serve_embedding(&config, addr).await,
        ServerMode::Reranker => serve_reranker(&config, addr).await,
        ServerMode::Gateway => serve_gateway(&config, addr).await,
        ServerMode::Worker => serve_worker(&config, addr).await,
        ServerMode::EngineWorker => serve_engine_worker(&config, addr).await,
    }
}

/// Copies container models onto the volume and points the hub cache at it.
fn prepare_volume(config: &mut Config) {
    let volume = ModelVolume::default();

    match volume.prepare(config.copy_to_volume) {
        Ok(outcomes) => {
            for outcome in outcomes {
                match outcome {
                    CopyOutcome::Copied { name } => {
                        tracing::info!(model = %name, "Copied model to volume")
                    }
                    CopyOutcome::AlreadyPresent { name } => {
                        tracing::info!(model = %name, "Model already on volume")
                    }
                    CopyOutcome::Skipped { name, reason } => {
                        tracing::warn!(model = %name, %reason, "Model not copied to volume")
                    }
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "Skipping model volume preparation"),
    }

    if config.hf_home.is_none() {
        config.hf_home = volume.hf_home();
    }
    if let Some(hf_home) = &config.hf_home {
        tracing::info!(hf_home = %hf_home.display(), "Using Hugging Face cache directory");
    }
}

async fn serve_embedding(config: &Config, addr: SocketAddr) -> anyhow::Result<()> {
    let state = EmbeddingState::loading(config.model_name.clone());
    let app = create_embedding_router(state.clone());

    let embedder_config = EmbedderConfig::from_config(config);
    let loader = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let embedder = Embedder::load(embedder_config).context("failed to load embedding model")?;
        tracing::info!(
            model = %embedder.model_id(),
            device = device_label(embedder.device()),
            "Embedding model ready"
        );
        state.set_embedder(embedder);
        Ok(())
    });

    serve_while_loading(addr, app, loader).await
}

async fn serve_reranker(config: &Config, addr: SocketAddr) -> anyhow::Result<()> {
    let state = RerankerState::loading(config.model_name.clone());
    let app = create_reranker_router(state.clone());

    let reranker_config = RerankerConfig::from_config(config);
    let loader = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let reranker = Reranker::load(reranker_config).context("failed to load reranker model")?;
        let device = device_label(reranker.device());
        tracing::info!(model = %reranker.model_id(), device, "Reranker model ready");
        state.set_service(RerankService::new(Arc::new(reranker)), device);
        Ok(())
    });

    serve_while_loading(addr, app, loader).await
}

async fn serve_gateway(config: &Config, addr: SocketAddr) -> anyhow::Result<()> {
    let upstream = UpstreamClient::new(
        &config.embedding_service_url,
        &config.reranker_service_url,
    )?;

    tracing::info!(
        embedding = %upstream.embedding_url(),
        reranker = %upstream.reranker_url(),
        "Waiting for model services"
    );
    upstream
        .wait_for_services(
            UPSTREAM_HEALTH_RETRIES,
            Duration::from_secs(UPSTREAM_HEALTH_INTERVAL_SECS),
        )
        .await?;

    let app = create_gateway_router(ProxyState::new(upstream));
    serve(addr, app).await
}

async fn serve_worker(config: &Config, addr: SocketAddr) -> anyhow::Result<()> {
    let worker_config = config.clone();
    let worker = tokio::task::spawn_blocking(move || RerankerWorker::from_config(&worker_config))
        .await?
        .context("failed to load reranker model")?;

    let app = create_worker_router(WorkerState::new(Arc::new(worker)));
    serve(addr, app).await
}

async fn serve_engine_worker(config: &Config, addr: SocketAddr) -> anyhow::Result<()> {
    let engines = Arc::new(EngineArray::from_config(config)?);
    engines.start().await.context("failed to start engine array")?;

    tracing::info!(models = ?engines.list_models(), "Engine array ready");

    let worker = EngineWorker::new(Arc::clone(&engines), config.max_concurrency);
    let app = create_worker_router(WorkerState::new(Arc::new(worker)));
    let result = serve(addr, app).await;

    engines.stop().await;
    result
}

async fn serve(addr: SocketAddr, app: axum::Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("embrank shutdown complete");
    Ok(())
}

/// Serves `/health` (reporting `loading`) while the model loads. A load failure stops the process.
async fn serve_while_loading(
    addr: SocketAddr,
    app: axum::Router,
    loader: tokio::task::JoinHandle<anyhow::Result<()>>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening (model loading)");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    let load_failure = async {
        match loader.await {
            Ok(Ok(())) => std::future::pending::<anyhow::Result<()>>().await,
            Ok(Err(e)) => Err(e),
            Err(e) => Err(anyhow::Error::new(e).context("model loading task panicked")),
        }
    };

    tokio::select! {
        result = server => result?,
        result = load_failure => result?,
    }

    tracing::info!("embrank shutdown complete");
    Ok(())
}

/// Runs the sample warranty job through a reranker worker and prints the output.
async fn run_test_job(config: &Config) -> anyhow::Result<()> {
    let worker_config = config.clone();
    let worker = tokio::task::spawn_blocking(move || RerankerWorker::from_config(&worker_config))
        .await?
        .context("failed to load reranker model")?;

    let output = worker.handle(sample_rerank_job()).await;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if output.get("error").is_some() {
        anyhow::bail!("test job failed");
    }
    Ok(())
}

async fn run_health_check(mode: ServerMode) -> i32 {
    let port = std::env::var(ENV_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or_else(|| mode.default_port());

    let url = format!("http://127.0.0.1:{}/health", port);

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
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
