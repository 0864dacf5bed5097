use std::sync::{Arc, OnceLock};

use embrank::{Embedder, JobHandler, RerankService};

use super::upstream::UpstreamClient;

/// Embedding server state. The model slot is filled once loading finishes.
#[derive(Clone)]
pub struct EmbeddingState {
    pub model_name: String,
    pub embedder: Arc<OnceLock<Arc<Embedder>>>,
}

impl EmbeddingState {
    /// State whose model is still loading.
    pub fn loading<S: Into<String>>(model_name: S) -> Self {
        Self {
            model_name: model_name.into(),
            embedder: Arc::new(OnceLock::new()),
        }
    }

    pub fn ready<S: Into<String>>(model_name: S, embedder: Embedder) -> Self {
        let state = Self::loading(model_name);
        state.set_embedder(embedder);
        state
    }

    /// Publishes the loaded model; later calls are ignored.
    pub fn set_embedder(&self, embedder: Embedder) {
        let _ = self.embedder.set(Arc::new(embedder));
    }

    pub fn embedder(&self) -> Option<Arc<Embedder>> {
        self.embedder.get().cloned()
    }
}

/// Reranker server state. The model slot is filled once loading finishes.
#[derive(Clone)]
pub struct RerankerState {
    pub model_name: String,
    pub device: Arc<OnceLock<&'static str>>,
    pub service: Arc<OnceLock<RerankService>>,
}

impl RerankerState {
    pub fn loading<S: Into<String>>(model_name: S) -> Self {
        Self {
            model_name: model_name.into(),
            device: Arc::new(OnceLock::new()),
            service: Arc::new(OnceLock::new()),
        }
    }

    pub fn ready<S: Into<String>>(model_name: S, service: RerankService, device: &'static str) -> Self {
        let state = Self::loading(model_name);
        state.set_service(service, device);
        state
    }

    pub fn set_service(&self, service: RerankService, device: &'static str) {
        let _ = self.device.set(device);
        let _ = self.service.set(service);
    }

    pub fn service(&self) -> Option<RerankService> {
        self.service.get().cloned()
    }
}

/// Orchestrating gateway state.
#[derive(Clone)]
pub struct ProxyState {
    pub upstream: UpstreamClient,
}

impl ProxyState {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

/// Job worker surface state.
#[derive(Clone)]
pub struct WorkerState {
    pub handler: Arc<dyn JobHandler>,
}

impl WorkerState {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self { handler }
    }
}
