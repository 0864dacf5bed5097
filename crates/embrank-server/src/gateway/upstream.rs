//! HTTP client for the embedding and reranker backends.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use embrank::constants::UPSTREAM_TIMEOUT_SECS;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request to {service} failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} service failed to start after {attempts} attempts")]
    Unavailable {
        service: &'static str,
        attempts: u32,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct EmbedBody<'a> {
    texts: &'a [String],
}

/// `/embed` response of the embedding server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedReply {
    pub embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct RerankBody<'a> {
    query: &'a str,
    documents: &'a [String],
    top_k: usize,
}

/// `/rerank` response of the reranker server: `(index, score)` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankReply {
    pub results: Vec<(usize, f32)>,
}

/// Forwards gateway calls to the model servers.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    embedding_url: String,
    reranker_url: String,
}

impl UpstreamClient {
    pub const EMBEDDING: &'static str = "embedding";
    pub const RERANKER: &'static str = "reranker";

    /// Client with the fixed outbound request timeout.
    pub fn new(embedding_url: &str, reranker_url: &str) -> Result<Self, UpstreamError> {
        Self::with_timeout(
            embedding_url,
            reranker_url,
            Duration::from_secs(UPSTREAM_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        embedding_url: &str,
        reranker_url: &str,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            http,
            embedding_url: embedding_url.trim_end_matches('/').to_string(),
            reranker_url: reranker_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn embedding_url(&self) -> &str {
        &self.embedding_url
    }

    pub fn reranker_url(&self) -> &str {
        &self.reranker_url
    }

    pub async fn embed(&self, texts: &[String]) -> Result<EmbedReply, UpstreamError> {
        let url = format!("{}/embed", self.embedding_url);
        self.post_json(Self::EMBEDDING, &url, &EmbedBody { texts })
            .await
    }

    pub async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
    ) -> Result<RerankReply, UpstreamError> {
        let url = format!("{}/rerank", self.reranker_url);
        let body = RerankBody {
            query,
            documents,
            top_k,
        };
        self.post_json(Self::RERANKER, &url, &body).await
    }

    /// Polls each backend's `/health` until it answers 200, up to `attempts` times.
    pub async fn wait_for_services(
        &self,
        attempts: u32,
        interval: Duration,
    ) -> Result<(), UpstreamError> {
        for (service, base) in [
            (Self::EMBEDDING, &self.embedding_url),
            (Self::RERANKER, &self.reranker_url),
        ] {
            self.wait_for(service, base, attempts, interval).await?;
        }
        Ok(())
    }

    async fn wait_for(
        &self,
        service: &'static str,
        base: &str,
        attempts: u32,
        interval: Duration,
    ) -> Result<(), UpstreamError> {
        let url = format!("{base}/health");

        for attempt in 1..=attempts {
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!(service, "Upstream service is ready");
                    return Ok(());
                }
                Ok(resp) => {
                    warn!(
                        service,
                        status = resp.status().as_u16(),
                        remaining = attempts - attempt,
                        "Waiting for upstream service"
                    );
                }
                Err(e) => {
                    warn!(
                        service,
                        error = %e,
                        remaining = attempts - attempt,
                        "Waiting for upstream service"
                    );
                }
            }

            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(UpstreamError::Unavailable { service, attempts })
    }

    async fn post_json<B, T>(
        &self,
        service: &'static str,
        url: &str,
        body: &B,
    ) -> Result<T, UpstreamError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let request_err = |source| UpstreamError::Request { service, source };

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(request_err)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                service,
                status: status.as_u16(),
                body,
            });
        }

        resp.json().await.map_err(request_err)
    }
}
