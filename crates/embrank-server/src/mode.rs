use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Which surface this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// `/embed` model server.
    Embedding,
    /// `/rerank` model server.
    Reranker,
    /// OpenAI-style gateway in front of the two model servers.
    Gateway,
    /// Job worker with a single reranker.
    Worker,
    /// Job worker over the configured engine array.
    EngineWorker,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown mode `{0}` (expected embedding, reranker, gateway, worker or engine-worker)")]
pub struct ModeError(pub String);

impl ServerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerMode::Embedding => "embedding",
            ServerMode::Reranker => "reranker",
            ServerMode::Gateway => "gateway",
            ServerMode::Worker => "worker",
            ServerMode::EngineWorker => "engine-worker",
        }
    }

    /// Port used when `PORT` is not set.
    pub fn default_port(self) -> u16 {
        match self {
            ServerMode::Embedding => 8001,
            ServerMode::Reranker => 8002,
            ServerMode::Gateway => 8003,
            ServerMode::Worker | ServerMode::EngineWorker => 8000,
        }
    }

    /// First non-flag argument, or `worker` when none is given.
    pub fn from_args<I, S>(args: I) -> Result<Self, ModeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        args.into_iter()
            .find(|arg| !arg.as_ref().starts_with("--"))
            .map_or(Ok(ServerMode::Worker), |arg| arg.as_ref().parse())
    }
}

impl FromStr for ServerMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedding" => Ok(ServerMode::Embedding),
            "reranker" => Ok(ServerMode::Reranker),
            "gateway" => Ok(ServerMode::Gateway),
            "worker" => Ok(ServerMode::Worker),
            "engine-worker" | "engine_worker" => Ok(ServerMode::EngineWorker),
            other => Err(ModeError(other.to_string())),
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
