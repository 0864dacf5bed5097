use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::error::EmbeddingError;
use crate::persistence::ModelVolume;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const WEIGHTS_INDEX_FILE: &str = "model.safetensors.index.json";

/// Files making up a loadable safetensors checkpoint.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

/// Loads a tokenizer from a model directory or explicit tokenizer.json path.
pub fn load_tokenizer(model_path: &Path) -> io::Result<Tokenizer> {
    let tokenizer_path = if model_path
        .file_name()
        .is_some_and(|name| name == std::ffi::OsStr::new(TOKENIZER_FILE))
    {
        model_path.to_path_buf()
    } else if model_path.is_dir() {
        model_path.join(TOKENIZER_FILE)
    } else {
        model_path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Model path has no parent"))?
            .join(TOKENIZER_FILE)
    };

    Tokenizer::from_file(&tokenizer_path).map_err(io::Error::other)
}

/// Resolves a model identifier to checkpoint files.
///
/// Order: an existing local directory, then the persistent volume / container
/// copy of the same model, then the Hugging Face Hub (cached under `hf_home`).
/// Absolute paths that do not exist are never sent to the hub.
pub fn resolve_model_files(
    model: &str,
    hf_home: Option<&Path>,
) -> Result<ModelFiles, EmbeddingError> {
    let as_path = Path::new(model);
    if as_path.is_dir() {
        return local_model_files(as_path);
    }

    if let Some(dir) = ModelVolume::default().resolve_model_path(model) {
        debug!(model = model, path = %dir.display(), "Resolved model from local storage");
        return local_model_files(&dir);
    }

    if as_path.is_absolute() {
        return Err(EmbeddingError::ModelNotFound {
            path: as_path.to_path_buf(),
        });
    }

    hub_model_files(model, hf_home)
}

/// Collects checkpoint files from a local model directory.
pub fn local_model_files(dir: &Path) -> Result<ModelFiles, EmbeddingError> {
    let config = dir.join(CONFIG_FILE);
    if !config.exists() {
        return Err(EmbeddingError::ModelLoadFailed {
            reason: format!("Missing {CONFIG_FILE} in {}", dir.display()),
        });
    }

    let tokenizer = dir.join(TOKENIZER_FILE);
    if !tokenizer.exists() {
        return Err(EmbeddingError::ModelLoadFailed {
            reason: format!("Missing {TOKENIZER_FILE} in {}", dir.display()),
        });
    }

    let single = dir.join(WEIGHTS_FILE);
    let weights = if single.exists() {
        vec![single]
    } else {
        let index = dir.join(WEIGHTS_INDEX_FILE);
        if !index.exists() {
            return Err(EmbeddingError::ModelLoadFailed {
                reason: format!("Missing {WEIGHTS_FILE} in {}", dir.display()),
            });
        }
        shard_names(&index)?
            .into_iter()
            .map(|name| dir.join(name))
            .collect()
    };

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}

fn hub_model_files(model: &str, hf_home: Option<&Path>) -> Result<ModelFiles, EmbeddingError> {
    use hf_hub::api::sync::ApiBuilder;

    let hub_err = |e: hf_hub::api::sync::ApiError| EmbeddingError::ModelResolutionFailed {
        model: model.to_string(),
        reason: e.to_string(),
    };

    let builder = match hf_home {
        Some(home) => ApiBuilder::new().with_cache_dir(home.join("hub")),
        None => ApiBuilder::from_env(),
    };
    let api = builder.build().map_err(hub_err)?;
    let repo = api.model(model.to_string());

    info!(model = model, "Fetching model from Hugging Face Hub");

    let config = repo.get(CONFIG_FILE).map_err(hub_err)?;
    let tokenizer = repo.get(TOKENIZER_FILE).map_err(hub_err)?;
    let weights = match repo.get(WEIGHTS_FILE) {
        Ok(path) => vec![path],
        Err(single_err) => {
            debug!(error = %single_err, "No single-file checkpoint, trying sharded index");
            let index = repo.get(WEIGHTS_INDEX_FILE).map_err(hub_err)?;
            shard_names(&index)?
                .into_iter()
                .map(|name| repo.get(&name).map_err(hub_err))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}

fn shard_names(index_path: &Path) -> Result<Vec<String>, EmbeddingError> {
    let raw = std::fs::read_to_string(index_path)?;
    let index: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| EmbeddingError::ModelLoadFailed {
            reason: format!("Invalid {WEIGHTS_INDEX_FILE}: {e}"),
        })?;

    let names: BTreeSet<String> = index
        .get("weight_map")
        .and_then(|m| m.as_object())
        .ok_or_else(|| EmbeddingError::ModelLoadFailed {
            reason: format!("{WEIGHTS_INDEX_FILE} has no weight_map"),
        })?
        .values()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();

    Ok(names.into_iter().collect())
}

/// Served name of a model: the last path component of its identifier.
pub fn served_model_name(model: &str) -> String {
    model
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(model)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_served_model_name() {
        assert_eq!(served_model_name("Qwen/Qwen3-Reranker-0.6B"), "Qwen3-Reranker-0.6B");
        assert_eq!(
            served_model_name("/models/Qwen3-Embedding-0.6B/"),
            "Qwen3-Embedding-0.6B"
        );
        assert_eq!(served_model_name("plain"), "plain");
    }

    #[test]
    fn test_local_model_files_single_checkpoint() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), "{}").unwrap();
        std::fs::write(dir.path().join("model.safetensors"), b"").unwrap();

        let files = local_model_files(dir.path()).unwrap();
        assert_eq!(files.weights, vec![dir.path().join("model.safetensors")]);
    }

    #[test]
    fn test_local_model_files_sharded_checkpoint() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), "{}").unwrap();
        std::fs::write(
            dir.path().join("model.safetensors.index.json"),
            r#"{"weight_map": {"a": "part-2.safetensors", "b": "part-1.safetensors", "c": "part-1.safetensors"}}"#,
        )
        .unwrap();

        let files = local_model_files(dir.path()).unwrap();
        assert_eq!(
            files.weights,
            vec![
                dir.path().join("part-1.safetensors"),
                dir.path().join("part-2.safetensors")
            ]
        );
    }

    #[test]
    fn test_local_model_files_missing_tokenizer() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let err = local_model_files(dir.path()).unwrap_err();
        assert!(err.to_string().contains("tokenizer.json"));
    }

    #[test]
    fn test_resolve_missing_absolute_path_is_not_found() {
        let result = resolve_model_files("/nonexistent/embrank/model-dir", None);
        assert!(matches!(result, Err(EmbeddingError::ModelNotFound { .. })));
    }
}
