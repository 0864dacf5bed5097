//! Model weight persistence between the container image and a network volume.
//!
//! Models baked into the image live under [`CONTAINER_MODELS_PATH`]; on first
//! start they can be copied to the persistent volume so later cold starts (and
//! the hub cache) reuse them.

pub mod error;


pub use error::{PersistenceError, PersistenceResult};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::constants::{CONTAINER_MODELS_PATH, PERSISTED_MODEL_DIRS, VOLUME_PATH};

const WEIGHT_EXTENSIONS: [&str; 2] = ["safetensors", "bin"];

/// Outcome of [`ModelVolume::prepare`] for one model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Weights were copied to the volume.
    Copied { name: String },
    /// The volume already holds the weights.
    AlreadyPresent { name: String },
    /// Nothing to copy (no container weights, or copying failed).
    Skipped { name: String, reason: String },
}

/// Container-local and volume-backed model directories.
#[derive(Debug, Clone)]
pub struct ModelVolume {
    volume_path: PathBuf,
    container_models_path: PathBuf,
}

impl Default for ModelVolume {
    fn default() -> Self {
        Self::new(VOLUME_PATH, CONTAINER_MODELS_PATH)
    }
}

impl ModelVolume {
    pub fn new(volume_path: impl Into<PathBuf>, container_models_path: impl Into<PathBuf>) -> Self {
        Self {
            volume_path: volume_path.into(),
            container_models_path: container_models_path.into(),
        }
    }

    pub fn volume_path(&self) -> &Path {
        &self.volume_path
    }

    /// Directory on the volume that holds model copies.
    pub fn volume_models_path(&self) -> PathBuf {
        self.volume_path.join("models")
    }

    pub fn container_models_path(&self) -> &Path {
        &self.container_models_path
    }

    /// Returns `true` if the volume directory exists and accepts writes.
    pub fn is_mounted_and_writable(&self) -> bool {
        if !self.volume_path.is_dir() {
            return false;
        }

        let probe = self.volume_path.join(".embrank_write_probe");
        match fs::write(&probe, b"") {
            Ok(()) => {
                let _ = fs::remove_file(&probe);
                true
            }
            Err(e) => {
                debug!(path = %self.volume_path.display(), error = %e, "Volume not writable");
                false
            }
        }
    }

    /// Returns `true` if the volume copy of `name` contains weight files.
    pub fn model_exists(&self, name: &str) -> bool {
        has_weights(&self.volume_models_path().join(name))
    }

    /// Copies `name` from the container to the volume, replacing any partial copy.
    pub fn copy_model(&self, name: &str) -> PersistenceResult<()> {
        let source = self.container_models_path.join(name);
        if !has_weights(&source) {
            return Err(PersistenceError::SourceMissing {
                name: name.to_string(),
                path: source,
            });
        }

        let destination = self.volume_models_path().join(name);
        if destination.exists() {
            warn!(path = %destination.display(), "Removing incomplete model copy");
            fs::remove_dir_all(&destination)?;
        }

        info!(
            model = name,
            from = %source.display(),
            to = %destination.display(),
            "Copying model to persistent volume"
        );
        copy_dir_recursive(&source, &destination)?;
        Ok(())
    }

    /// Copies every persisted model missing from the volume (when enabled).
    pub fn prepare(&self, copy_to_volume: bool) -> PersistenceResult<Vec<CopyOutcome>> {
        if !copy_to_volume {
            debug!("Model copy to volume disabled");
            return Ok(vec![]);
        }

        if !self.is_mounted_and_writable() {
            return Err(PersistenceError::VolumeUnavailable {
                path: self.volume_path.clone(),
            });
        }

        let outcomes = PERSISTED_MODEL_DIRS
            .iter()
            .map(|&name| {
                if self.model_exists(name) {
                    return CopyOutcome::AlreadyPresent {
                        name: name.to_string(),
                    };
                }
                match self.copy_model(name) {
                    Ok(()) => CopyOutcome::Copied {
                        name: name.to_string(),
                    },
                    Err(e) => {
                        warn!(model = name, error = %e, "Model copy skipped");
                        CopyOutcome::Skipped {
                            name: name.to_string(),
                            reason: e.to_string(),
                        }
                    }
                }
            })
            .collect();

        Ok(outcomes)
    }

    /// Local directory holding `model` (hub id or bare name): volume first, then container.
    pub fn resolve_model_path(&self, model: &str) -> Option<PathBuf> {
        let name = Path::new(model.trim_end_matches('/')).file_name()?;

        [
            self.volume_models_path().join(name),
            self.container_models_path.join(name),
        ]
        .into_iter()
        .find(|dir| has_weights(dir))
    }

    /// Hub cache directory to use: on the volume when it is mounted.
    pub fn hf_home(&self) -> Option<PathBuf> {
        self.is_mounted_and_writable()
            .then(|| self.volume_path.clone())
    }
}

/// Returns `true` if `dir` directly contains a `.safetensors` or `.bin` file.
pub fn has_weights(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    entries.flatten().any(|entry| {
        entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| WEIGHT_EXTENSIONS.contains(&ext))
    })
}

fn copy_dir_recursive(source: &Path, destination: &Path) -> std::io::Result<()> {
    fs::create_dir_all(destination)?;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
