use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("volume at {path} is not mounted or not writable")]
    VolumeUnavailable { path: PathBuf },

    #[error("model '{name}' has no weights in {path}")]
    SourceMissing { name: String, path: PathBuf },
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
