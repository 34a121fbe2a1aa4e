use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MboxError {
    #[error("Users directory not found: {}", .0.display())]
    UsersDirMissing(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is locked by another conversion", .0.display())]
    Busy(PathBuf),

    #[error("Conversion worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl MboxError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> MboxError {
        let path = path.into();
        move |source| MboxError::Io { path, source }
    }
}
