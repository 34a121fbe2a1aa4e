use std::fmt;
use std::path::PathBuf;

use image::{ImageError, ImageFormat};
use thiserror::Error;

use crate::graph::GraphError;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a decodable image: {0}")]
    Unreadable(#[source] ImageError),

    #[error("HEIC/HEIF image, but this build has no HEIF decoder (enable the `heic` feature)")]
    HeifUnsupported,

    #[cfg(feature = "heic")]
    #[error("HEIF decoding failed: {0}")]
    Heif(#[from] libheif_rs::HeifError),

    #[error("re-encoding as {format:?} failed: {source}")]
    Encode {
        format: ImageFormat,
        source: ImageError,
    },
}

#[derive(Debug, Error)]
#[error("backup to {} failed: {source}", path.display())]
pub struct BackupError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Result of the compensating step after a failed upload.
#[derive(Debug)]
pub enum Rollback {
    Restored,
    Failed(GraphError),
}

impl fmt::Display for Rollback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rollback::Restored => write!(f, "original restored"),
            Rollback::Failed(e) => write!(f, "ROLLBACK FAILED: {}", e),
        }
    }
}

/// Remote mutation failures. The `UploadAfter*` variants mean the first
/// step already changed the drive.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("rename of {name} failed: {source}")]
    Rename { name: String, source: GraphError },

    #[error("delete of {name} failed: {source}")]
    Delete { name: String, source: GraphError },

    #[error("upload of {name} failed after the original was renamed; {rollback}: {source}")]
    UploadAfterRename {
        name: String,
        source: GraphError,
        rollback: Rollback,
    },

    #[error("upload of {name} failed after the original was deleted; {rollback}: {source}")]
    UploadAfterDelete {
        name: String,
        source: GraphError,
        rollback: Rollback,
    },
}

impl MutationError {
    /// Whether the drive was left in a state that needs manual attention.
    pub fn is_partially_applied(&self) -> bool {
        matches!(
            self,
            MutationError::UploadAfterRename {
                rollback: Rollback::Failed(_),
                ..
            } | MutationError::UploadAfterDelete {
                rollback: Rollback::Failed(_),
                ..
            }
        )
    }
}

/// Terminal failure of a single item. Never aborts the walk.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("existence check failed: {0}")]
    Precheck(#[source] GraphError),

    #[error("download failed: {0}")]
    Download(#[source] GraphError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Mutation(#[from] MutationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error() -> GraphError {
        GraphError::Status {
            status: 503,
            url: "u".into(),
            body: String::new(),
            retry_after: None,
        }
    }

    #[test]
    fn test_restored_rollback_is_not_partial() {
        let e = MutationError::UploadAfterRename {
            name: "a_2k.jpg".into(),
            source: server_error(),
            rollback: Rollback::Restored,
        };
        assert!(!e.is_partially_applied());
        assert!(e.to_string().contains("original restored"));
    }

    #[test]
    fn test_failed_rollback_is_partial() {
        let e = MutationError::UploadAfterDelete {
            name: "a_2k.jpg".into(),
            source: server_error(),
            rollback: Rollback::Failed(server_error()),
        };
        assert!(e.is_partially_applied());
        assert!(e.to_string().contains("ROLLBACK FAILED"));
    }

    #[test]
    fn test_first_step_failure_is_not_partial() {
        let e = MutationError::Delete {
            name: "a.jpg".into(),
            source: server_error(),
        };
        assert!(!e.is_partially_applied());
    }
}
