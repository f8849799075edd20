use freeview_core::SessionId;
use freeview_render::HeatmapError;
use std::fmt;

/// Backend (record store / object storage) failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("trial {0} already recorded")]
    DuplicateTrial(usize),
    #[error("trial {trial} claims {recorded} pointer samples but {supplied} were supplied")]
    SampleCountMismatch {
        trial: usize,
        recorded: usize,
        supplied: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("heatmap for trial {trial} failed: {source}")]
    Heatmap {
        trial: usize,
        #[source]
        source: HeatmapError,
    },
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact worker stopped: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// One artifact that did not reach object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedArtifact {
    pub name: String,
    pub reason: String,
}

impl fmt::Display for FailedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.reason)
    }
}

fn join_failed(failed: &[FailedArtifact]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("could not persist session record: {0}")]
    PersistSession(#[source] StoreError),
    #[error("could not derive artifacts: {0}")]
    DeriveArtifacts(#[source] ArtifactError),
    #[error("artifact upload failed: {}", join_failed(.failed))]
    ArtifactUpload { failed: Vec<FailedArtifact> },
}

impl UploadError {
    /// Names of the artifacts that failed, empty for non-upload phases
    pub fn failed_artifacts(&self) -> Vec<&str> {
        match self {
            UploadError::ArtifactUpload { failed } => {
                failed.iter().map(|f| f.name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("could not list subscribers: {0}")]
    Subscribers(String),
    #[error("delivery to {address} failed: {reason}")]
    Delivery { address: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("refusing to export to {0:?}")]
    InvalidPath(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Bundle(#[from] ArtifactError),
    #[error("no data files found for session {0}")]
    NoArtifacts(SessionId),
}
