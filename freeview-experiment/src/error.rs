use freeview_core::{AssignmentError, InvalidTransition, ValidationError};
use freeview_data::{AggregateError, ExportError};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("could not read catalog: {0}")]
    Read(#[from] std::io::Error),
    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog defines no trials")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not load {image}: {reason}")]
pub struct AssetError {
    pub image: String,
    pub reason: String,
}

/// Fatal to start: the run cannot begin without every stimulus
#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("{} stimulus assets failed to load: {}", .failed.len(), .failed.join(", "))]
    Assets { failed: Vec<String> },
}

/// Problems inside one trial. The trial is still finalized and the run
/// continues.
#[derive(Debug, thiserror::Error)]
pub enum TrialRuntimeError {
    #[error("no catalog entry for {kind} trial {index}")]
    MissingDefinition { kind: &'static str, index: usize },
    #[error("invalid position assignment: {0}")]
    Assignment(#[from] AssignmentError),
    #[error("display failed: {0}")]
    Display(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    AssetLoad(#[from] AssetLoadError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error("local export failed: {0}")]
    Export(#[from] ExportError),
    #[error("{0} has not happened yet")]
    NotReady(&'static str),
}
