pub mod assets;
pub mod capture;
pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod gate;
pub mod state;
pub mod trial;

pub use assets::{AssetInfo, AssetSource, DirectoryAssets, StaticAssets, preload_all};
pub use capture::{BufferedCapture, NoopCapture, PointerCapture};
pub use catalog::{CatalogConfig, TrialCatalog, TrialPlan, TrialPlanEntry, TrialStimuli};
pub use config::ExperimentConfig;
pub use display::{DisplayError, Frame, NullDisplay, StimulusDisplay};
pub use error::{AssetError, AssetLoadError, CatalogError, ExperimentError, TrialRuntimeError};
pub use gate::{AutoGate, ChannelGate, GateHandle, Key, ProgressGate, Prompt, UserInput};
pub use state::{Collaborators, RunOutcome, TrialSequencer};
pub use trial::TrialDraft;
