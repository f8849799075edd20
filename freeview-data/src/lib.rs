//! Trial data accumulation, artifact derivation, and delivery to the
//! session backends.

pub mod admin;
pub mod aggregator;
pub mod artifacts;
pub mod error;
pub mod export;
pub mod fs;
pub mod memory;
pub mod notify;
pub mod store;
pub mod upload;

pub use admin::{SessionAdmin, SessionSummary};
pub use aggregator::DataAggregator;
pub use artifacts::{Artifact, ArtifactKind, ArtifactSet};
pub use error::{
    AdminError, AggregateError, ArtifactError, ExportError, FailedArtifact, NotificationError,
    StoreError, UploadError,
};
pub use export::{
    DirectoryExporter, ExportReport, LocalExporter, MemoryExporter, RAW_EXPORT_NAME, manual_export,
};
pub use fs::{FsObjectStore, FsRecordStore};
pub use memory::{MemoryNotifier, MemoryObjectStore, MemoryRecordStore};
pub use notify::{LogNotifier, NotifyReport, completion_message, notify_all};
pub use store::{
    CollisionPolicy, Notifier, ObjectEntry, ObjectStore, RecordStore, SessionFilter, Subscriber,
};
pub use upload::{UploadFailure, UploadPhase, UploadPipeline, UploadProgress, UploadReceipt};
