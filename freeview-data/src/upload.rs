//! End-of-run delivery: session record, artifacts, object storage,
//! notifications. Four phases, each reported before it starts.

use crate::aggregator::DataAggregator;
use crate::artifacts::ArtifactSet;
use crate::error::{ArtifactError, FailedArtifact, UploadError};
use crate::notify::{NotifyReport, notify_all};
use crate::store::{Notifier, ObjectStore, RecordStore};
use freeview_core::SessionRecord;
use freeview_render::HeatmapRenderer;
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Runs [`DataAggregator::derive_artifacts`] on the blocking pool over a
/// snapshot of the data, forwarding heatmap progress as it arrives.
pub(crate) async fn derive_in_background(
    data: &DataAggregator,
    session: &SessionRecord,
    renderer: &HeatmapRenderer,
    mut progress: impl FnMut(usize, usize),
) -> Result<ArtifactSet, ArtifactError> {
    let data = data.clone();
    let session = session.clone();
    let renderer = renderer.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = tokio::task::spawn_blocking(move || {
        data.derive_artifacts(&session, &renderer, |current, total| {
            let _ = tx.send((current, total));
        })
    });
    while let Some((current, total)) = rx.recv().await {
        progress(current, total);
    }
    worker.await?
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    PersistSession,
    DeriveArtifacts,
    UploadArtifacts,
    Notify,
}

impl UploadPhase {
    pub const COUNT: usize = 4;

    /// 1-based position among the four phases
    pub fn step(self) -> usize {
        match self {
            UploadPhase::PersistSession => 1,
            UploadPhase::DeriveArtifacts => 2,
            UploadPhase::UploadArtifacts => 3,
            UploadPhase::Notify => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UploadPhase::PersistSession => "saving session",
            UploadPhase::DeriveArtifacts => "generating files",
            UploadPhase::UploadArtifacts => "uploading files",
            UploadPhase::Notify => "sending notifications",
        }
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.label(), self.step(), Self::COUNT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProgress {
    Phase(UploadPhase),
    Heatmap { current: usize, total: usize },
}

#[derive(Debug)]
pub struct UploadReceipt {
    pub session: SessionRecord,
    pub uploaded: Vec<String>,
    /// `None` when the subscriber list could not be fetched
    pub notifications: Option<NotifyReport>,
}

/// A failed upload, carrying everything needed for local export
#[derive(Debug)]
pub struct UploadFailure {
    pub phase: UploadPhase,
    pub error: UploadError,
    pub session: SessionRecord,
    pub artifacts: Option<ArtifactSet>,
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.phase.label(), self.error)
    }
}

impl std::error::Error for UploadFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub struct UploadPipeline {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    renderer: HeatmapRenderer,
    upsert: bool,
}

impl UploadPipeline {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            records,
            objects,
            notifier,
            renderer: HeatmapRenderer::default(),
            upsert: false,
        }
    }

    pub fn with_renderer(mut self, renderer: HeatmapRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Allow artifact uploads to replace existing objects
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn renderer(&self) -> &HeatmapRenderer {
        &self.renderer
    }

    pub async fn upload(
        &self,
        data: &DataAggregator,
        session: SessionRecord,
        mut progress: impl FnMut(UploadProgress) + Send,
    ) -> Result<UploadReceipt, UploadFailure> {
        progress(UploadProgress::Phase(UploadPhase::PersistSession));
        info!("upload {}: {}", session.session_id, UploadPhase::PersistSession);
        let session = match self.records.insert(session.clone()).await {
            Ok(canonical) => canonical,
            Err(e) => {
                error!("could not save session {}: {e}", session.session_id);
                return Err(UploadFailure {
                    phase: UploadPhase::PersistSession,
                    error: UploadError::PersistSession(e),
                    session,
                    artifacts: None,
                });
            }
        };

        progress(UploadProgress::Phase(UploadPhase::DeriveArtifacts));
        info!("upload {}: {}", session.session_id, UploadPhase::DeriveArtifacts);
        let derived = derive_in_background(data, &session, &self.renderer, |current, total| {
            progress(UploadProgress::Heatmap { current, total })
        })
        .await;
        let artifacts = match derived {
            Ok(a) => a,
            Err(e) => {
                error!("could not derive artifacts for {}: {e}", session.session_id);
                return Err(UploadFailure {
                    phase: UploadPhase::DeriveArtifacts,
                    error: UploadError::DeriveArtifacts(e),
                    session,
                    artifacts: None,
                });
            }
        };

        progress(UploadProgress::Phase(UploadPhase::UploadArtifacts));
        info!("upload {}: {}", session.session_id, UploadPhase::UploadArtifacts);
        let uploaded = match self.upload_artifacts(&session, &artifacts).await {
            Ok(paths) => paths,
            Err(failed) => {
                let error = UploadError::ArtifactUpload { failed };
                error!("upload {}: {error}", session.session_id);
                return Err(UploadFailure {
                    phase: UploadPhase::UploadArtifacts,
                    error,
                    session,
                    artifacts: Some(artifacts),
                });
            }
        };

        progress(UploadProgress::Phase(UploadPhase::Notify));
        info!("upload {}: {}", session.session_id, UploadPhase::Notify);
        let notifications = match notify_all(self.notifier.as_ref(), &session).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("notifications skipped: {e}");
                None
            }
        };

        info!(
            "session {} uploaded ({} files, status {})",
            session.session_id,
            uploaded.len(),
            session.status.as_str()
        );
        Ok(UploadReceipt {
            session,
            uploaded,
            notifications,
        })
    }

    /// Uploads every artifact concurrently and waits for all of them. Any
    /// failure fails the batch with the full list of failed names.
    async fn upload_artifacts(
        &self,
        session: &SessionRecord,
        artifacts: &ArtifactSet,
    ) -> Result<Vec<String>, Vec<FailedArtifact>> {
        let folder = session.session_id.folder();
        let results = join_all(artifacts.iter().map(|artifact| {
            let path = format!("{folder}/{}", artifact.name());
            async move {
                let result = self
                    .objects
                    .upload(
                        &path,
                        artifact.bytes.clone(),
                        artifact.kind.content_type(),
                        self.upsert,
                    )
                    .await;
                (artifact.name(), path, result)
            }
        }))
        .await;

        let mut uploaded = Vec::new();
        let mut failed = Vec::new();
        for (name, path, result) in results {
            match result {
                Ok(()) => uploaded.push(path),
                Err(e) => failed.push(FailedArtifact {
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
            }
        }
        if failed.is_empty() {
            Ok(uploaded)
        } else {
            Err(failed)
        }
    }
}
