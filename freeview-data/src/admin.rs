//! Operator-side session management: browse, summarize, delete, download.

use crate::artifacts::{ArtifactKind, zip_entries};
use crate::error::{AdminError, StoreError};
use crate::store::{ObjectStore, RecordStore, SessionFilter};
use freeview_core::{SessionId, SessionRecord, SessionStatus};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub total: usize,
    pub completed: usize,
    pub partial: usize,
}

pub struct SessionAdmin {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
}

impl SessionAdmin {
    pub fn new(records: Arc<dyn RecordStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { records, objects }
    }

    /// Matching sessions, most recently completed first
    pub async fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, AdminError> {
        let mut sessions = self.records.select(filter).await?;
        sessions.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(sessions)
    }

    pub async fn summary(&self) -> Result<SessionSummary, AdminError> {
        let sessions = self.records.select(&SessionFilter::default()).await?;
        let partial = sessions
            .iter()
            .filter(|s| s.status == SessionStatus::Partial)
            .count();
        Ok(SessionSummary {
            total: sessions.len(),
            completed: sessions.len() - partial,
            partial,
        })
    }

    /// Removes stored files first, then the record. Returns the number of
    /// files removed; a session with no files is not an error.
    pub async fn delete(&self, id: &SessionId) -> Result<usize, AdminError> {
        let files = self.objects.list(&id.folder()).await?;
        let paths: Vec<String> = files.into_iter().map(|f| f.path).collect();
        if !paths.is_empty() {
            self.objects.remove(&paths).await?;
        }
        self.records.delete(id).await?;
        info!("deleted session {id} ({} files)", paths.len());
        Ok(paths.len())
    }

    /// Zip of the session's data files under `<session_id>_data/`. Missing
    /// files are skipped; fails only when none exist.
    pub async fn bundle(&self, id: &SessionId) -> Result<Vec<u8>, AdminError> {
        let folder = id.folder();
        let mut files = Vec::new();
        for kind in ArtifactKind::ALL {
            let path = format!("{folder}/{}", kind.file_name());
            match self.objects.download(&path).await {
                Ok(bytes) => files.push((format!("{id}_data/{}", kind.file_name()), bytes)),
                Err(StoreError::NotFound(_)) => warn!("{path} missing, skipped"),
                Err(e) => return Err(e.into()),
            }
        }
        if files.is_empty() {
            return Err(AdminError::NoArtifacts(id.clone()));
        }
        let zip = zip_entries(
            files
                .iter()
                .map(|(name, bytes)| (name.as_str(), bytes.as_slice())),
        )?;
        Ok(zip)
    }
}
