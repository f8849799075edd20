//! Backend contracts: session record store, object storage, notifier.

use crate::error::{NotificationError, StoreError};
use async_trait::async_trait;
use freeview_core::{SessionId, SessionRecord, SessionStatus};
use serde::{Deserialize, Serialize};

/// What happens when a session id is inserted twice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    #[default]
    Reject,
    Overwrite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    /// Case-insensitive substring of participant id or session id
    pub search: Option<String>,
    pub status: Option<SessionStatus>,
}

impl SessionFilter {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            status: None,
        }
    }

    pub fn matches(&self, record: &SessionRecord) -> bool {
        if self.status.is_some_and(|status| record.status != status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                record.participant_id.to_lowercase().contains(&needle)
                    || record.session_id.as_str().to_lowercase().contains(&needle)
            }
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a session and returns the canonical stored record
    async fn insert(&self, record: SessionRecord) -> Result<SessionRecord, StoreError>;
    async fn select(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, StoreError>;
    async fn delete(&self, id: &SessionId) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path: String,
    pub size: u64,
}

impl ObjectEntry {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` at `path`. Fails with [`StoreError::Conflict`] if the
    /// path exists and `upsert` is false.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), StoreError>;
    /// Objects directly under `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError>;
    /// Missing paths are ignored
    async fn remove(&self, paths: &[String]) -> Result<(), StoreError>;
    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, NotificationError>;
    async fn send(&self, address: &str, text: &str) -> Result<(), NotificationError>;
}
