//! Filesystem-backed record store and object storage.
//!
//! Records live as `<root>/<session_id>.json`; objects mirror their
//! storage path under the object root.

use crate::error::StoreError;
use crate::store::{CollisionPolicy, ObjectEntry, ObjectStore, RecordStore, SessionFilter};
use async_trait::async_trait;
use freeview_core::{SessionId, SessionRecord};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
    policy: CollisionPolicy,
}

impl FsRecordStore {
    pub fn new(root: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    fn path_for(&self, id: &SessionId) -> Result<PathBuf, StoreError> {
        let name = format!("{}.json", id.as_str());
        checked_relative(&name)?;
        Ok(self.root.join(name))
    }
}

/// Rejects absolute paths and parent-directory components
fn checked_relative(path: &str) -> Result<&Path, StoreError> {
    let p = Path::new(path);
    if path.is_empty() || !p.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(StoreError::Backend(format!("invalid storage path {path:?}")));
    }
    Ok(p)
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn insert(&self, record: SessionRecord) -> Result<SessionRecord, StoreError> {
        fs::create_dir_all(&self.root).await?;
        let path = self.path_for(&record.session_id)?;
        if self.policy == CollisionPolicy::Reject && fs::try_exists(&path).await? {
            return Err(StoreError::Conflict(record.session_id.to_string()));
        }
        let json = serde_json::to_vec_pretty(&record)?;
        fs::write(&path, json).await?;
        debug!("stored session record {}", path.display());
        Ok(record)
    }

    async fn select(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, StoreError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let record: SessionRecord = serde_json::from_slice(&fs::read(&path).await?)?;
            if filter.matches(&record) {
                out.push(record);
            }
        }
        out.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(out)
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(id)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(checked_relative(path)?))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
        upsert: bool,
    ) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        if !upsert && fs::try_exists(&target).await? {
            return Err(StoreError::Conflict(path.to_string()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, bytes).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let prefix = prefix.trim_end_matches('/');
        let mut dir = match fs::read_dir(self.resolve(prefix)?).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            out.push(ObjectEntry {
                path: format!("{prefix}/{}", entry.file_name().to_string_lossy()),
                size: meta.len(),
            });
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StoreError> {
        for path in paths {
            match fs::remove_file(self.resolve(path)?).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.resolve(path)?).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(path.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
