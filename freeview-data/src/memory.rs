//! In-process backends with injectable failures, for tests and dry runs.

use crate::error::{NotificationError, StoreError};
use crate::store::{
    CollisionPolicy, Notifier, ObjectEntry, ObjectStore, RecordStore, SessionFilter, Subscriber,
};
use async_trait::async_trait;
use freeview_core::{SessionId, SessionRecord};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    policy: CollisionPolicy,
    records: Mutex<BTreeMap<SessionId, SessionRecord>>,
    unavailable: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Every call fails with a backend error while set
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        self.records.lock().get(id).cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("record store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: SessionRecord) -> Result<SessionRecord, StoreError> {
        self.check()?;
        let mut records = self.records.lock();
        if self.policy == CollisionPolicy::Reject && records.contains_key(&record.session_id) {
            return Err(StoreError::Conflict(record.session_id.to_string()));
        }
        records.insert(record.session_id.clone(), record.clone());
        Ok(record)
    }

    async fn select(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, StoreError> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.check()?;
        self.records
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads whose file name equals `file_name` fail from now on
    pub fn fail_uploads_named(&self, file_name: &str) {
        self.failing.lock().insert(file_name.to_string());
    }

    pub fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.lock().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<(), StoreError> {
        if self.failing.lock().contains(file_name(path)) {
            return Err(StoreError::Backend(format!("upload of {path} rejected")));
        }
        let mut objects = self.objects.lock();
        if !upsert && objects.contains_key(path) {
            return Err(StoreError::Conflict(path.to_string()));
        }
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, StoreError> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(&dir)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(path, obj)| ObjectEntry {
                path: path.clone(),
                size: obj.bytes.len() as u64,
            })
            .collect())
    }

    async fn remove(&self, paths: &[String]) -> Result<(), StoreError> {
        let mut objects = self.objects.lock();
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .get(path)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}

/// Records every delivered message
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    subscribers: Vec<Subscriber>,
    failing: HashSet<String>,
    sent: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self {
            subscribers,
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, NotificationError> {
        Ok(self.subscribers.clone())
    }

    async fn send(&self, address: &str, text: &str) -> Result<(), NotificationError> {
        if self.failing.contains(address) {
            return Err(NotificationError::Delivery {
                address: address.to_string(),
                reason: "unreachable".into(),
            });
        }
        self.sent.lock().push((address.to_string(), text.to_string()));
        Ok(())
    }
}
