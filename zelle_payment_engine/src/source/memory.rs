use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use chrono::{DateTime, Utc};

use super::{NotificationSource, RawNotification, SourceError};

#[derive(Debug, Default)]
struct Inbox {
    messages: BTreeMap<String, (DateTime<Utc>, Vec<u8>)>,
    offline: bool,
    unreadable: HashSet<String>,
    fetches: HashMap<String, usize>,
}

/// An in-memory inbox.
///
/// Clones share the same inbox, so a test can keep a handle to inject messages and failures while the scan engine
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inbox: Arc<RwLock<Inbox>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inbox> {
        self.inbox.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inbox> {
        self.inbox.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_raw<S: Into<String>>(&self, id: S, received_at: DateTime<Utc>, bytes: Vec<u8>) {
        self.write().messages.insert(id.into(), (received_at, bytes));
    }

    pub fn add_notification(&self, notification: &RawNotification) {
        self.add_raw(notification.id.clone(), notification.received_at, notification.to_rfc822());
    }

    pub fn remove(&self, id: &str) {
        self.write().messages.remove(id);
    }

    /// While offline, every call fails with [`SourceError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.write().offline = offline;
    }

    /// Makes every fetch of `id` fail with an I/O error.
    pub fn make_unreadable<S: Into<String>>(&self, id: S) {
        self.write().unreadable.insert(id.into());
    }

    /// The number of times `id` has been fetched.
    pub fn fetch_count(&self, id: &str) -> usize {
        self.read().fetches.get(id).copied().unwrap_or_default()
    }

    pub fn total_fetches(&self) -> usize {
        self.read().fetches.values().sum()
    }

    pub fn len(&self) -> usize {
        self.read().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSource for MemorySource {
    async fn search_since(&self, since: DateTime<Utc>) -> Result<Vec<String>, SourceError> {
        let inbox = self.read();
        if inbox.offline {
            return Err(SourceError::Unavailable("The in-memory inbox is offline".into()));
        }
        let mut found = inbox
            .messages
            .iter()
            .filter(|(_, (received_at, _))| *received_at >= since)
            .map(|(id, (received_at, _))| (*received_at, id.clone()))
            .collect::<Vec<_>>();
        found.sort();
        Ok(found.into_iter().map(|(_, id)| id).collect())
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, SourceError> {
        let mut inbox = self.write();
        if inbox.offline {
            return Err(SourceError::Unavailable("The in-memory inbox is offline".into()));
        }
        *inbox.fetches.entry(id.to_string()).or_default() += 1;
        if inbox.unreadable.contains(id) {
            return Err(SourceError::Io(format!("Message {id} could not be read")));
        }
        inbox
            .messages
            .get(id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| SourceError::MessageNotFound(id.to_string()))
    }
}
