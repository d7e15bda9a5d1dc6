use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod message_types;

pub use message_types::SessionPayload;

/// Unique identifier for one live connection
///
/// A user may hold several (multi-device); the id allows precise cleanup
/// when one of them closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Write side of a live connection
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    sender: Sender<SessionPayload>,
}

impl SessionHandle {
    pub fn new(sender: Sender<SessionPayload>) -> Self {
        Self {
            id: SessionId::new(),
            sender,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }
}

/// Registry of live sessions: user id -> handles
///
/// Owned by whoever starts the process and passed in explicitly. State is
/// not persisted; stored messages remain authoritative.
#[derive(Clone)]
pub struct SessionRouter {
    inner: Arc<DashMap<String, Vec<SessionHandle>>>,
    delivery_timeout: Duration,
    buffer: usize,
}

impl SessionRouter {
    pub fn new(delivery_timeout: Duration, buffer: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            delivery_timeout,
            buffer: buffer.max(1),
        }
    }

    pub fn register(&self, user_id: &str, handle: SessionHandle) {
        let mut handles = self.inner.entry(user_id.to_string()).or_default();
        handles.push(handle);
        debug!(user_id = %user_id, sessions = handles.len(), "Session registered");
    }

    /// Returns false if the handle was not registered
    pub fn unregister(&self, user_id: &str, session_id: SessionId) -> bool {
        let removed = match self.inner.get_mut(user_id) {
            Some(mut handles) => {
                let before = handles.len();
                handles.retain(|h| h.id != session_id);
                before != handles.len()
            }
            None => false,
        };
        self.inner.remove_if(user_id, |_, handles| handles.is_empty());

        if removed {
            debug!(user_id = %user_id, ?session_id, "Session unregistered");
        }
        removed
    }

    /// Open a bounded channel for `user_id` and register its sending half
    pub fn connect(&self, user_id: &str) -> (SessionHandle, Receiver<SessionPayload>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let handle = SessionHandle::new(tx);
        self.register(user_id, handle.clone());
        (handle, rx)
    }

    /// Push `payload` to every live session of `user_id`
    ///
    /// Returns true if at least one session accepted it. False means the user
    /// is offline and is not an error. A handle that is closed or does not
    /// accept within the delivery timeout is dropped from the registry.
    pub async fn deliver(&self, user_id: &str, payload: SessionPayload) -> bool {
        // snapshot so no map lock is held across awaits
        let handles: Vec<SessionHandle> = match self.inner.get(user_id) {
            Some(handles) => handles.clone(),
            None => Vec::new(),
        };
        if handles.is_empty() {
            debug!(user_id = %user_id, kind = payload.kind(), "User offline, nothing delivered");
            return false;
        }

        let timeout = self.delivery_timeout;
        let sends = handles.iter().map(|handle| {
            let payload = payload.clone();
            async move {
                let ok = handle.sender.send_timeout(payload, timeout).await.is_ok();
                (handle.id, ok)
            }
        });
        let results = join_all(sends).await;

        let dead: Vec<SessionId> = results
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(id, _)| *id)
            .collect();
        let delivered = results.len() - dead.len();

        if !dead.is_empty() {
            warn!(
                user_id = %user_id,
                pruned = dead.len(),
                "Dropping stalled or closed sessions"
            );
            if let Some(mut live) = self.inner.get_mut(user_id) {
                live.retain(|h| !dead.contains(&h.id));
            }
            self.inner.remove_if(user_id, |_, handles| handles.is_empty());
        }

        delivered > 0
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.inner.get(user_id).map_or(0, |handles| handles.len())
    }

    pub fn online_users(&self) -> Vec<String> {
        self.inner.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop every handle; receivers observe end-of-stream
    pub fn shutdown(&self) {
        let sessions: usize = self.inner.iter().map(|entry| entry.value().len()).sum();
        self.inner.clear();
        info!(sessions, "Session router shut down");
    }
}
