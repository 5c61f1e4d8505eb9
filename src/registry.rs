//! The set of live sessions.
//!
//! Sessions are kept in join order. Mutations take the write lock only long
//! enough to touch the vector; broadcasts snapshot the recipients under the
//! read lock and deliver after releasing it.

use crate::session::Session;
use bytes::Bytes;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Thread-safe, join-ordered collection of connected sessions
#[derive(Debug, Default)]
pub struct Registry {
    sessions: RwLock<Vec<Arc<Session>>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append a session. The caller guarantees its id is not already present.
    pub fn add(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        debug!(id = %session.id(), name = session.name(), "Registering session");
        sessions.push(session);
    }

    /// Remove a session by id. Returns false if it was already gone.
    pub fn remove(&self, session: &Session) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let Some(pos) = sessions.iter().position(|s| s.id() == session.id()) else {
            return false;
        };
        sessions.remove(pos);
        drop(sessions);

        info!("removing {}", session.name());
        true
    }

    /// Display names of all sessions in join order
    pub fn list(&self) -> Vec<String> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[cfg(test)]
    pub fn contains(&self, id: crate::session::SessionId) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.iter().any(|s| s.id() == id)
    }

    /// Queue `line` for every session except `sender`, in join order.
    ///
    /// A failed delivery is logged and skipped; it never removes the
    /// recipient. Returns the number of sessions the line was queued for.
    pub fn broadcast_except(&self, sender: &Session, line: impl Into<Bytes>) -> usize {
        let line = line.into();
        let recipients: Vec<Arc<Session>> = {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            sessions
                .iter()
                .filter(|s| s.id() != sender.id())
                .cloned()
                .collect()
        };

        let mut delivered = 0;
        for recipient in &recipients {
            match recipient.send(line.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(recipient = recipient.name(), error = %e, "Dropping broadcast line");
                }
            }
        }
        delivered
    }
}
