use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::fetcher::MediaFetcher;
use super::session::{MediaFetchSession, WeakSession};
use crate::models::MediaFetchRequest;

/// Reuses a live session per (subject, episode).
///
/// Holds sessions weakly: once every handle is dropped the session closes
/// and the entry is pruned on the next lookup.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<(String, String), WeakSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live, open session for this request's subject and episode, or a new one.
    pub fn get_or_create(&self, fetcher: &MediaFetcher, request: MediaFetchRequest) -> MediaFetchSession {
        let key = (request.subject_id.clone(), request.episode_id.clone());
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, weak| weak.upgrade().is_some_and(|s| !s.is_closed()));

        if let Some(session) = sessions.get(&key).and_then(WeakSession::upgrade) {
            debug!(subject = %key.0, episode = %key.1, "reusing fetch session");
            return session;
        }
        let session = fetcher.new_session(request);
        sessions.insert(key, session.downgrade());
        session
    }

    /// Number of sessions still alive.
    pub fn len(&self) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.values().filter(|weak| weak.upgrade().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
