//! Persistence of media preferences.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::ErabiError;
use crate::models::MediaPreference;
use crate::selector::MediaSelector;

/// Where default and per-subject preferences live.
///
/// Both readers return receivers that already hold a current value, so the
/// selector never waits on storage.
pub trait PreferenceStore: Send + Sync {
    fn default_preference(&self) -> watch::Receiver<MediaPreference>;

    /// Empty preference when nothing was saved for `subject_id`.
    fn saved_user_preference(&self, subject_id: &str) -> watch::Receiver<MediaPreference>;

    fn write_saved_user_preference(
        &self,
        subject_id: &str,
        preference: MediaPreference,
    ) -> Result<(), ErabiError>;
}

/// Keeps preferences for the lifetime of the process.
pub struct MemoryPreferenceStore {
    default: watch::Sender<MediaPreference>,
    saved: Mutex<HashMap<String, watch::Sender<MediaPreference>>>,
}

impl MemoryPreferenceStore {
    pub fn new(default: MediaPreference) -> Self {
        let (default, _) = watch::channel(default);
        Self {
            default,
            saved: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_default_preference(&self, preference: MediaPreference) {
        self.default.send_replace(preference);
    }

    fn saved(&self) -> MutexGuard<'_, HashMap<String, watch::Sender<MediaPreference>>> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryPreferenceStore {
    fn default() -> Self {
        Self::new(MediaPreference::default())
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn default_preference(&self) -> watch::Receiver<MediaPreference> {
        self.default.subscribe()
    }

    fn saved_user_preference(&self, subject_id: &str) -> watch::Receiver<MediaPreference> {
        self.saved()
            .entry(subject_id.to_string())
            .or_insert_with(|| watch::channel(MediaPreference::default()).0)
            .subscribe()
    }

    fn write_saved_user_preference(
        &self,
        subject_id: &str,
        preference: MediaPreference,
    ) -> Result<(), ErabiError> {
        let mut saved = self.saved();
        match saved.get(subject_id) {
            Some(sender) => {
                sender.send_replace(preference);
            }
            None => {
                saved.insert(subject_id.to_string(), watch::channel(preference).0);
            }
        }
        Ok(())
    }
}

/// Save every preference change the selector broadcasts for `subject_id`.
///
/// Subscribes immediately; the returned future finishes when the selector
/// is dropped. Spawn it next to the selector.
pub fn persist_preference_changes(
    selector: &MediaSelector,
    store: Arc<dyn PreferenceStore>,
    subject_id: impl Into<String>,
) -> impl Future<Output = ()> + Send + 'static {
    let mut changes = selector.events().subscribe_change_preference();
    let subject_id = subject_id.into();
    async move {
        loop {
            match changes.recv().await {
                Ok(preference) => {
                    debug!(subject = %subject_id, "saving preference");
                    if let Err(e) = store.write_saved_user_preference(&subject_id, preference) {
                        warn!(subject = %subject_id, error = %e, "failed to save preference");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(subject = %subject_id, skipped, "preference changes dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
