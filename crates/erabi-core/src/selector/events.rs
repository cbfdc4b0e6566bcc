use tokio::sync::broadcast;

use crate::models::{Media, MediaPreference};

const EVENT_CAPACITY: usize = 16;

/// Emitted after a manual selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectEvent {
    pub media: Media,
    /// Language the player should load, when the caller knows it.
    pub subtitle_language_id: Option<String>,
}

/// Fan-out of selector notifications to observers such as the preference store.
#[derive(Debug)]
pub struct MediaSelectorEvents {
    on_select: broadcast::Sender<SelectEvent>,
    on_change_preference: broadcast::Sender<MediaPreference>,
}

impl MediaSelectorEvents {
    pub(crate) fn new() -> Self {
        let (on_select, _) = broadcast::channel(EVENT_CAPACITY);
        let (on_change_preference, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            on_select,
            on_change_preference,
        }
    }

    pub fn subscribe_select(&self) -> broadcast::Receiver<SelectEvent> {
        self.on_select.subscribe()
    }

    /// Saved user preference with this session's choices applied.
    pub fn subscribe_change_preference(&self) -> broadcast::Receiver<MediaPreference> {
        self.on_change_preference.subscribe()
    }

    pub(crate) fn has_preference_listeners(&self) -> bool {
        self.on_change_preference.receiver_count() > 0
    }

    pub(crate) fn publish_select(&self, event: SelectEvent) {
        let _ = self.on_select.send(event);
    }

    pub(crate) fn publish_change_preference(&self, preference: MediaPreference) {
        let _ = self.on_change_preference.send(preference);
    }
}
