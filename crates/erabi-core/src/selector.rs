//! Choose one media item from a fetch session's results.
//!
//! The session's cumulative list passes a hard filter driven by settings,
//! then a candidate filter driven by the merged preference of four
//! [`MediaPreferenceItem`]s. The selection itself is set by the user, or once
//! automatically by [`MediaSelector::try_select_default`].

pub mod auto_select;
pub mod default_selection;
mod events;
pub mod filter;
mod preference_item;
mod settings;

use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::fetch::MediaFetchSession;
use crate::models::{Media, MediaList, MediaPreference, OptionalPreference};

use self::default_selection::DefaultSelectionInput;

pub use events::{MediaSelectorEvents, SelectEvent};
pub use preference_item::{MediaPreferenceItem, PreferenceDimension};
pub use settings::{
    MediaSelectorContext, MediaSelectorSettings, SubtitleKindPreference, SubtitleKindPreferences,
};

/// Receivers for everything the selector derives its state from.
#[derive(Clone)]
struct Inputs {
    media_list: watch::Receiver<Option<MediaList>>,
    saved_user: watch::Receiver<MediaPreference>,
    saved_default: watch::Receiver<MediaPreference>,
    settings: watch::Receiver<MediaSelectorSettings>,
    context: watch::Receiver<MediaSelectorContext>,
    overrides: [watch::Receiver<OptionalPreference<String>>; 4],
}

impl Inputs {
    fn is_loaded(&self) -> bool {
        self.media_list.borrow().is_some()
    }

    fn media_list(&self) -> Vec<Media> {
        let Some(list) = self.media_list.borrow().clone() else {
            return Vec::new();
        };
        let default = self.saved_default.borrow().clone();
        let settings = self.settings.borrow().clone();
        let context = self.context.borrow().clone();
        let mut filtered = filter::filter_media_list(&list, &default, &settings, &context);
        filter::sort_media(&mut filtered, &context);
        filtered
    }

    fn user_selected(&self, dimension: PreferenceDimension) -> OptionalPreference<String> {
        let override_value = self.overrides[dimension.index()].borrow().clone();
        override_value.or_else_preference(|| {
            let saved = self.saved_user.borrow();
            OptionalPreference::prefer_if_some(dimension.field(&saved).cloned())
        })
    }

    fn default_selected(&self, dimension: PreferenceDimension) -> Option<String> {
        let saved = self.saved_default.borrow();
        dimension.field(&saved).cloned()
    }

    fn final_selected(&self, dimension: PreferenceDimension) -> Option<String> {
        self.user_selected(dimension)
            .or_default_value(|| self.default_selected(dimension))
    }

    /// The saved default with each dimension's effective value applied.
    fn merged_preference(&self) -> MediaPreference {
        let mut merged = self.saved_default.borrow().clone();
        for dimension in PreferenceDimension::ALL {
            dimension.set_field(&mut merged, self.final_selected(dimension));
        }
        merged
    }

    fn filtered_candidates(&self) -> Vec<Media> {
        filter::filter_candidates(&self.media_list(), &self.merged_preference())
    }

    /// Resolves when any input changes; `None` once the selector is gone.
    async fn changed(&mut self) -> Option<()> {
        let Inputs {
            media_list,
            saved_user,
            saved_default,
            settings,
            context,
            overrides,
        } = self;
        let external = future::select_all([
            settle(media_list.changed()),
            settle(saved_user.changed()),
            settle(saved_default.changed()),
            settle(settings.changed()),
            settle(context.changed()),
        ]);
        let owned = future::select_all(overrides.iter_mut().map(|rx| rx.changed().boxed()));
        tokio::select! {
            _ = external => Some(()),
            (result, _, _) = owned => result.ok(),
        }
    }
}

/// An input whose sender is gone never changes again.
fn settle<'a>(
    changed: impl std::future::Future<Output = Result<(), watch::error::RecvError>> + Send + 'a,
) -> BoxFuture<'a, ()> {
    async move {
        if changed.await.is_err() {
            future::pending::<()>().await;
        }
    }
    .boxed()
}

/// Filters a media list through layered preferences and holds the selection.
pub struct MediaSelector {
    inputs: Inputs,
    overrides: [watch::Sender<OptionalPreference<String>>; 4],
    selected: watch::Sender<Option<Media>>,
    events: MediaSelectorEvents,
    pump: Option<JoinHandle<()>>,
}

impl MediaSelector {
    /// Build over explicit inputs. A `None` media list means "not loaded".
    ///
    /// Every receiver must already hold a current value; the selector never
    /// waits for the preference or settings inputs.
    pub fn new(
        media_list: watch::Receiver<Option<MediaList>>,
        saved_user: watch::Receiver<MediaPreference>,
        saved_default: watch::Receiver<MediaPreference>,
        settings: watch::Receiver<MediaSelectorSettings>,
        context: watch::Receiver<MediaSelectorContext>,
    ) -> Self {
        let overrides = std::array::from_fn(|_| watch::channel(OptionalPreference::NoPreference));
        let [a, b, c, d] = overrides;
        let senders = [a.0, b.0, c.0, d.0];
        let receivers = [a.1, b.1, c.1, d.1];
        let (selected, _) = watch::channel(None);
        Self {
            inputs: Inputs {
                media_list,
                saved_user,
                saved_default,
                settings,
                context,
                overrides: receivers,
            },
            overrides: senders,
            selected,
            events: MediaSelectorEvents::new(),
            pump: None,
        }
    }

    /// Build over a session's cumulative results.
    ///
    /// Observing the session starts its queries. The selector keeps the
    /// session alive until it is dropped.
    pub fn for_session(
        session: &MediaFetchSession,
        saved_user: watch::Receiver<MediaPreference>,
        saved_default: watch::Receiver<MediaPreference>,
        settings: watch::Receiver<MediaSelectorSettings>,
        context: watch::Receiver<MediaSelectorContext>,
    ) -> Self {
        let (list_tx, list_rx) = watch::channel(None);
        let mut results = session.cumulative_results();
        let keep_alive = session.clone();
        let pump = session.runtime().spawn(async move {
            let _session = keep_alive;
            while let Some(list) = results.next().await {
                if list_tx.send(Some(list)).is_err() {
                    break;
                }
            }
        });
        let mut selector = Self::new(list_rx, saved_user, saved_default, settings, context);
        selector.pump = Some(pump);
        selector
    }

    pub fn preference_item(&self, dimension: PreferenceDimension) -> MediaPreferenceItem<'_> {
        MediaPreferenceItem::new(self, dimension)
    }

    pub fn alliance(&self) -> MediaPreferenceItem<'_> {
        self.preference_item(PreferenceDimension::Alliance)
    }

    pub fn resolution(&self) -> MediaPreferenceItem<'_> {
        self.preference_item(PreferenceDimension::Resolution)
    }

    pub fn subtitle_language_id(&self) -> MediaPreferenceItem<'_> {
        self.preference_item(PreferenceDimension::SubtitleLanguage)
    }

    pub fn media_source_id(&self) -> MediaPreferenceItem<'_> {
        self.preference_item(PreferenceDimension::MediaSource)
    }

    /// Hard-filtered and sorted list; empty until the first list arrives.
    pub fn media_list(&self) -> Vec<Media> {
        self.inputs.media_list()
    }

    pub fn merged_preference(&self) -> MediaPreference {
        self.inputs.merged_preference()
    }

    /// Candidates once the media list has loaded.
    pub async fn filtered_candidates(&self) -> Vec<Media> {
        self.await_media_list().await;
        self.inputs.filtered_candidates()
    }

    pub fn filtered_candidates_now(&self) -> Vec<Media> {
        self.inputs.filtered_candidates()
    }

    /// Current candidates, then every distinct change. Ends when the
    /// selector is dropped.
    pub fn subscribe_filtered_candidates(&self) -> BoxStream<'static, Vec<Media>> {
        stream::unfold(
            (self.inputs.clone(), None::<Vec<Media>>),
            |(mut inputs, last)| async move {
                loop {
                    if last.is_none() && !inputs.is_loaded() {
                        inputs.changed().await?;
                        continue;
                    }
                    if last.is_some() {
                        inputs.changed().await?;
                    }
                    let candidates = inputs.filtered_candidates();
                    if last.as_ref() != Some(&candidates) {
                        return Some((candidates.clone(), (inputs, Some(candidates))));
                    }
                }
            },
        )
        .boxed()
    }

    pub fn selected(&self) -> watch::Receiver<Option<Media>> {
        self.selected.subscribe()
    }

    pub fn selected_now(&self) -> Option<Media> {
        self.selected.borrow().clone()
    }

    pub fn events(&self) -> &MediaSelectorEvents {
        &self.events
    }

    /// Select `media` and remember its properties for this session.
    ///
    /// Returns `false` without side effects when it is already selected.
    pub fn select(&self, media: &Media) -> bool {
        let changed = self.selected.send_if_modified(|current| {
            if current.as_ref() == Some(media) {
                return false;
            }
            *current = Some(media.clone());
            true
        });
        if !changed {
            return false;
        }
        debug!(media = %media.media_id, source = %media.media_source_id, "media selected");

        let props = &media.properties;
        self.alliance().prefer_without_broadcast(props.alliance.clone());
        self.resolution().prefer_without_broadcast(props.resolution.clone());
        self.media_source_id()
            .prefer_without_broadcast(media.media_source_id.clone());
        if let [language] = props.subtitle_language_ids.as_slice() {
            self.subtitle_language_id()
                .prefer_without_broadcast(language.clone());
        }

        self.broadcast_change_preference();
        self.events.publish_select(SelectEvent {
            media: media.clone(),
            subtitle_language_id: None,
        });
        true
    }

    /// Clear the selection. Preferences are kept.
    pub fn unselect(&self) {
        self.selected.send_replace(None);
    }

    /// Select by preference if nothing is selected yet.
    ///
    /// Waits for the media list and for every context field to load. Does
    /// not touch preferences.
    pub async fn try_select_default(&self) -> Option<Media> {
        if self.selected.borrow().is_some() {
            return None;
        }
        self.await_media_list().await;

        let context = {
            let mut rx = self.inputs.context.clone();
            let loaded = rx.wait_for(MediaSelectorContext::all_fields_loaded).await.map(|c| (*c).clone());
            loaded.unwrap_or_else(|_| rx.borrow().clone())
        };
        let candidates = self.inputs.filtered_candidates();
        if candidates.is_empty() {
            return None;
        }
        let merged = self.inputs.merged_preference();
        let available_alliances = self.alliance().available();
        let settings = self.inputs.settings.borrow().clone();

        let chosen = default_selection::select_default(&DefaultSelectionInput {
            candidates: &candidates,
            merged: &merged,
            available_alliances: &available_alliances,
            settings: &settings,
            context: &context,
        })?;
        self.select_if_unset(chosen)
    }

    /// Select the first local cache candidate if nothing is selected yet.
    pub async fn try_select_cached(&self) -> Option<Media> {
        if self.selected.borrow().is_some() {
            return None;
        }
        self.await_media_list().await;
        let cached = self
            .inputs
            .filtered_candidates()
            .into_iter()
            .find(Media::is_local_cache)?;
        self.select_if_unset(cached)
    }

    /// Drop preferences one dimension at a time until some candidate shows.
    pub async fn remove_preferences_until_first_candidate(&self) {
        self.await_media_list().await;
        if !self.inputs.filtered_candidates().is_empty() {
            return;
        }
        for dimension in PreferenceDimension::ALL {
            self.preference_item(dimension).remove_preference();
            if !self.inputs.filtered_candidates().is_empty() {
                debug!(%dimension, "candidates found after relaxing preferences");
                return;
            }
        }
    }

    pub(crate) fn media_list_receiver(&self) -> watch::Receiver<Option<MediaList>> {
        self.inputs.media_list.clone()
    }

    fn select_if_unset(&self, media: Media) -> Option<Media> {
        let set = self.selected.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(media.clone());
            true
        });
        if !set {
            return None;
        }
        info!(media = %media.media_id, source = %media.media_source_id, "media selected automatically");
        Some(media)
    }

    async fn await_media_list(&self) {
        let mut rx = self.inputs.media_list.clone();
        let _ = rx.wait_for(Option::is_some).await;
    }

    /// Emits nothing when nobody listens.
    fn broadcast_change_preference(&self) {
        if !self.events.has_preference_listeners() {
            return;
        }
        let merged = self.inputs.merged_preference();
        let mut preference = self.inputs.saved_user.borrow().clone();
        for dimension in PreferenceDimension::ALL {
            dimension.set_field(&mut preference, dimension.field(&merged).cloned());
        }
        self.events.publish_change_preference(preference);
    }
}

impl Drop for MediaSelector {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
