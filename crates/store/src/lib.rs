//! Persisted playlist and playback state ("now playing").

mod file;
mod writer;

pub use file::FileStore;
pub use writer::{spawn_writer, PersistRequest, Persistence};

use async_trait::async_trait;
use serde_json::Value;
use soundcloudify_core::{PlaybackState, Track};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode stored {what}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {what}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Asynchronous key-value home of the playlist and the playback state.
/// `Ok(None)` means nothing was stored yet.
#[async_trait]
pub trait NowPlayingStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get_list(&self) -> Result<Option<Vec<Track>>, StoreError>;
    async fn save_list(&self, tracks: &[Track]) -> Result<(), StoreError>;
    async fn get_state(&self) -> Result<Option<PlaybackState>, StoreError>;
    async fn save_state(&self, state: &PlaybackState) -> Result<(), StoreError>;
}

/// What the player starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub tracks: Vec<Track>,
    pub state: PlaybackState,
}

/// Loads the stored session. Anything missing or unreadable falls back to
/// defaults; a state that disagrees with the list is repaired.
pub async fn load_session(store: &dyn NowPlayingStore, default_volume: f64) -> Session {
    let mut tracks = match store.get_list().await {
        Ok(Some(tracks)) => tracks,
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(store = store.name(), error = %err, "stored playlist unusable; starting empty");
            Vec::new()
        }
    };
    for track in tracks.iter_mut() {
        track.ensure_uuid();
    }

    let mut state = match store.get_state().await {
        Ok(Some(state)) => state,
        Ok(None) => PlaybackState::with_volume(default_volume),
        Err(err) => {
            warn!(store = store.name(), error = %err, "stored state unusable; using defaults");
            PlaybackState::with_volume(default_volume)
        }
    };
    state.volume = state.volume.clamp(0.0, 1.0);
    reconcile(&tracks, &mut state);

    debug!(
        store = store.name(),
        tracks = tracks.len(),
        current = ?state.current_track.as_ref().map(|t| &t.title),
        "session loaded"
    );
    Session { tracks, state }
}

fn reconcile(tracks: &[Track], state: &mut PlaybackState) {
    let Some(current) = state.current_track.as_mut() else {
        if state.current_index >= tracks.len() {
            state.current_index = 0;
        }
        return;
    };

    if let Some(index) = tracks.iter().position(|t| t.same_entry(current)) {
        state.current_index = index;
        return;
    }

    // Entry ids may be missing from older saves; accept the stored index if
    // it still points at the same remote track.
    match tracks.get(state.current_index) {
        Some(entry) if entry.id == current.id => {
            current.uuid = entry.uuid.clone();
        }
        _ => {
            debug!("stored current track no longer in playlist; clearing it");
            state.reset_playback();
        }
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    list: Option<Value>,
    state: Option<Value>,
    list_saves: Vec<Vec<Track>>,
    state_saves: Vec<PlaybackState>,
}

/// In-process store that keeps every save it receives. Cloning shares the
/// same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds raw stored values, as another writer might have left them.
    pub fn with_raw(list: Option<Value>, state: Option<Value>) -> Self {
        let store = Self::default();
        {
            let mut inner = store.lock();
            inner.list = list;
            inner.state = state;
        }
        store
    }

    pub fn list_saves(&self) -> Vec<Vec<Track>> {
        self.lock().list_saves.clone()
    }

    pub fn state_saves(&self) -> Vec<PlaybackState> {
        self.lock().state_saves.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A panic while holding the lock cannot leave the data half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl NowPlayingStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get_list(&self) -> Result<Option<Vec<Track>>, StoreError> {
        self.lock()
            .list
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|source| StoreError::Decode {
                what: "playlist",
                source,
            })
    }

    async fn save_list(&self, tracks: &[Track]) -> Result<(), StoreError> {
        let value = serde_json::to_value(tracks).map_err(|source| StoreError::Encode {
            what: "playlist",
            source,
        })?;
        let mut inner = self.lock();
        inner.list = Some(value);
        inner.list_saves.push(tracks.to_vec());
        Ok(())
    }

    async fn get_state(&self) -> Result<Option<PlaybackState>, StoreError> {
        self.lock()
            .state
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|source| StoreError::Decode {
                what: "state",
                source,
            })
    }

    async fn save_state(&self, state: &PlaybackState) -> Result<(), StoreError> {
        let value = serde_json::to_value(state).map_err(|source| StoreError::Encode {
            what: "state",
            source,
        })?;
        let mut inner = self.lock();
        inner.state = Some(value);
        inner.state_saves.push(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{load_session, MemoryStore, NowPlayingStore};
    use serde_json::json;
    use soundcloudify_core::{PlaybackState, RepeatMode, Track};

    #[tokio::test]
    async fn empty_store_yields_defaults() {
        let store = MemoryStore::new();
        let session = load_session(&store, 0.4).await;
        assert!(session.tracks.is_empty());
        assert_eq!(session.state, PlaybackState::with_volume(0.4));
    }

    #[tokio::test]
    async fn partial_state_is_not_adopted() {
        let store = MemoryStore::with_raw(
            Some(json!([{"id": 1, "title": "A"}])),
            Some(json!({"currentIndex": 0, "playing": true, "repeat": 1})),
        );
        let session = load_session(&store, 0.5).await;
        assert_eq!(session.tracks.len(), 1);
        assert!(session.tracks[0].uuid.is_some());
        assert_eq!(session.state, PlaybackState::default());
    }

    #[tokio::test]
    async fn unreadable_list_starts_empty() {
        let store = MemoryStore::with_raw(Some(json!({"not": "a list"})), None);
        let session = load_session(&store, 0.5).await;
        assert!(session.tracks.is_empty());
    }

    #[tokio::test]
    async fn current_track_is_relocated_by_entry_id() {
        let a = Track::new(1, "A").fresh_copy();
        let b = Track::new(2, "B").fresh_copy();
        let store = MemoryStore::new();
        store.save_list(&[a.clone(), b.clone()]).await.unwrap();

        let mut state = PlaybackState::default();
        state.current_track = Some(b.clone());
        state.current_index = 0;
        store.save_state(&state).await.unwrap();

        let session = load_session(&store, 0.5).await;
        assert_eq!(session.state.current_index, 1);
        assert_eq!(session.state.current_track, Some(b));
    }

    #[tokio::test]
    async fn stale_current_track_is_cleared() {
        let store = MemoryStore::new();
        store
            .save_list(&[Track::new(1, "A").fresh_copy()])
            .await
            .unwrap();

        let mut state = PlaybackState::with_volume(0.9);
        state.current_track = Some(Track::new(99, "Gone").fresh_copy());
        state.current_index = 4;
        state.playing = true;
        store.save_state(&state).await.unwrap();

        let session = load_session(&store, 0.5).await;
        assert!(session.state.current_track.is_none());
        assert_eq!(session.state.current_index, 0);
        assert!(!session.state.playing);
        assert_eq!(session.state.volume, 0.9);
    }

    #[tokio::test]
    async fn out_of_range_index_without_current_track_is_reset() {
        let store = MemoryStore::with_raw(
            Some(json!([{"id": 1, "title": "A"}, {"id": 2, "title": "B"}])),
            Some(json!({"currentTrack": false, "currentIndex": 7, "volume": 0.3, "repeat": 1})),
        );
        let session = load_session(&store, 0.5).await;
        assert_eq!(session.tracks.len(), 2);
        assert!(session.state.current_track.is_none());
        assert_eq!(session.state.current_index, 0);
        assert_eq!(session.state.volume, 0.3);
        assert_eq!(session.state.repeat, RepeatMode::All);
    }

    #[tokio::test]
    async fn foreign_entry_ids_survive_loading() {
        let store = MemoryStore::with_raw(
            Some(json!([
                {"id": 1, "title": "A", "uuid": "_k3j9x2a"},
                {"id": 2, "title": "B"}
            ])),
            Some(json!({
                "currentTrack": {"id": 1, "title": "A", "uuid": "_k3j9x2a"},
                "currentIndex": 1,
                "volume": 0.5
            })),
        );
        let session = load_session(&store, 0.5).await;
        assert_eq!(session.tracks.len(), 2);
        assert_eq!(session.tracks[0].uuid.as_deref(), Some("_k3j9x2a"));
        assert!(session.tracks[1].uuid.is_some());
        assert_eq!(session.state.current_index, 0);
        assert_eq!(session.state.current_track.unwrap().title, "A");
    }
}
