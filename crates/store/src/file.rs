use crate::{NowPlayingStore, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use soundcloudify_core::{PlaybackState, Track};
use std::path::{Path, PathBuf};

const LIST_FILE: &str = "playlist.json";
const STATE_FILE: &str = "state.json";

/// Stores the playlist and state as two JSON files in one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T: DeserializeOwned>(
        &self,
        file: &str,
        what: &'static str,
    ) -> Result<Option<T>, StoreError> {
        let path = self.dir.join(file);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| StoreError::Decode { what, source })
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        file: &str,
        what: &'static str,
        value: &T,
    ) -> Result<(), StoreError> {
        let data =
            serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode { what, source })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Write {
                path: self.dir.clone(),
                source,
            })?;

        // Write beside the target, then rename, so readers never see a torn file.
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Write { path, source })
    }
}

#[async_trait]
impl NowPlayingStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get_list(&self) -> Result<Option<Vec<Track>>, StoreError> {
        self.read(LIST_FILE, "playlist").await
    }

    async fn save_list(&self, tracks: &[Track]) -> Result<(), StoreError> {
        self.write(LIST_FILE, "playlist", tracks).await
    }

    async fn get_state(&self) -> Result<Option<PlaybackState>, StoreError> {
        self.read(STATE_FILE, "state").await
    }

    async fn save_state(&self, state: &PlaybackState) -> Result<(), StoreError> {
        self.write(STATE_FILE, "state", state).await
    }
}

#[cfg(test)]
mod tests {
    use super::FileStore;
    use crate::{load_session, NowPlayingStore, StoreError};
    use soundcloudify_core::{PlaybackState, RepeatMode, Track};

    #[tokio::test]
    async fn missing_files_read_as_nothing_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert!(store.get_list().await.unwrap().is_none());
        assert!(store.get_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_session_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data"));

        let tracks = vec![Track::new(1, "A").fresh_copy(), Track::new(2, "B").fresh_copy()];
        let mut state = PlaybackState::with_volume(0.7);
        state.current_track = Some(tracks[1].clone());
        state.current_index = 1;
        state.repeat = RepeatMode::All;

        store.save_list(&tracks).await.unwrap();
        store.save_state(&state).await.unwrap();
        assert!(!dir.path().join("data").join("state.json.tmp").exists());

        let session = load_session(&store, 0.5).await;
        assert_eq!(session.tracks, tracks);
        assert_eq!(session.state, state);
    }

    #[tokio::test]
    async fn garbage_state_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), b"{ volume: ").unwrap();

        let store = FileStore::new(dir.path());
        let err = store.get_state().await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { what: "state", .. }));

        let session = load_session(&store, 0.5).await;
        assert_eq!(session.state, PlaybackState::default());
    }
}
