use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier assigned by the remote catalogue. SoundCloud hands out numbers,
/// other sources use strings, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Num(u64),
    Str(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Num(n) => write!(f, "{n}"),
            RemoteId::Str(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RemoteId {
    fn from(value: u64) -> Self {
        RemoteId::Num(value)
    }
}

impl From<&str> for RemoteId {
    fn from(value: &str) -> Self {
        RemoteId::Str(value.to_string())
    }
}

/// A playable item. `uuid` identifies this playlist entry; `id` identifies the
/// remote track and may repeat across entries.
/// Field names follow the remote catalogue's JSON (`artwork_url`, `stream_url`).
/// Entry ids are opaque: new ones are v4 UUIDs, but any string is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub id: RemoteId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    /// Remote metadata this crate does not interpret, kept for round-trips.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Track {
    pub fn new(id: impl Into<RemoteId>, title: impl Into<String>) -> Self {
        Self {
            uuid: None,
            id: id.into(),
            title: title.into(),
            artwork_url: None,
            stream_url: None,
            error: false,
            extra: serde_json::Map::new(),
        }
    }

    /// Copy of this track carrying a freshly generated entry id.
    pub fn fresh_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.uuid = Some(new_entry_id());
        copy
    }

    pub fn ensure_uuid(&mut self) -> &str {
        self.uuid.get_or_insert_with(new_entry_id)
    }

    /// Same playlist entry: both carry a uuid and the uuids are equal.
    pub fn same_entry(&self, other: &Track) -> bool {
        matches!((&self.uuid, &other.uuid), (Some(a), Some(b)) if a == b)
    }
}

fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RepeatMode {
    #[default]
    None,
    All,
    One,
}

impl RepeatMode {
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::None => "none",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }
}

impl TryFrom<u8> for RepeatMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RepeatMode::None),
            1 => Ok(RepeatMode::All),
            2 => Ok(RepeatMode::One),
            other => Err(format!("invalid repeat mode {other}")),
        }
    }
}

impl From<RepeatMode> for u8 {
    fn from(value: RepeatMode) -> Self {
        match value {
            RepeatMode::None => 0,
            RepeatMode::All => 1,
            RepeatMode::One => 2,
        }
    }
}

pub const DEFAULT_VOLUME: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    #[serde(default, deserialize_with = "track_or_absent")]
    pub current_track: Option<Track>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub current_time: f64,
    #[serde(default)]
    pub duration: f64,
    // Required: a state saved without a volume is treated as unusable.
    pub volume: f64,
    #[serde(default)]
    pub repeat: RepeatMode,
    #[serde(default)]
    pub shuffle: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::with_volume(DEFAULT_VOLUME)
    }
}

impl PlaybackState {
    pub fn with_volume(volume: f64) -> Self {
        Self {
            current_track: None,
            current_index: 0,
            playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: volume.clamp(0.0, 1.0),
            repeat: RepeatMode::None,
            shuffle: false,
        }
    }

    /// Drops the current track and position, keeping user preferences.
    pub fn reset_playback(&mut self) {
        self.current_track = None;
        self.current_index = 0;
        self.playing = false;
        self.current_time = 0.0;
        self.duration = 0.0;
    }
}

// The background process historically wrote `false` for "no track".
fn track_or_absent<'de, D>(deserializer: D) -> Result<Option<Track>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Slot {
        Track(Box<Track>),
        Flag(bool),
    }

    match Option::<Slot>::deserialize(deserializer)? {
        Some(Slot::Track(track)) => Ok(Some(*track)),
        Some(Slot::Flag(false)) | None => Ok(None),
        Some(Slot::Flag(true)) => Err(serde::de::Error::custom(
            "currentTrack must be a track, null or false",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaybackState, RemoteId, RepeatMode, Track};
    use serde_json::json;

    #[test]
    fn repeat_cycles_through_all_modes() {
        let start = RepeatMode::None;
        assert_eq!(start.cycle(), RepeatMode::All);
        assert_eq!(start.cycle().cycle(), RepeatMode::One);
        assert_eq!(start.cycle().cycle().cycle(), start);
    }

    #[test]
    fn state_accepts_false_as_missing_track() {
        let state: PlaybackState = serde_json::from_value(json!({
            "currentTrack": false,
            "currentIndex": 0,
            "playing": false,
            "currentTime": 0,
            "duration": 0,
            "volume": 0.8,
            "repeat": 2,
            "shuffle": true
        }))
        .unwrap();

        assert!(state.current_track.is_none());
        assert_eq!(state.repeat, RepeatMode::One);
        assert!(state.shuffle);
        assert_eq!(state.volume, 0.8);
    }

    #[test]
    fn state_without_volume_is_rejected() {
        let parsed = serde_json::from_value::<PlaybackState>(json!({
            "currentIndex": 3,
            "playing": true
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn track_keeps_unknown_remote_fields() {
        let raw = json!({
            "id": 123,
            "title": "Song",
            "artwork_url": "https://i1.sndcdn.com/a-large.jpg",
            "user": {"username": "someone"},
            "duration": 215000
        });
        let track: Track = serde_json::from_value(raw).unwrap();
        assert_eq!(track.id, RemoteId::Num(123));
        assert!(track.uuid.is_none());
        assert!(!track.error);

        let back = serde_json::to_value(&track).unwrap();
        assert_eq!(back["user"]["username"], "someone");
        assert_eq!(back["duration"], 215000);
        assert!(back.get("error").is_none());
    }

    #[test]
    fn fresh_copies_get_distinct_entry_ids() {
        let track = Track::new("abc", "Song");
        let a = track.fresh_copy();
        let b = track.fresh_copy();
        assert!(a.uuid.is_some());
        assert_ne!(a.uuid, b.uuid);
        assert!(!a.same_entry(&b));
        assert!(a.same_entry(&a.clone()));
    }

    #[test]
    fn foreign_entry_ids_are_kept_verbatim() {
        let mut track: Track =
            serde_json::from_value(json!({"id": 1, "title": "A", "uuid": "_k3j9x2a"})).unwrap();
        assert_eq!(track.ensure_uuid(), "_k3j9x2a");
        assert_eq!(serde_json::to_value(&track).unwrap()["uuid"], "_k3j9x2a");
    }
}
