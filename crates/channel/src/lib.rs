//! Message channel between the player front-end and the background process
//! that owns audio playback.
//!
//! Every message travels as a JSON envelope `{"message": "scd.<tag>", "data": ...}`.
//! Commands flow out to the background, events flow back in and are handed to
//! at most one handler per [`EventKind`].

mod handlers;
mod port;

pub use handlers::{Handler, HandlerTable};
pub use port::{connect, open, PortEvents, PortSender};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use soundcloudify_core::{PlaybackState, Track};
use thiserror::Error;
use tokio::sync::mpsc;

pub const TAG_PLAY: &str = "scd.play";
pub const TAG_PAUSE: &str = "scd.pause";
pub const TAG_RESUME: &str = "scd.resume";
pub const TAG_NEXT: &str = "scd.next";
pub const TAG_PREV: &str = "scd.prev";
pub const TAG_CLEAR: &str = "scd.clear";
pub const TAG_SEEK: &str = "scd.seek";
pub const TAG_VOLUME: &str = "scd.volume";

pub const TAG_TIME_UPDATE: &str = "scd.timeupdate";
pub const TAG_ENDED: &str = "scd.ended";
pub const TAG_TRACK_CHANGED: &str = "scd.trackChangedFromBackground";
pub const TAG_ERROR: &str = "scd.error";

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to connect to background process at {addr}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("channel i/o failed")]
    Io(#[from] std::io::Error),
    #[error("malformed message envelope")]
    Envelope(#[source] serde_json::Error),
    #[error("malformed payload for {tag}")]
    Payload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn bare(message: &str) -> Self {
        Self {
            message: message.to_string(),
            data: None,
        }
    }

    pub fn with_data(message: &str, data: Value) -> Self {
        Self {
            message: message.to_string(),
            data: Some(data),
        }
    }

    pub fn to_line(&self) -> Result<String, ChannelError> {
        serde_json::to_string(self).map_err(ChannelError::Envelope)
    }

    pub fn from_line(line: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(line).map_err(ChannelError::Envelope)
    }

    fn payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ChannelError> {
        serde_json::from_value(self.data.clone().unwrap_or(Value::Null)).map_err(|source| {
            ChannelError::Payload {
                tag: self.message.clone(),
                source,
            }
        })
    }
}

/// Outbound, fire-and-forget instruction for the background process.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play { track: Track },
    Pause,
    Resume,
    Next,
    Prev,
    Clear,
    /// Position as a fraction of the track duration.
    Seek { xpos: f64 },
    Volume { volume: f64 },
}

impl Command {
    pub fn tag(&self) -> &'static str {
        match self {
            Command::Play { .. } => TAG_PLAY,
            Command::Pause => TAG_PAUSE,
            Command::Resume => TAG_RESUME,
            Command::Next => TAG_NEXT,
            Command::Prev => TAG_PREV,
            Command::Clear => TAG_CLEAR,
            Command::Seek { .. } => TAG_SEEK,
            Command::Volume { .. } => TAG_VOLUME,
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        match self {
            Command::Play { track } => Envelope::with_data(TAG_PLAY, json!({ "track": track })),
            Command::Seek { xpos } => Envelope::with_data(TAG_SEEK, json!({ "xpos": xpos })),
            Command::Volume { volume } => {
                Envelope::with_data(TAG_VOLUME, json!({ "volume": volume }))
            }
            other => Envelope::bare(other.tag()),
        }
    }
}

/// Periodic playback progress pushed by the background process.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeUpdate {
    #[serde(default)]
    pub track: Option<Track>,
    #[serde(default)]
    pub current_time: f64,
    #[serde(default)]
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TimeUpdate,
    Ended,
    TrackChanged,
    Error,
}

impl EventKind {
    pub const COUNT: usize = 4;
    pub const ALL: [EventKind; EventKind::COUNT] = [
        EventKind::TimeUpdate,
        EventKind::Ended,
        EventKind::TrackChanged,
        EventKind::Error,
    ];

    pub(crate) fn slot(self) -> usize {
        match self {
            EventKind::TimeUpdate => 0,
            EventKind::Ended => 1,
            EventKind::TrackChanged => 2,
            EventKind::Error => 3,
        }
    }
}

/// Inbound notification from the background process.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TimeUpdate(TimeUpdate),
    Ended,
    TrackChanged(Box<PlaybackState>),
    Error,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::TimeUpdate(_) => EventKind::TimeUpdate,
            Event::Ended => EventKind::Ended,
            Event::TrackChanged(_) => EventKind::TrackChanged,
            Event::Error => EventKind::Error,
        }
    }

    /// `Ok(None)` for tags this front-end does not listen to.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, ChannelError> {
        Ok(Some(match envelope.message.as_str() {
            TAG_TIME_UPDATE => Event::TimeUpdate(envelope.payload()?),
            TAG_ENDED => Event::Ended,
            TAG_TRACK_CHANGED => Event::TrackChanged(Box::new(envelope.payload()?)),
            TAG_ERROR => Event::Error,
            _ => return Ok(None),
        }))
    }
}

/// Where the player sends its commands. Sending never blocks and never fails
/// from the caller's point of view.
pub trait CommandSink: Send {
    fn send(&mut self, command: Command);
}

impl CommandSink for mpsc::UnboundedSender<Command> {
    fn send(&mut self, command: Command) {
        if mpsc::UnboundedSender::send(self, command).is_err() {
            tracing::warn!("command receiver dropped; command discarded");
        }
    }
}
