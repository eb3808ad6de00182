pub mod artwork;
pub mod config;
pub mod model;

pub use artwork::artwork_url;
pub use config::{AddrError, AppConfig, ChannelConfig, PlayerConfig};
pub use model::{PlaybackState, RemoteId, RepeatMode, Track, DEFAULT_VOLUME};
