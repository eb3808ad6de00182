use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

fn default_schema_version() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Name announced in the handshake line when the port opens.
    pub name: String,
    pub background_addr: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "soundcloudify".to_string(),
            background_addr: "tcp://127.0.0.1:7373".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddrError {
    #[error("invalid background_addr {addr}: {reason}")]
    Invalid { addr: String, reason: String },
    #[error("unsupported background_addr scheme {0}; expected tcp://")]
    Scheme(String),
    #[error("background_addr {addr} has no {part}")]
    Missing { addr: String, part: &'static str },
}

impl ChannelConfig {
    /// `host:port` of the background process, taken from a `tcp://` URL.
    pub fn socket_addr(&self) -> Result<String, AddrError> {
        let addr = &self.background_addr;
        let url = Url::parse(addr).map_err(|err| AddrError::Invalid {
            addr: addr.clone(),
            reason: err.to_string(),
        })?;
        if url.scheme() != "tcp" {
            return Err(AddrError::Scheme(url.scheme().to_string()));
        }
        let missing = |part| AddrError::Missing {
            addr: addr.clone(),
            part,
        };
        let host = url.host_str().ok_or_else(|| missing("host"))?;
        let port = url.port().ok_or_else(|| missing("port"))?;
        Ok(format!("{host}:{port}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub volume_save_debounce_ms: u64,
    pub default_volume: f64,
    pub artwork_placeholder: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume_save_debounce_ms: 500,
            default_volume: crate::model::DEFAULT_VOLUME,
            artwork_placeholder: "images/artwork-default.jpg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub channel: ChannelConfig,
    pub player: PlayerConfig,
    /// Where the playlist and state files live. Empty means the platform
    /// data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            channel: ChannelConfig::default(),
            player: PlayerConfig::default(),
            data_dir: None,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AddrError, AppConfig, ChannelConfig};

    #[test]
    fn default_config_survives_toml() {
        let cfg = AppConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.channel.name, "soundcloudify");
        assert_eq!(back.player.volume_save_debounce_ms, 500);
        assert!(back.data_dir.is_none());
    }

    #[test]
    fn socket_addr_requires_tcp_host_and_port() {
        let ok = ChannelConfig::default();
        assert_eq!(ok.socket_addr().unwrap(), "127.0.0.1:7373");

        let mut bad = ChannelConfig::default();
        bad.background_addr = "ws://127.0.0.1:7373".to_string();
        assert_eq!(bad.socket_addr(), Err(AddrError::Scheme("ws".to_string())));

        bad.background_addr = "tcp://localhost".to_string();
        assert!(matches!(
            bad.socket_addr(),
            Err(AddrError::Missing { part: "port", .. })
        ));

        bad.background_addr = "not a url".to_string();
        assert!(matches!(bad.socket_addr(), Err(AddrError::Invalid { .. })));
    }
}
