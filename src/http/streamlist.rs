//! Typed view of the stream-list JSON document (spec §6).
//!
//! Maintained by an external collaborator; this crate only reads it.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StreamList {
    pub streams: HashMap<String, StreamEntry>,
    pub config: StreamListConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamEntry {
    pub meta: StreamMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamMeta {
    pub video: Option<VideoMeta>,
    pub audio: Option<AudioMeta>,
    /// Finite duration in milliseconds, when known; absent/zero means live.
    pub length: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioMeta {}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamListConfig {
    pub protocols: Vec<ProtocolEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolEntry {
    pub connector: String,
    pub port: u16,
}

impl StreamList {
    /// Parse the stream-list document from disk. Errors are surfaced as
    /// `std::io::Error` (file not found, unreadable) or fall through to
    /// `serde_json`'s own parse error, both of which the HTTP responder
    /// treats as "stream not found" for the caller's purposes.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let raw = tokio::fs::read(path).await?;
        serde_json::from_slice(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl ProtocolEntry {
    pub fn is_rtmp(&self) -> bool {
        self.connector.eq_ignore_ascii_case("rtmp")
    }

    pub fn is_http(&self) -> bool {
        self.connector.eq_ignore_ascii_case("http")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_documented_shape() {
        let raw = r#"{
            "streams": {
                "foo": {"meta": {"video": {"width": 1280, "height": 720}}}
            },
            "config": {
                "protocols": [
                    {"connector": "RTMP", "port": 1935},
                    {"connector": "HTTP", "port": 8080}
                ]
            }
        }"#;
        let parsed: StreamList = serde_json::from_str(raw).unwrap();
        assert!(parsed.streams.contains_key("foo"));
        assert_eq!(parsed.config.protocols.len(), 2);
        assert!(parsed.config.protocols[0].is_rtmp());
        assert!(parsed.config.protocols[1].is_http());
    }
}
