//! `mist-connect`: client-facing connector daemons for a media streaming
//! server — an HTTP multiplexing gateway and an RTMP ingest/playback
//! endpoint, both bridging to backend processes over local domain sockets.

pub mod amf;
pub mod backend;
pub mod cli;
pub mod error;
pub mod http;
pub mod media;
pub mod protocol;
pub mod rtmp;
