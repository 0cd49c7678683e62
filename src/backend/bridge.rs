//! Async client for the local-domain-socket backend protocol.
//!
//! Both the HTTP pool and the RTMP session use this to talk to an
//! external backend process: write line-oriented ASCII commands and/or
//! framed binary payloads, read back whatever the backend produces.
//! Nothing here understands the shape of that payload — the HTTP proxy
//! and the RTMP play pump interpret it differently.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::error::BridgeError;

/// A connected backend socket.
pub struct BackendBridge {
    socket: UnixStream,
}

impl BackendBridge {
    /// Open a fresh connection to a backend domain socket at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let socket = UnixStream::connect(path.as_ref())
            .await
            .map_err(BridgeError::Connect)?;
        Ok(Self { socket })
    }

    /// Path of the per-protocol HTTP backend socket for `tag` (spec §6).
    pub fn http_backend_path(backend_root: &Path, tag: &str) -> PathBuf {
        backend_root.join(format!("http_{tag}"))
    }

    /// Path of the per-stream buffer backend socket for a sanitized stream
    /// name (spec §6, the "getStream" utility).
    pub fn stream_backend_path(backend_root: &Path, stream: &str) -> PathBuf {
        backend_root.join(format!("stream_{stream}"))
    }

    /// Write raw bytes (a serialized HTTP request, a framed media packet, …).
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), BridgeError> {
        self.socket.write_all(buf).await.map_err(BridgeError::from)
    }

    /// Write one line-oriented ASCII backend command (`"p\n"`, `"s 1500\n"`, …).
    pub async fn send_command(&mut self, line: &str) -> Result<(), BridgeError> {
        self.write_all(line.as_bytes()).await
    }

    /// Read whatever bytes are currently available, blocking (asynchronously)
    /// until at least one byte arrives or the socket closes.
    pub async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, BridgeError> {
        self.socket.read(buf).await.map_err(BridgeError::from)
    }

    /// Like [`read_some`](Self::read_some), but gives up with
    /// [`BridgeError::Timeout`] if no bytes arrive within `limit`.
    pub async fn read_with_timeout(
        &mut self,
        buf: &mut [u8],
        limit: Duration,
    ) -> Result<usize, BridgeError> {
        match tokio::time::timeout(limit, self.socket.read(buf)).await {
            Ok(result) => result.map_err(BridgeError::from),
            Err(_) => Err(BridgeError::Timeout),
        }
    }

    /// Hand back the raw socket, e.g. to pump an open-ended streaming HTTP
    /// body verbatim (spec §4.3, `BackendResponse::Streaming`).
    pub fn into_inner(self) -> UnixStream {
        self.socket
    }

    pub fn get_mut(&mut self) -> &mut UnixStream {
        &mut self.socket
    }
}
