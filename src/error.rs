//! Error types shared across the connector crate.
//!
//! Each subsystem gets its own small enum rather than one catch-all error;
//! this keeps `match`es at call sites meaningful and avoids pulling in
//! `anyhow`/`thiserror` for what is, in every case, a short closed list of
//! failure modes.

use std::fmt;

/// Errors arising from AMF0/AMF3 decoding or encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfError {
    /// Ran out of bytes while a value was only partially decoded.
    UnexpectedEof,
    /// A type marker byte was not recognized (strict mode only).
    UnknownMarker(u8),
    /// A reference index pointed outside the reference table.
    InvalidReference(u16),
    /// Object/array nesting exceeded the configured depth limit.
    NestingTooDeep,
    /// A UTF-8 string field contained invalid bytes.
    InvalidUtf8,
    /// An AMF0 object was not terminated by the expected object-end marker.
    InvalidObjectEnd,
}

impl fmt::Display for AmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmfError::UnexpectedEof => write!(f, "unexpected end of AMF buffer"),
            AmfError::UnknownMarker(m) => write!(f, "unknown AMF type marker: 0x{m:02x}"),
            AmfError::InvalidReference(idx) => write!(f, "invalid AMF reference index: {idx}"),
            AmfError::NestingTooDeep => write!(f, "AMF value nesting exceeded the depth limit"),
            AmfError::InvalidUtf8 => write!(f, "AMF string was not valid UTF-8"),
            AmfError::InvalidObjectEnd => write!(f, "AMF object missing object-end marker"),
        }
    }
}

impl std::error::Error for AmfError {}

/// Errors arising from the RTMP handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeError {
    /// The peer sent an unsupported RTMP version byte in C0/S0.
    InvalidVersion(u8),
    /// The connection closed before the handshake completed.
    Incomplete,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::InvalidVersion(v) => write!(f, "unsupported RTMP version: {v}"),
            HandshakeError::Incomplete => write!(f, "connection closed during handshake"),
        }
    }
}

impl std::error::Error for HandshakeError {}

pub type Result<T> = std::result::Result<T, HandshakeError>;

/// Errors arising from RTMP chunk demultiplexing.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkError {
    /// End of stream was reached mid-chunk.
    UnexpectedEof,
    /// A chunk referenced a chunk-stream id with no prior header to extend.
    NoPriorHeader(u32),
    /// The basic-header format byte was outside 0..=3.
    InvalidFormat(u8),
    /// A message's declared length did not fit in the allowed range.
    MessageTooLarge(u32),
}

impl fmt::Display for ChunkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkError::UnexpectedEof => write!(f, "unexpected end of chunk stream"),
            ChunkError::NoPriorHeader(csid) => {
                write!(f, "chunk stream {csid} has no prior header to extend")
            }
            ChunkError::InvalidFormat(fmtb) => write!(f, "invalid chunk basic header format: {fmtb}"),
            ChunkError::MessageTooLarge(len) => write!(f, "message length {len} exceeds limit"),
        }
    }
}

impl std::error::Error for ChunkError {}

/// Errors arising from the backend bridge (the Unix-domain-socket client
/// used both by the HTTP pool and the RTMP per-session backend link).
#[derive(Debug)]
pub enum BridgeError {
    /// The backend socket could not be opened.
    Connect(std::io::Error),
    /// A read or write against an already-open backend socket failed.
    Io(std::io::Error),
    /// The backend did not respond within the allotted time.
    Timeout,
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Connect(e) => write!(f, "failed to connect to backend: {e}"),
            BridgeError::Io(e) => write!(f, "backend I/O error: {e}"),
            BridgeError::Timeout => write!(f, "backend did not respond in time"),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Connect(e) | BridgeError::Io(e) => Some(e),
            BridgeError::Timeout => None,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(e)
    }
}

/// Errors that terminate a single RTMP connection's task (spec §7: "a
/// fatal I/O error terminates just that worker"). Never escapes beyond
/// the per-connection task.
#[derive(Debug)]
pub enum SessionError {
    Io(std::io::Error),
    Chunk(ChunkError),
    Amf(AmfError),
    Handshake(HandshakeError),
    Bridge(BridgeError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "{e}"),
            SessionError::Chunk(e) => write!(f, "{e}"),
            SessionError::Amf(e) => write!(f, "{e}"),
            SessionError::Handshake(e) => write!(f, "{e}"),
            SessionError::Bridge(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Io(e)
    }
}

impl From<ChunkError> for SessionError {
    fn from(e: ChunkError) -> Self {
        SessionError::Chunk(e)
    }
}

impl From<AmfError> for SessionError {
    fn from(e: AmfError) -> Self {
        SessionError::Amf(e)
    }
}

impl From<HandshakeError> for SessionError {
    fn from(e: HandshakeError) -> Self {
        SessionError::Handshake(e)
    }
}

impl From<BridgeError> for SessionError {
    fn from(e: BridgeError) -> Self {
        SessionError::Bridge(e)
    }
}

/// Errors surfaced by the HTTP proxy path, distinguishing the two HTTP
/// status codes a caller needs to tell apart: a reachable-but-empty
/// backend versus one that never answered at all.
#[derive(Debug)]
pub enum ProxyError {
    /// Backend unreachable, silent beyond the timeout, or disconnected mid-flight.
    GatewayTimeout(String),
    /// The request could not be classified/routed at all.
    UnsupportedMedia(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::GatewayTimeout(msg) => write!(f, "gateway timeout: {msg}"),
            ProxyError::UnsupportedMedia(msg) => write!(f, "unsupported media: {msg}"),
        }
    }
}

impl std::error::Error for ProxyError {}
