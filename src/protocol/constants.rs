//! Normative protocol constants (spec §3).

/// RTMP version byte sent in C0/S0.
pub const RTMP_VERSION: u8 = 3;

/// Size of a single handshake packet body (C1/S1/C2/S2), not counting the
/// leading version byte on C0/S0.
pub const HANDSHAKE_SIZE: usize = 1536;

/// Chunk-stream id the server uses for every message it originates
/// (control replies, AMF command replies, and media). The reference
/// implementation never distinguishes categories onto separate chunk
/// streams, and no interop evidence motivates splitting it here either.
pub const SERVER_CHUNK_STREAM_ID: u32 = 3;

/// Default chunk size in effect before any `Set Chunk Size` message.
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// Chunk size the server negotiates for its own sends immediately after
/// a successful `connect`.
pub const POST_CONNECT_CHUNK_SIZE: u32 = 4096;

/// Chunk size the server negotiates for its own sends once the first
/// frame is pumped out after a `play` reply.
pub const POST_PLAY_CHUNK_SIZE: u32 = 102_400;

/// Default window acknowledgement size advertised to peers.
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;

/// Default peer bandwidth advertised to peers.
pub const DEFAULT_PEER_BANDWIDTH: u32 = 2_500_000;

/// `clientid` value embedded in every onStatus / `_result` info object,
/// matching the reference implementation's fixed value.
pub const CLIENT_ID: f64 = 1337.0;

/// `fmsVer` server-properties string echoed back on `connect`.
pub const FMS_VERSION: &str = "FMS/3,5,5,2004";

/// `capabilities` value echoed back on `connect`.
pub const CAPABILITIES: f64 = 31.0;

/// `mode` value echoed back on `connect`.
pub const MODE: f64 = 1.0;

/// How many publish-direction media/meta chunks are buffered before the
/// accumulated metadata + buffer are flushed as one burst (§4.9).
pub const PUBLISH_PREBUFFER_FRAMES: usize = 8;

/// Maximum allowed message body size for a single reassembled RTMP
/// message; guards against a hostile/buggy peer declaring an enormous
/// length and exhausting memory while the demuxer accumulates payload.
pub const MAX_MESSAGE_SIZE: u32 = 64 * 1024 * 1024;
