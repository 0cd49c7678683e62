//! RTMP wire protocol: handshake, chunk framing, and the constants both
//! are defined in terms of.

pub mod chunk;
pub mod constants;
pub mod handshake;

pub use chunk::{ChunkDemuxer, RtmpMessage};
pub use handshake::{Handshake, HandshakeRole};
