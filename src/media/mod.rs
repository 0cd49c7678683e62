//! Media handling for RTMP
//!
//! The internal frame container format and its codec bitstreams are out
//! of scope (spec §1 Non-goals); the only media concern this crate owns
//! is FLV tag parsing/generation, since the play pump and publish sink
//! need it to translate between RTMP media chunks and the backend's
//! frame format.

pub mod flv;

pub use flv::{AudioFormat, FlvTag, FlvTagType, VideoCodec, VideoFrameType};
