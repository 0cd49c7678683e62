//! The internal frame envelope exchanged with backend processes over the
//! bridge socket.
//!
//! The internal frame container format itself is out of scope (spec §1
//! Non-goals: "the internal frame container format"); this module defines
//! just enough of an envelope — a kind tag, a timestamp, and an opaque
//! payload — for the play pump and publish sink (§4.9) to move frames
//! across the bridge without needing the backend's full schema.

use bytes::{Buf, BufMut, Bytes, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    MetadataInit,
    AudioInit,
    VideoInit,
    Audio,
    Video,
}

impl FrameKind {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FrameKind::MetadataInit),
            1 => Some(FrameKind::AudioInit),
            2 => Some(FrameKind::VideoInit),
            3 => Some(FrameKind::Audio),
            4 => Some(FrameKind::Video),
            _ => None,
        }
    }

    fn tag(self) -> u8 {
        match self {
            FrameKind::MetadataInit => 0,
            FrameKind::AudioInit => 1,
            FrameKind::VideoInit => 2,
            FrameKind::Audio => 3,
            FrameKind::Video => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InternalFrame {
    pub kind: FrameKind,
    pub timestamp: u32,
    pub payload: Bytes,
}

/// Reassembles frames out of whatever bytes the backend bridge hands back,
/// one `read_some` at a time. Kept as a plain buffer (rather than an async
/// read loop) so the play pump can feed it from inside a `tokio::select!`
/// arm without losing partial state across cancellations — the same
/// reasoning behind [`crate::protocol::chunk::ChunkDemuxer`] on the RTMP
/// wire side.
#[derive(Debug, Default)]
pub struct FrameDemuxer {
    buf: BytesMut,
}

impl FrameDemuxer {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Append freshly-read bytes from the backend socket.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pull the next complete frame out of the buffer, if one has fully
    /// arrived. Call in a loop after every `feed` until it returns `None`.
    pub fn try_next(&mut self) -> Option<InternalFrame> {
        if self.buf.len() < 9 {
            return None;
        }
        let tag = self.buf[0];
        let timestamp = u32::from_be_bytes(self.buf[1..5].try_into().unwrap());
        let len = u32::from_be_bytes(self.buf[5..9].try_into().unwrap()) as usize;
        if self.buf.len() < 9 + len {
            return None;
        }
        self.buf.advance(9);
        let payload = self.buf.split_to(len).freeze();
        let kind = FrameKind::from_tag(tag).unwrap_or(FrameKind::Video);
        Some(InternalFrame { kind, timestamp, payload })
    }
}

pub fn encode_frame(frame: &InternalFrame) -> Bytes {
    let mut out = BytesMut::with_capacity(9 + frame.payload.len());
    out.put_u8(frame.kind.tag());
    out.put_u32(frame.timestamp);
    out.put_u32(frame.payload.len() as u32);
    out.extend_from_slice(&frame.payload);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_frame_round_trips_header_fields() {
        let frame = InternalFrame {
            kind: FrameKind::Video,
            timestamp: 12345,
            payload: Bytes::from_static(b"nalu"),
        };
        let encoded = encode_frame(&frame);
        assert_eq!(encoded[0], FrameKind::Video.tag());
        assert_eq!(u32::from_be_bytes(encoded[1..5].try_into().unwrap()), 12345);
        assert_eq!(u32::from_be_bytes(encoded[5..9].try_into().unwrap()), 4);
        assert_eq!(&encoded[9..], b"nalu");
    }

    #[test]
    fn demuxer_reassembles_a_frame_split_across_feeds() {
        let frame = InternalFrame {
            kind: FrameKind::AudioInit,
            timestamp: 0,
            payload: Bytes::from_static(b"config"),
        };
        let encoded = encode_frame(&frame);

        let mut demux = FrameDemuxer::new();
        demux.feed(&encoded[..5]);
        assert!(demux.try_next().is_none());
        demux.feed(&encoded[5..]);
        let parsed = demux.try_next().unwrap();
        assert_eq!(parsed.kind, FrameKind::AudioInit);
        assert_eq!(&parsed.payload[..], b"config");
        assert!(demux.try_next().is_none());
    }

    #[test]
    fn demuxer_yields_back_to_back_frames_fed_in_one_chunk() {
        let a = encode_frame(&InternalFrame { kind: FrameKind::Audio, timestamp: 1, payload: Bytes::from_static(b"a") });
        let b = encode_frame(&InternalFrame { kind: FrameKind::Video, timestamp: 2, payload: Bytes::from_static(b"bb") });

        let mut demux = FrameDemuxer::new();
        demux.feed(&a);
        demux.feed(&b);
        assert_eq!(demux.try_next().unwrap().kind, FrameKind::Audio);
        assert_eq!(demux.try_next().unwrap().kind, FrameKind::Video);
        assert!(demux.try_next().is_none());
    }
}
