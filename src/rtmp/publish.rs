//! Publish-direction sink (spec §4.9): each incoming audio/video/meta chunk
//! becomes an FLV tag, then an internal frame. The first
//! [`PUBLISH_PREBUFFER_FRAMES`] frames are held back; once that many have
//! arrived, the accumulated metadata document and the held frames are
//! flushed to the backend as a single burst, followed directly by the
//! triggering frame. Every frame after that forwards immediately.
//!
//! Grounded in the reference connector's `prebuffer` stringstream and
//! `meta_out` accumulator (`parseChunk`, case 8/9/18): counting up to 8
//! buffered packets before flushing metadata + buffer + the 9th packet in
//! one `SendNow`.

use bytes::{Bytes, BytesMut};

use crate::media::FlvTag;
use crate::protocol::constants::PUBLISH_PREBUFFER_FRAMES;
use crate::rtmp::frame::{encode_frame, FrameKind, InternalFrame};

/// The stream metadata document built up from sequence headers seen so far,
/// standing in for the reference implementation's persistent per-stream
/// `meta_out` track model.
#[derive(Debug, Default)]
struct MetadataDoc {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl MetadataDoc {
    fn observe(&mut self, tag: &FlvTag) {
        if tag.is_avc_sequence_header() {
            let mut video = serde_json::Map::new();
            video.insert("init".to_string(), serde_json::Value::Bool(true));
            self.fields.insert("video".to_string(), serde_json::Value::Object(video));
        } else if tag.is_aac_sequence_header() {
            let mut audio = serde_json::Map::new();
            audio.insert("init".to_string(), serde_json::Value::Bool(true));
            self.fields.insert("audio".to_string(), serde_json::Value::Object(audio));
        }
    }

    fn to_bytes(&self) -> Bytes {
        let value = serde_json::Value::Object(self.fields.clone());
        Bytes::from(serde_json::to_vec(&value).unwrap_or_default())
    }
}

fn classify(tag: &FlvTag) -> FrameKind {
    if tag.is_avc_sequence_header() {
        FrameKind::VideoInit
    } else if tag.is_aac_sequence_header() {
        FrameKind::AudioInit
    } else if tag.is_video() {
        FrameKind::Video
    } else if tag.is_audio() {
        FrameKind::Audio
    } else {
        FrameKind::MetadataInit
    }
}

pub struct PublishSink {
    metadata: MetadataDoc,
    prebuffer: Vec<InternalFrame>,
    flushed: bool,
}

impl PublishSink {
    pub fn new() -> Self {
        Self {
            metadata: MetadataDoc::default(),
            prebuffer: Vec::new(),
            flushed: false,
        }
    }

    /// Feed one publish-direction FLV tag. Returns the bytes that should be
    /// written to the backend right now — empty while still buffering.
    pub fn push(&mut self, tag: FlvTag) -> Bytes {
        self.metadata.observe(&tag);

        let frame = InternalFrame {
            kind: classify(&tag),
            timestamp: tag.timestamp,
            payload: tag.data,
        };

        if self.flushed {
            return encode_frame(&frame);
        }

        self.prebuffer.push(frame);
        if self.prebuffer.len() <= PUBLISH_PREBUFFER_FRAMES {
            return Bytes::new();
        }

        self.flushed = true;
        let meta_frame = InternalFrame {
            kind: FrameKind::MetadataInit,
            timestamp: 0,
            payload: self.metadata.to_bytes(),
        };
        let mut out = BytesMut::new();
        out.extend_from_slice(&encode_frame(&meta_frame));
        for buffered in self.prebuffer.drain(..) {
            out.extend_from_slice(&encode_frame(&buffered));
        }
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes as BytesAlias;

    fn avc_header() -> FlvTag {
        FlvTag::video(0, BytesAlias::from_static(&[0x17, 0x00, 0x00, 0x00, 0x00]))
    }

    fn video_frame(ts: u32) -> FlvTag {
        FlvTag::video(ts, BytesAlias::from_static(&[0x27, 0x01, 0x00, 0x00, 0x00]))
    }

    #[test]
    fn first_eight_frames_are_buffered_then_flushed_with_the_ninth() {
        let mut sink = PublishSink::new();
        let mut out = sink.push(avc_header());
        assert!(out.is_empty());
        for i in 1..7u32 {
            out = sink.push(video_frame(i));
            assert!(out.is_empty());
        }
        // 8th frame (index 8, still buffered)
        out = sink.push(video_frame(8));
        assert!(out.is_empty());

        // 9th frame triggers the flush: metadata frame + 8 buffered + this one.
        let flushed = sink.push(video_frame(9));
        assert!(!flushed.is_empty());

        // Subsequent frames forward immediately and individually.
        let single = sink.push(video_frame(10));
        assert!(!single.is_empty());
        assert!(single.len() < flushed.len());
    }

    #[test]
    fn metadata_records_avc_and_aac_init_flags() {
        let mut sink = PublishSink::new();
        sink.push(avc_header());
        assert!(sink.metadata.fields.contains_key("video"));
        sink.push(FlvTag::audio(0, BytesAlias::from_static(&[0xAF, 0x00, 0x12, 0x10])));
        assert!(sink.metadata.fields.contains_key("audio"));
    }
}
