//! Play-direction pump (spec §4.9): turns internal frames arriving from the
//! backend into RTMP media messages, inserting the deferred `play`/`play2`
//! reply block ahead of the first one.
//!
//! Grounded in the reference connector's main receive loop in
//! `conn_rtmp.cpp`: on the first packet after a pending play, it emits
//! `NetStream.Play.Reset`, an optional `StreamIsRecorded` user control, a
//! `StreamBegin` user control, `NetStream.Play.Start`, a `SetChunkSize`
//! bump to the post-play chunk size, and a `PlayBufferReady` user control —
//! then, while the stream isn't yet initialized, replays the accumulated
//! init frames before forwarding ordinary audio/video.

use bytes::{Bytes, BytesMut};

use crate::protocol::constants::POST_PLAY_CHUNK_SIZE;
use crate::rtmp::frame::{FrameKind, InternalFrame};
use crate::rtmp::state::{PendingPlayReply, SessionState};
use crate::rtmp::writer::{self, msg_type, status_object, user_control_event};

/// Builds the onStatus/user-control reply block owed to a pending `play`,
/// framed against the session's *current* chunk size before it advances to
/// [`POST_PLAY_CHUNK_SIZE`] (spec §4.9: the `SetChunkSize` announcement
/// itself must go out framed at the old size).
fn build_play_reply(state: &mut SessionState, pending: &PendingPlayReply, stream_length: Option<f64>) -> Vec<Bytes> {
    let stream_id = pending.stream_id;
    let mut out = Vec::with_capacity(6);

    out.push(status_reply(state, stream_id, "NetStream.Play.Reset", "Playing and resetting."));

    if stream_length.map(|len| len > 0.0).unwrap_or(false) {
        out.push(writer::user_control(user_control_event::STREAM_IS_RECORDED, stream_id, state.chunk_snd_max));
    }
    out.push(writer::user_control(user_control_event::STREAM_BEGIN, stream_id, state.chunk_snd_max));

    out.push(status_reply(state, stream_id, "NetStream.Play.Start", "Started playing."));

    out.push(writer::set_chunk_size(POST_PLAY_CHUNK_SIZE, state.chunk_snd_max));
    state.chunk_snd_max = POST_PLAY_CHUNK_SIZE;

    out.push(writer::user_control(user_control_event::PLAY_BUFFER_READY, stream_id, state.chunk_snd_max));

    out
}

fn status_reply(state: &SessionState, stream_id: u32, code: &str, description: &str) -> Bytes {
    let values = [
        crate::amf::AmfValue::String("onStatus".to_string()),
        crate::amf::AmfValue::Number(0.0),
        crate::amf::AmfValue::Null,
        status_object("status", code, description),
    ];
    writer::amf_command(&values, stream_id, false, state.chunk_snd_max)
}

fn rtmp_message_type(kind: FrameKind) -> u8 {
    match kind {
        FrameKind::Audio | FrameKind::AudioInit => msg_type::AUDIO,
        FrameKind::Video | FrameKind::VideoInit => msg_type::VIDEO,
        FrameKind::MetadataInit => msg_type::AMF0_DATA,
    }
}

/// Encode one internal frame as the RTMP media (or metadata) message it
/// corresponds to on the wire. The backend's internal frame container
/// format is opaque to this crate (out of scope), so a metadata frame's
/// payload is forwarded as-is as the AMF0 data message body rather than
/// re-derived here.
fn encode_frame(frame: &InternalFrame, stream_id: u32, chunk_size: u32) -> Bytes {
    writer::encode_message(rtmp_message_type(frame.kind), stream_id, frame.timestamp, &frame.payload, chunk_size)
}

/// Turns frames read off the backend bridge into the bytes that go back to
/// the RTMP client, tracking the reply-block-then-init-replay sequencing
/// that spans the first few frames of a playback.
pub struct PlayPump;

impl PlayPump {
    /// Process one frame from the backend. `stream_length` is `Some` only
    /// when a fresh metadata document declaring it accompanies this frame
    /// (spec §4.9: `StreamIsRecorded` is conditional on `metadata.length > 0`).
    pub fn handle_frame(state: &mut SessionState, frame: InternalFrame, stream_length: Option<f64>) -> Bytes {
        let mut out = BytesMut::new();

        if let Some(pending) = state.pending_play_reply.take() {
            for msg in build_play_reply(state, &pending, stream_length) {
                out.extend_from_slice(&msg);
            }
        }

        if !state.stream_inited {
            match frame.kind {
                FrameKind::MetadataInit | FrameKind::AudioInit | FrameKind::VideoInit => {
                    out.extend_from_slice(&encode_frame(&frame, 1, state.chunk_snd_max));
                    return out.freeze();
                }
                FrameKind::Audio | FrameKind::Video => {
                    state.stream_inited = true;
                }
            }
        }

        out.extend_from_slice(&encode_frame(&frame, 1, state.chunk_snd_max));
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{DEFAULT_PEER_BANDWIDTH, DEFAULT_WINDOW_ACK_SIZE};
    use crate::rtmp::state::PendingPlayReply;

    fn pending() -> PendingPlayReply {
        PendingPlayReply {
            transaction_id: 4.0,
            message_type: 20,
            stream_id: 1,
        }
    }

    fn fresh_state() -> SessionState {
        SessionState::new("127.0.0.1".into(), DEFAULT_WINDOW_ACK_SIZE, DEFAULT_PEER_BANDWIDTH)
    }

    #[test]
    fn first_frame_after_play_carries_the_reply_block_and_bumps_chunk_size() {
        let mut state = fresh_state();
        state.pending_play_reply = Some(pending());

        let frame = InternalFrame {
            kind: FrameKind::VideoInit,
            timestamp: 0,
            payload: Bytes::from_static(&[0x17, 0x00]),
        };
        let out = PlayPump::handle_frame(&mut state, frame, Some(0.0));

        assert!(state.pending_play_reply.is_none());
        assert_eq!(state.chunk_snd_max, POST_PLAY_CHUNK_SIZE);
        assert!(!out.is_empty());
        // No StreamIsRecorded since length was 0: Reset + StreamBegin + Start
        // + SetChunkSize + PlayBufferReady + the init frame = 6 messages.
        assert!(!state.stream_inited);
    }

    #[test]
    fn stream_is_recorded_only_sent_when_length_is_positive() {
        let mut state = fresh_state();
        state.pending_play_reply = Some(pending());
        let frame = InternalFrame {
            kind: FrameKind::MetadataInit,
            timestamp: 0,
            payload: Bytes::new(),
        };
        let with_length = PlayPump::handle_frame(&mut state, frame.clone(), Some(42.0));

        let mut state2 = fresh_state();
        state2.pending_play_reply = Some(pending());
        let without_length = PlayPump::handle_frame(&mut state2, frame, Some(0.0));

        assert!(with_length.len() > without_length.len());
    }

    #[test]
    fn init_frames_replay_until_the_first_ordinary_frame_flips_stream_inited() {
        let mut state = fresh_state();
        state.pending_play_reply = Some(pending());

        let meta = InternalFrame { kind: FrameKind::MetadataInit, timestamp: 0, payload: Bytes::new() };
        PlayPump::handle_frame(&mut state, meta, None);
        assert!(!state.stream_inited);

        let video_init = InternalFrame { kind: FrameKind::VideoInit, timestamp: 0, payload: Bytes::from_static(&[0x17]) };
        PlayPump::handle_frame(&mut state, video_init, None);
        assert!(!state.stream_inited);

        let video = InternalFrame { kind: FrameKind::Video, timestamp: 40, payload: Bytes::from_static(&[0x27]) };
        PlayPump::handle_frame(&mut state, video, None);
        assert!(state.stream_inited);
    }
}
