//! Per-session RTMP state (spec §3): window/chunk-size bookkeeping, the
//! handful of session flags, and the deferred `play` reply. One instance
//! lives for the lifetime of a single connection's task — nothing here is
//! shared across sessions.

use std::time::Instant;

use crate::protocol::chunk::ChunkDemuxer;
use crate::protocol::constants::DEFAULT_CHUNK_SIZE;

/// The `play`/`play2` reply the dispatcher defers until the play pump sees
/// the first frame from the backend (spec §4.8, §4.9).
#[derive(Debug, Clone)]
pub struct PendingPlayReply {
    pub transaction_id: f64,
    pub message_type: u8,
    pub stream_id: u32,
}

pub struct SessionState {
    /// Chunk size the *peer* uses when sending to us.
    pub chunk_rec_max: u32,
    /// Chunk size we use when sending to the peer.
    pub chunk_snd_max: u32,

    pub rec_cnt: u64,
    pub rec_window_at: u64,
    pub rec_window_size: u32,

    pub snd_cnt: u64,
    pub snd_window_at: u64,
    pub snd_window_size: u32,

    pub demux: ChunkDemuxer,

    pub handshake_done: bool,
    pub ready_for_data: bool,
    pub stream_opened: bool,
    pub stream_inited: bool,
    pub publishing: bool,
    pub stop_parsing: bool,

    pub pending_play_reply: Option<PendingPlayReply>,
    pub stream_name: Option<String>,
    pub remote_host: String,
    pub object_encoding: f64,
    pub connected_at: Instant,
}

impl SessionState {
    /// `rec_window_size`/`snd_window_size` seed from the endpoint's
    /// configured window-ack size and peer bandwidth ([`RtmpConfig`](crate::rtmp::RtmpConfig))
    /// rather than a fixed constant, so operators overriding those values
    /// actually change what `connect` negotiates (spec §3, §6).
    pub fn new(remote_host: String, window_ack_size: u32, peer_bandwidth: u32) -> Self {
        Self {
            chunk_rec_max: DEFAULT_CHUNK_SIZE,
            chunk_snd_max: DEFAULT_CHUNK_SIZE,
            rec_cnt: 0,
            rec_window_at: 0,
            rec_window_size: window_ack_size,
            snd_cnt: 0,
            snd_window_at: 0,
            snd_window_size: peer_bandwidth,
            demux: ChunkDemuxer::new(DEFAULT_CHUNK_SIZE),
            handshake_done: false,
            ready_for_data: false,
            stream_opened: false,
            stream_inited: false,
            publishing: false,
            stop_parsing: false,
            pending_play_reply: None,
            stream_name: None,
            remote_host,
            object_encoding: 0.0,
            connected_at: Instant::now(),
        }
    }

    /// Bytes received since the last window-ack boundary have crossed
    /// `rec_window_size` (spec §4.6): emit an Ack and advance the boundary.
    pub fn ack_due(&self) -> bool {
        self.rec_cnt - self.rec_window_at >= self.rec_window_size as u64
    }

    pub fn mark_acked(&mut self) {
        self.rec_window_at = self.rec_cnt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{DEFAULT_PEER_BANDWIDTH, DEFAULT_WINDOW_ACK_SIZE};

    fn fresh() -> SessionState {
        SessionState::new("127.0.0.1".into(), DEFAULT_WINDOW_ACK_SIZE, DEFAULT_PEER_BANDWIDTH)
    }

    #[test]
    fn fresh_state_uses_default_chunk_and_window_sizes() {
        let state = fresh();
        assert_eq!(state.chunk_rec_max, DEFAULT_CHUNK_SIZE);
        assert_eq!(state.chunk_snd_max, DEFAULT_CHUNK_SIZE);
        assert_eq!(state.rec_window_size, DEFAULT_WINDOW_ACK_SIZE);
        assert_eq!(state.snd_window_size, DEFAULT_PEER_BANDWIDTH);
        assert!(!state.handshake_done);
        assert!(!state.publishing);
    }

    #[test]
    fn configured_window_sizes_override_the_defaults() {
        let state = SessionState::new("127.0.0.1".into(), 5_000_000, 6_000_000);
        assert_eq!(state.rec_window_size, 5_000_000);
        assert_eq!(state.snd_window_size, 6_000_000);
    }

    #[test]
    fn ack_due_tracks_cumulative_received_bytes() {
        let mut state = fresh();
        state.rec_window_size = 100;
        state.rec_cnt = 99;
        assert!(!state.ack_due());
        state.rec_cnt = 100;
        assert!(state.ack_due());
        state.mark_acked();
        assert!(!state.ack_due());
    }
}
