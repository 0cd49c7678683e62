//! RTMP chunk demultiplexer (spec §4.6)
//!
//! Reassembles the chunked message format — basic header (format + chunk
//! stream id) followed by a message header (timestamp, length, type,
//! stream id) followed by a payload fragment of at most the negotiated
//! chunk size — into complete `(msg_type_id, msg_stream_id, timestamp,
//! payload)` messages.
//!
//! Partial-message state is keyed by chunk-stream id, matching the wire
//! format's multiplexing model: several independent message streams
//! interleave their chunks over the same TCP connection.

use std::collections::HashMap;

use bytes::{Buf, Bytes, BytesMut};

use crate::error::ChunkError;
use crate::protocol::constants::MAX_MESSAGE_SIZE;

/// A fully reassembled RTMP message.
#[derive(Debug, Clone)]
pub struct RtmpMessage {
    pub msg_type_id: u8,
    pub msg_stream_id: u32,
    pub timestamp: u32,
    pub payload: Bytes,
}

/// Per-chunk-stream reassembly state.
#[derive(Debug, Clone)]
struct ChunkStreamState {
    timestamp: u32,
    length: u32,
    type_id: u8,
    stream_id: u32,
    extended_timestamp: bool,
    /// Accumulated payload for the message currently being reassembled.
    partial: BytesMut,
}

impl ChunkStreamState {
    fn fresh() -> Self {
        Self {
            timestamp: 0,
            length: 0,
            type_id: 0,
            stream_id: 0,
            extended_timestamp: false,
            partial: BytesMut::new(),
        }
    }

    fn remaining(&self) -> u32 {
        self.length - self.partial.len() as u32
    }
}

/// Reassembles incoming chunks into complete RTMP messages.
pub struct ChunkDemuxer {
    streams: HashMap<u32, ChunkStreamState>,
    max_chunk_size: u32,
}

impl ChunkDemuxer {
    pub fn new(initial_chunk_size: u32) -> Self {
        Self {
            streams: HashMap::new(),
            max_chunk_size: initial_chunk_size,
        }
    }

    /// Update the negotiated chunk size (in effect for subsequently parsed
    /// chunks), driven by an incoming `Set Chunk Size` control message.
    pub fn set_chunk_size(&mut self, size: u32) {
        self.max_chunk_size = size.max(1);
    }

    /// Attempt to parse one basic-header + message-header + payload-fragment
    /// unit from the front of `buf`.
    ///
    /// On success, `buf` is advanced past the consumed bytes and `Ok(Some(_))`
    /// is returned once a message is fully reassembled (`Ok(None)` if the
    /// fragment only partially fills the message). If `buf` does not yet
    /// contain a complete unit, `buf` is left untouched and `Ok(None)` is
    /// returned so the caller can read more bytes and retry.
    pub fn parse_chunk(&mut self, buf: &mut Bytes) -> Result<Option<RtmpMessage>, ChunkError> {
        let mut cursor = buf.clone();

        let Some((fmt, csid)) = read_basic_header(&mut cursor) else {
            return Ok(None);
        };

        let entry = self
            .streams
            .entry(csid)
            .or_insert_with(ChunkStreamState::fresh);

        // fmt 3 continues whatever message is in flight for this chunk
        // stream; everything else starts/refreshes a header.
        if fmt != 3 {
            let header_len = match fmt {
                0 => 11,
                1 => 7,
                2 => 3,
                _ => return Err(ChunkError::InvalidFormat(fmt)),
            };
            if cursor.remaining() < header_len {
                return Ok(None);
            }

            if fmt == 0 {
                let ts = read_u24(&mut cursor);
                let length = read_u24(&mut cursor);
                let type_id = cursor.get_u8();
                let stream_id = cursor.get_u32_le();
                let (ts, extended) = read_possible_extended_timestamp(&mut cursor, ts)?;
                entry.timestamp = ts;
                entry.length = length;
                entry.type_id = type_id;
                entry.stream_id = stream_id;
                entry.extended_timestamp = extended;
            } else if fmt == 1 {
                let delta = read_u24(&mut cursor);
                let length = read_u24(&mut cursor);
                let type_id = cursor.get_u8();
                let (delta, extended) = read_possible_extended_timestamp(&mut cursor, delta)?;
                entry.timestamp = entry.timestamp.wrapping_add(delta);
                entry.length = length;
                entry.type_id = type_id;
                entry.extended_timestamp = extended;
            } else {
                // fmt == 2
                let delta = read_u24(&mut cursor);
                let (delta, extended) = read_possible_extended_timestamp(&mut cursor, delta)?;
                entry.timestamp = entry.timestamp.wrapping_add(delta);
                entry.extended_timestamp = extended;
            }

            if entry.length > MAX_MESSAGE_SIZE {
                return Err(ChunkError::MessageTooLarge(entry.length));
            }
            // A new header implies a new message: reset any stale partial
            // payload left over from an aborted previous message on this csid.
            if entry.partial.is_empty() == false && entry.remaining() == entry.length {
                entry.partial.clear();
            }
        } else if entry.length == 0 && entry.partial.is_empty() {
            // fmt 3 with no prior header on this chunk stream at all.
            return Err(ChunkError::NoPriorHeader(csid));
        } else if entry.extended_timestamp && entry.partial.is_empty() {
            // A fresh message continuing an extended-timestamp header train
            // still carries the 4-byte extended timestamp on fmt 3.
            if cursor.remaining() < 4 {
                return Ok(None);
            }
            let delta = cursor.get_u32();
            entry.timestamp = entry.timestamp.wrapping_add(delta);
        }

        let want = entry.remaining().min(self.max_chunk_size);
        if cursor.remaining() < want as usize {
            return Ok(None);
        }

        let fragment = cursor.copy_to_bytes(want as usize);
        entry.partial.extend_from_slice(&fragment);

        // Commit: the header + fragment we just read are consumed for real.
        *buf = cursor;

        if entry.remaining() == 0 {
            let msg = RtmpMessage {
                msg_type_id: entry.type_id,
                msg_stream_id: entry.stream_id,
                timestamp: entry.timestamp,
                payload: entry.partial.split().freeze(),
            };
            Ok(Some(msg))
        } else {
            Ok(None)
        }
    }
}

fn read_basic_header(cursor: &mut Bytes) -> Option<(u8, u32)> {
    if cursor.is_empty() {
        return None;
    }
    let first = cursor[0];
    let fmt = (first >> 6) & 0x3;
    match first & 0x3F {
        0 => {
            if cursor.remaining() < 2 {
                return None;
            }
            cursor.advance(1);
            let b1 = cursor.get_u8();
            Some((fmt, 64 + b1 as u32))
        }
        1 => {
            if cursor.remaining() < 3 {
                return None;
            }
            cursor.advance(1);
            let b1 = cursor.get_u8();
            let b2 = cursor.get_u8();
            Some((fmt, 64 + b1 as u32 + (b2 as u32) * 256))
        }
        csid => {
            cursor.advance(1);
            Some((fmt, csid as u32))
        }
    }
}

fn read_u24(cursor: &mut Bytes) -> u32 {
    let b0 = cursor.get_u8() as u32;
    let b1 = cursor.get_u8() as u32;
    let b2 = cursor.get_u8() as u32;
    (b0 << 16) | (b1 << 8) | b2
}

/// If the 24-bit timestamp/delta field is the escape value `0xFFFFFF`, the
/// real value follows as a 4-byte big-endian extended timestamp.
fn read_possible_extended_timestamp(
    cursor: &mut Bytes,
    ts24: u32,
) -> Result<(u32, bool), ChunkError> {
    if ts24 == 0x00FF_FFFF {
        if cursor.remaining() < 4 {
            return Err(ChunkError::UnexpectedEof);
        }
        Ok((cursor.get_u32(), true))
    } else {
        Ok((ts24, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    fn fmt0_chunk(csid: u8, type_id: u8, stream_id: u32, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u8(csid); // fmt 0, csid < 64
        buf.put_uint(0, 3); // timestamp
        buf.put_uint(payload.len() as u64, 3); // length
        buf.put_u8(type_id);
        buf.put_u32_le(stream_id);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn single_chunk_message_completes_immediately() {
        let mut demux = ChunkDemuxer::new(128);
        let raw = fmt0_chunk(3, 20, 0, b"hello world");
        let mut bytes = raw.freeze();

        let msg = demux.parse_chunk(&mut bytes).unwrap().unwrap();
        assert_eq!(msg.msg_type_id, 20);
        assert_eq!(msg.msg_stream_id, 0);
        assert_eq!(&msg.payload[..], b"hello world");
        assert!(bytes.is_empty());
    }

    #[test]
    fn incomplete_chunk_returns_none_without_consuming() {
        let mut demux = ChunkDemuxer::new(128);
        let raw = fmt0_chunk(3, 20, 0, b"hello");
        let mut bytes = raw.freeze();
        bytes.truncate(bytes.len() - 1); // drop the last payload byte

        let before = bytes.clone();
        let result = demux.parse_chunk(&mut bytes).unwrap();
        assert!(result.is_none());
        assert_eq!(bytes, before);
    }

    #[test]
    fn message_larger_than_chunk_size_spans_multiple_fragments() {
        let mut demux = ChunkDemuxer::new(4);
        let payload = b"0123456789";
        let mut buf = BytesMut::new();
        buf.put_u8(3);
        buf.put_uint(0, 3);
        buf.put_uint(payload.len() as u64, 3);
        buf.put_u8(9); // video
        buf.put_u32_le(1);
        buf.extend_from_slice(&payload[0..4]);
        // fmt 3 continuation, same csid
        buf.put_u8(0xC0 | 3);
        buf.extend_from_slice(&payload[4..8]);
        buf.put_u8(0xC0 | 3);
        buf.extend_from_slice(&payload[8..10]);

        let mut bytes = buf.freeze();
        assert!(demux.parse_chunk(&mut bytes).unwrap().is_none());
        assert!(demux.parse_chunk(&mut bytes).unwrap().is_none());
        let msg = demux.parse_chunk(&mut bytes).unwrap().unwrap();
        assert_eq!(&msg.payload[..], &payload[..]);
    }

    #[test]
    fn set_chunk_size_affects_subsequent_fragments() {
        let mut demux = ChunkDemuxer::new(2);
        demux.set_chunk_size(128);
        let raw = fmt0_chunk(3, 20, 0, b"twelve bytes");
        let mut bytes = raw.freeze();
        let msg = demux.parse_chunk(&mut bytes).unwrap().unwrap();
        assert_eq!(msg.payload.len(), 12);
    }
}
