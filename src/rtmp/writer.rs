//! Outgoing RTMP encoding: chunk fragmentation, control/user-control
//! messages, and AMF command replies (spec §4.7, §4.8, §9 Open Questions).
//!
//! Every server-originated message goes out on a single chunk stream
//! (`SERVER_CHUNK_STREAM_ID`), so ordering between replies and media is
//! simply emission order — no per-category chunk-stream bookkeeping is
//! needed (spec §9, resolved).

use bytes::{BufMut, Bytes, BytesMut};

use crate::amf::{amf0, AmfValue};
use crate::protocol::constants::SERVER_CHUNK_STREAM_ID;

/// RTMP message type ids used by the server side.
pub mod msg_type {
    pub const SET_CHUNK_SIZE: u8 = 1;
    pub const ACK: u8 = 3;
    pub const USER_CONTROL: u8 = 4;
    pub const WINDOW_ACK_SIZE: u8 = 5;
    pub const PEER_BANDWIDTH: u8 = 6;
    pub const AUDIO: u8 = 8;
    pub const VIDEO: u8 = 9;
    pub const AMF0_COMMAND: u8 = 20;
    pub const AMF0_DATA: u8 = 18;
}

/// User Control event types (message type 4's first 2 bytes).
pub mod user_control_event {
    pub const STREAM_BEGIN: u16 = 0;
    pub const STREAM_IS_RECORDED: u16 = 4;
    pub const PLAY_BUFFER_READY: u16 = 32;
}

/// Fragment `payload` into fmt-0-then-fmt-3 chunks on `SERVER_CHUNK_STREAM_ID`
/// and serialize the result, respecting `chunk_size` for every fragment
/// after the first header.
pub fn encode_message(msg_type_id: u8, stream_id: u32, timestamp: u32, payload: &[u8], chunk_size: u32) -> Bytes {
    let chunk_size = chunk_size.max(1) as usize;
    let mut out = BytesMut::with_capacity(payload.len() + payload.len() / chunk_size.max(1) + 16);

    // Basic header, fmt 0, csid = SERVER_CHUNK_STREAM_ID (fits in the 1-byte form).
    out.put_u8(SERVER_CHUNK_STREAM_ID as u8);
    put_u24(&mut out, timestamp.min(0x00FF_FFFE));
    put_u24(&mut out, payload.len() as u32);
    out.put_u8(msg_type_id);
    out.put_u32_le(stream_id);
    if timestamp >= 0x00FF_FFFF {
        out.put_u32(timestamp);
    }

    for (i, fragment) in payload.chunks(chunk_size).enumerate() {
        if i > 0 {
            out.put_u8(0xC0 | (SERVER_CHUNK_STREAM_ID as u8)); // fmt 3
            if timestamp >= 0x00FF_FFFF {
                out.put_u32(timestamp);
            }
        }
        out.extend_from_slice(fragment);
    }

    out.freeze()
}

fn put_u24(buf: &mut BytesMut, v: u32) {
    buf.put_u8((v >> 16) as u8);
    buf.put_u8((v >> 8) as u8);
    buf.put_u8(v as u8);
}

pub fn set_chunk_size(size: u32, chunk_size: u32) -> Bytes {
    let mut payload = BytesMut::with_capacity(4);
    payload.put_u32(size);
    encode_message(msg_type::SET_CHUNK_SIZE, 0, 0, &payload, chunk_size)
}

pub fn ack(sequence_number: u32, chunk_size: u32) -> Bytes {
    let mut payload = BytesMut::with_capacity(4);
    payload.put_u32(sequence_number);
    encode_message(msg_type::ACK, 0, 0, &payload, chunk_size)
}

pub fn window_ack_size(size: u32, chunk_size: u32) -> Bytes {
    let mut payload = BytesMut::with_capacity(4);
    payload.put_u32(size);
    encode_message(msg_type::WINDOW_ACK_SIZE, 0, 0, &payload, chunk_size)
}

pub fn peer_bandwidth(size: u32, chunk_size: u32) -> Bytes {
    let mut payload = BytesMut::with_capacity(5);
    payload.put_u32(size);
    payload.put_u8(2); // limit type "dynamic", matching the reference implementation
    encode_message(msg_type::PEER_BANDWIDTH, 0, 0, &payload, chunk_size)
}

pub fn user_control(event: u16, stream_id: u32, chunk_size: u32) -> Bytes {
    let mut payload = BytesMut::with_capacity(6);
    payload.put_u16(event);
    payload.put_u32(stream_id);
    encode_message(msg_type::USER_CONTROL, 0, 0, &payload, chunk_size)
}

/// Encode an AMF0 command (`[name, transaction_id, ...args]`) as an
/// RTMP message on `stream_id`, zero-byte-prefixed if `amf3` (the
/// originating command arrived as message type 17, spec §4.7/§4.8).
pub fn amf_command(values: &[AmfValue], stream_id: u32, amf3: bool, chunk_size: u32) -> Bytes {
    let encoded = amf0::encode_all(values);
    let msg_type_id = if amf3 { 17 } else { msg_type::AMF0_COMMAND };
    if amf3 {
        let mut payload = BytesMut::with_capacity(encoded.len() + 1);
        payload.put_u8(0);
        payload.extend_from_slice(&encoded);
        encode_message(msg_type_id, stream_id, 0, &payload, chunk_size)
    } else {
        encode_message(msg_type_id, stream_id, 0, &encoded, chunk_size)
    }
}

/// Build a `level`/`code`/`description` `onStatus`-style info object used
/// throughout the command replies (spec §4.8).
pub fn status_object(level: &str, code: &str, description: &str) -> AmfValue {
    let mut props = std::collections::HashMap::new();
    props.insert("level".to_string(), AmfValue::String(level.to_string()));
    props.insert("code".to_string(), AmfValue::String(code.to_string()));
    props.insert(
        "description".to_string(),
        AmfValue::String(description.to_string()),
    );
    AmfValue::Object(props)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_chunk_size_encodes_a_single_fmt0_chunk_carrying_the_value() {
        let bytes = set_chunk_size(4096, 128);
        // basic header (1) + timestamp(3) + length(3) + type(1) + stream id(4) + payload(4)
        assert_eq!(bytes.len(), 1 + 3 + 3 + 1 + 4 + 4);
        assert_eq!(bytes[7], msg_type::SET_CHUNK_SIZE);
        let value = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
        assert_eq!(value, 4096);
    }

    #[test]
    fn encode_message_fragments_long_payloads_with_fmt3_continuations() {
        let payload = [0u8; 10];
        let bytes = encode_message(9, 1, 0, &payload, 4);
        // header (11) + 4-byte fragment, then two fmt3 (1-byte basic header each) + fragments
        let expected_len = 11 + 4 + (1 + 4) + (1 + 2);
        assert_eq!(bytes.len(), expected_len);
    }

    #[test]
    fn amf_command_prefixes_zero_byte_only_for_amf3_origin() {
        let values = vec![AmfValue::String("_result".into()), AmfValue::Number(1.0)];
        let amf0_bytes = amf_command(&values, 0, false, 128);
        let amf3_bytes = amf_command(&values, 0, true, 128);
        assert!(amf3_bytes.len() > amf0_bytes.len());
        assert_eq!(amf3_bytes[7], 17);
        assert_eq!(amf0_bytes[7], msg_type::AMF0_COMMAND);
    }
}
