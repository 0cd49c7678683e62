//! Per-connection RTMP session driver (spec §4.5-§4.9).
//!
//! One task per accepted connection, owning both the client socket and
//! (once a stream name is known) a backend bridge socket, cooperatively
//! driven by a single `tokio::select!` loop — the idiomatic translation of
//! the reference connector's single-threaded, non-blocking per-connection
//! loop (`conn_rtmp.cpp`'s `Connector`).

use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::MissedTickBehavior;

use crate::amf::{amf0, Amf3Decoder};
use crate::backend::BackendBridge;
use crate::error::{ChunkError, HandshakeError, SessionError};
use crate::media::{FlvTag, FlvTagType};
use crate::protocol::chunk::RtmpMessage;
use crate::protocol::handshake::{Handshake, HandshakeRole};
use crate::rtmp::config::RtmpConfig;
use crate::rtmp::dispatch::{self, CommandContext};
use crate::rtmp::frame::{FrameDemuxer, FrameKind, InternalFrame};
use crate::rtmp::play::PlayPump;
use crate::rtmp::publish::PublishSink;
use crate::rtmp::state::SessionState;
use crate::rtmp::writer;

const READ_CHUNK: usize = 4096;

/// Drives one accepted connection from handshake to close. Errors returned
/// here terminate only this task (spec §7); the caller just logs them.
pub async fn run_session(
    mut socket: TcpStream,
    remote_addr: SocketAddr,
    config: RtmpConfig,
) -> Result<(), SessionError> {
    perform_handshake(&mut socket).await?;

    let mut state = SessionState::new(remote_addr.ip().to_string(), config.window_ack_size, config.peer_bandwidth);
    state.handshake_done = true;

    let mut backend: Option<BackendBridge> = None;
    let mut in_buf = BytesMut::new();
    let mut publish_sink = PublishSink::new();
    let mut frame_demux = FrameDemuxer::new();
    let mut known_stream_length: Option<f64> = None;
    let mut bytes_in: u64 = 0;
    let mut bytes_out: u64 = 0;

    let mut stats_tick = tokio::time::interval(Duration::from_secs(1));
    stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    stats_tick.tick().await;

    let mut read_buf = [0u8; READ_CHUNK];
    let mut backend_buf = [0u8; READ_CHUNK];

    loop {
        if state.ready_for_data && !state.publishing && backend.is_none() {
            if let Some(stream_name) = state.stream_name.clone() {
                let path = BackendBridge::stream_backend_path(&config.backend_root, &stream_name);
                let mut bridge = BackendBridge::connect(&path).await?;
                bridge.send_command("p\n").await?;
                backend = Some(bridge);
            }
        }

        tokio::select! {
            result = socket.read(&mut read_buf), if !state.stop_parsing => {
                let n = result?;
                if n == 0 {
                    return Ok(());
                }
                bytes_in += n as u64;
                state.rec_cnt += n as u64;
                in_buf.extend_from_slice(&read_buf[..n]);

                let outbound = process_inbound(&mut state, &config, &mut backend, &mut publish_sink, &mut in_buf).await?;
                for msg in &outbound {
                    bytes_out += msg.len() as u64;
                    socket.write_all(msg).await?;
                }
            }

            result = read_backend_frame(&mut backend, &mut backend_buf), if backend.is_some() && state.ready_for_data => {
                let n = result?;
                if n == 0 {
                    backend = None;
                    continue;
                }
                frame_demux.feed(&backend_buf[..n]);
                while let Some(frame) = frame_demux.try_next() {
                    if let Some(len) = extract_stream_length(&frame) {
                        known_stream_length = Some(len);
                    }
                    let out = PlayPump::handle_frame(&mut state, frame, known_stream_length);
                    if !out.is_empty() {
                        bytes_out += out.len() as u64;
                        socket.write_all(&out).await?;
                    }
                }
            }

            _ = stats_tick.tick() => {
                if !state.publishing {
                    if let Some(bridge) = backend.as_mut() {
                        let elapsed = state.connected_at.elapsed().as_secs();
                        let line = format!("RTMP {} {} {} {}\n", state.remote_host, elapsed, bytes_in, bytes_out);
                        bridge.send_command(&line).await?;
                    }
                }
            }
        }
    }
}

async fn read_backend_frame(backend: &mut Option<BackendBridge>, buf: &mut [u8]) -> Result<usize, SessionError> {
    match backend {
        Some(b) => Ok(b.read_some(buf).await?),
        None => std::future::pending().await,
    }
}

fn extract_stream_length(frame: &InternalFrame) -> Option<f64> {
    if frame.kind != FrameKind::MetadataInit {
        return None;
    }
    serde_json::from_slice::<serde_json::Value>(&frame.payload)
        .ok()
        .and_then(|v| v.get("length").and_then(|l| l.as_f64()))
}

/// Server-side RTMP handshake (spec §4.5): read C0+C1, reply with S0+S1+S2,
/// then read and discard C2.
async fn perform_handshake(socket: &mut TcpStream) -> Result<(), SessionError> {
    let mut hs = Handshake::new(HandshakeRole::Server);
    hs.generate_initial();

    let mut buf = BytesMut::new();
    let mut read_buf = [0u8; 4096];

    loop {
        loop {
            let mut cursor = Bytes::copy_from_slice(&buf[..]);
            let before = cursor.len();
            let response = hs.process(&mut cursor)?;
            let consumed = before - cursor.len();
            if consumed == 0 && response.is_none() {
                break;
            }
            buf.advance(consumed);
            if let Some(resp) = response {
                socket.write_all(&resp).await?;
            }
            if hs.is_done() {
                return Ok(());
            }
        }

        let n = socket.read(&mut read_buf).await?;
        if n == 0 {
            return Err(SessionError::Handshake(HandshakeError::Incomplete));
        }
        buf.extend_from_slice(&read_buf[..n]);
    }
}

/// Parse and handle every complete chunk message currently sitting in
/// `in_buf`, returning the bytes owed back to the client.
async fn process_inbound(
    state: &mut SessionState,
    config: &RtmpConfig,
    backend: &mut Option<BackendBridge>,
    publish_sink: &mut PublishSink,
    in_buf: &mut BytesMut,
) -> Result<Vec<Bytes>, SessionError> {
    let mut out = Vec::new();

    while !state.stop_parsing {
        let mut cursor = Bytes::copy_from_slice(&in_buf[..]);
        let before = cursor.len();
        let msg = match state.demux.parse_chunk(&mut cursor) {
            Ok(Some(msg)) => msg,
            Ok(None) => {
                let consumed = before - cursor.len();
                in_buf.advance(consumed);
                break;
            }
            Err(e) => return Err(e.into()),
        };
        let consumed = before - cursor.len();
        in_buf.advance(consumed);

        out.extend(handle_message(state, config, backend, publish_sink, msg).await?);
    }

    if state.ack_due() {
        out.push(writer::ack(state.rec_cnt as u32, state.chunk_snd_max));
        state.mark_acked();
    }

    Ok(out)
}

fn be_u32(payload: &[u8]) -> Result<u32, SessionError> {
    if payload.len() < 4 {
        return Err(ChunkError::UnexpectedEof.into());
    }
    Ok(u32::from_be_bytes(payload[0..4].try_into().unwrap()))
}

fn flv_tag_from_message(msg: &RtmpMessage) -> FlvTag {
    match msg.msg_type_id {
        8 => FlvTag::audio(msg.timestamp, msg.payload.clone()),
        9 => FlvTag::video(msg.timestamp, msg.payload.clone()),
        _ => FlvTag {
            tag_type: FlvTagType::Script,
            timestamp: msg.timestamp,
            data: msg.payload.clone(),
        },
    }
}

/// Dispatch one reassembled RTMP message (spec §4.7/§4.8/§4.9).
async fn handle_message(
    state: &mut SessionState,
    config: &RtmpConfig,
    backend: &mut Option<BackendBridge>,
    publish_sink: &mut PublishSink,
    msg: RtmpMessage,
) -> Result<Vec<Bytes>, SessionError> {
    match msg.msg_type_id {
        1 => {
            let size = be_u32(&msg.payload)?;
            state.chunk_rec_max = size;
            state.demux.set_chunk_size(size);
            Ok(Vec::new())
        }
        2 => Ok(Vec::new()), // Abort: ignored.
        3 => {
            // Ack: the reference implementation double-assigns this field
            // to the already-current send counter, a no-op in effect.
            state.snd_window_at = state.snd_cnt;
            Ok(Vec::new())
        }
        4 => {
            if msg.payload.len() >= 2 {
                let event = u16::from_be_bytes([msg.payload[0], msg.payload[1]]);
                tracing::debug!(event, "inbound user control message");
            }
            Ok(Vec::new())
        }
        5 => {
            let size = be_u32(&msg.payload)?;
            state.rec_window_size = size;
            state.rec_window_at = state.rec_cnt;
            Ok(vec![writer::ack(state.rec_cnt as u32, state.chunk_snd_max)])
        }
        6 => {
            let size = be_u32(&msg.payload)?;
            state.snd_window_size = size;
            Ok(vec![writer::window_ack_size(size, state.chunk_snd_max)])
        }
        8 | 9 | 18 => {
            if state.publishing {
                let tag = flv_tag_from_message(&msg);
                let frame_bytes = publish_sink.push(tag);
                if !frame_bytes.is_empty() {
                    if let Some(bridge) = backend.as_mut() {
                        bridge.write_all(&frame_bytes).await?;
                    }
                }
            }
            Ok(Vec::new())
        }
        15 | 16 | 17 => {
            let mut body = msg.payload.clone();
            if !body.is_empty() && body[0] == 0 {
                body.advance(1);
                let values = amf0::decode_all(&body)?;
                let mut ctx = CommandContext {
                    state,
                    backend_root: &config.backend_root,
                    backend,
                    msg_type_id: msg.msg_type_id,
                    msg_stream_id: msg.msg_stream_id,
                };
                dispatch::dispatch(&mut ctx, values, true).await
            } else {
                let mut decoder = Amf3Decoder::new();
                while !body.is_empty() {
                    match decoder.decode(&mut body) {
                        Ok(value) => tracing::debug!(?value, "unhandled AMF3 message"),
                        Err(e) => {
                            tracing::debug!(error = %e, "malformed AMF3 message");
                            break;
                        }
                    }
                }
                Ok(Vec::new())
            }
        }
        19 => Ok(Vec::new()), // AMF0 shared object: ignored.
        20 => {
            let values = amf0::decode_all(&msg.payload)?;
            let mut ctx = CommandContext {
                state,
                backend_root: &config.backend_root,
                backend,
                msg_type_id: msg.msg_type_id,
                msg_stream_id: msg.msg_stream_id,
            };
            dispatch::dispatch(&mut ctx, values, false).await
        }
        22 => Ok(Vec::new()), // Aggregate: ignored.
        other => {
            tracing::warn!(msg_type = other, "unknown RTMP message type, ceasing further parsing");
            state.stop_parsing = true;
            Ok(Vec::new())
        }
    }
}
