//! AMF command dispatcher (spec §4.8)
//!
//! Decodes an AMF0/AMF3 command sequence `[name, transaction_id, command_object, ...args]`
//! and drives the session state machine. Every reply this module builds goes
//! out through [`writer::amf_command`], which takes care of the zero-byte
//! AMF3 prefix and chunk-stream-3 framing (§9 Open Questions, resolved).

use std::collections::HashMap;
use std::path::Path;

use bytes::Bytes;

use crate::amf::AmfValue;
use crate::backend::BackendBridge;
use crate::error::SessionError;
use crate::protocol::constants::*;
use crate::rtmp::state::{PendingPlayReply, SessionState};
use crate::rtmp::writer::{self, status_object, user_control_event};

/// Borrowed state a command handler needs: the session, where to find the
/// per-stream backend socket, and the framing of the command that arrived.
pub struct CommandContext<'a> {
    pub state: &'a mut SessionState,
    pub backend_root: &'a Path,
    pub backend: &'a mut Option<BackendBridge>,
    pub msg_type_id: u8,
    pub msg_stream_id: u32,
}

/// RTMP's conventional NetStream id. `createStream` always hands back `1`;
/// nothing in this server multiplexes more than one stream per connection.
const STREAM_ID: u32 = 1;

fn arg(values: &[AmfValue], command_index: usize) -> Option<&AmfValue> {
    // `command_index` counts from the command name itself (index 0).
    // `values` here is the post-name-and-transaction-id remainder, so
    // it's offset by 2.
    values.get(command_index.checked_sub(2)?)
}

/// Decode and dispatch one command message. Returns the bytes to write
/// back to the client now; a command may legitimately produce nothing
/// (its reply is deferred, e.g. `play`, or it simply has none, e.g.
/// `closeStream`).
pub async fn dispatch(
    ctx: &mut CommandContext<'_>,
    values: Vec<AmfValue>,
    amf3: bool,
) -> Result<Vec<Bytes>, SessionError> {
    let mut iter = values.into_iter();
    let Some(name) = iter.next().and_then(|v| v.as_str().map(str::to_string)) else {
        return Ok(Vec::new());
    };
    let transaction_id = iter.next().and_then(|v| v.as_number()).unwrap_or(0.0);
    let rest: Vec<AmfValue> = iter.collect();

    match name.as_str() {
        "connect" => Ok(handle_connect(ctx, transaction_id, &rest, amf3)),
        "createStream" => Ok(handle_create_stream(ctx, transaction_id, amf3)),
        "closeStream" | "deleteStream" => {
            handle_close_stream(ctx).await;
            Ok(Vec::new())
        }
        "getStreamLength" | "getMovLen" => Ok(vec![reply_result(ctx, transaction_id, AmfValue::Number(0.0), amf3)]),
        "publish" => handle_publish(ctx, transaction_id, &rest, amf3).await,
        "checkBandwidth" => Ok(vec![reply_result(ctx, transaction_id, AmfValue::Null, amf3)]),
        "play" | "play2" => Ok(handle_play(ctx, transaction_id, &rest)),
        "seek" => handle_seek(ctx, transaction_id, &rest, amf3).await,
        "pause" | "pauseRaw" => handle_pause(ctx, &rest, amf3).await,
        other => {
            tracing::debug!(command = other, "unhandled AMF command, connection stays open");
            Ok(Vec::new())
        }
    }
}

fn reply_result(ctx: &CommandContext<'_>, transaction_id: f64, payload: AmfValue, amf3: bool) -> Bytes {
    command(ctx, "_result", transaction_id, AmfValue::Null, payload, amf3)
}

fn command(
    ctx: &CommandContext<'_>,
    name: &str,
    transaction_id: f64,
    command_object: AmfValue,
    payload: AmfValue,
    amf3: bool,
) -> Bytes {
    let values = [
        AmfValue::String(name.to_string()),
        AmfValue::Number(transaction_id),
        command_object,
        payload,
    ];
    writer::amf_command(&values, ctx.msg_stream_id, amf3, ctx.state.chunk_snd_max)
}

fn on_status(ctx: &CommandContext<'_>, level: &str, code: &str, description: &str, amf3: bool) -> Bytes {
    command(
        ctx,
        "onStatus",
        0.0,
        AmfValue::Null,
        status_object(level, code, description),
        amf3,
    )
}

fn handle_connect(ctx: &mut CommandContext<'_>, transaction_id: f64, rest: &[AmfValue], amf3: bool) -> Vec<Bytes> {
    let command_object = rest.first();
    let object_encoding = command_object
        .and_then(|v| v.get_number("objectEncoding"))
        .unwrap_or(0.0);
    ctx.state.object_encoding = object_encoding;

    let mut out = Vec::with_capacity(5);
    out.push(writer::set_chunk_size(POST_CONNECT_CHUNK_SIZE, ctx.state.chunk_snd_max));
    ctx.state.chunk_snd_max = POST_CONNECT_CHUNK_SIZE;
    out.push(writer::window_ack_size(ctx.state.rec_window_size, ctx.state.chunk_snd_max));
    out.push(writer::peer_bandwidth(ctx.state.snd_window_size, ctx.state.chunk_snd_max));
    out.push(writer::user_control(
        user_control_event::STREAM_BEGIN,
        STREAM_ID,
        ctx.state.chunk_snd_max,
    ));

    let mut server_properties = HashMap::new();
    server_properties.insert("fmsVer".to_string(), AmfValue::String(FMS_VERSION.to_string()));
    server_properties.insert("capabilities".to_string(), AmfValue::Number(CAPABILITIES));
    server_properties.insert("mode".to_string(), AmfValue::Number(MODE));

    let mut info = HashMap::new();
    info.insert("level".to_string(), AmfValue::String("status".to_string()));
    info.insert(
        "code".to_string(),
        AmfValue::String("NetConnection.Connect.Success".to_string()),
    );
    info.insert("clientid".to_string(), AmfValue::Number(CLIENT_ID));
    info.insert("objectEncoding".to_string(), AmfValue::Number(object_encoding));

    out.push(command(
        ctx,
        "_result",
        transaction_id,
        AmfValue::Object(server_properties),
        AmfValue::Object(info),
        amf3,
    ));
    out
}

fn handle_create_stream(ctx: &mut CommandContext<'_>, transaction_id: f64, amf3: bool) -> Vec<Bytes> {
    vec![
        reply_result(ctx, transaction_id, AmfValue::Number(STREAM_ID as f64), amf3),
        writer::user_control(user_control_event::STREAM_BEGIN, STREAM_ID, ctx.state.chunk_snd_max),
    ]
}

async fn handle_close_stream(ctx: &mut CommandContext<'_>) {
    *ctx.backend = None;
    ctx.state.stream_opened = false;
    ctx.state.ready_for_data = false;
    ctx.state.publishing = false;
}

async fn handle_publish(
    ctx: &mut CommandContext<'_>,
    transaction_id: f64,
    rest: &[AmfValue],
    amf3: bool,
) -> Result<Vec<Bytes>, SessionError> {
    let Some(stream_name) = arg(rest, 3).and_then(|v| v.as_str()).map(str::to_string) else {
        return Ok(Vec::new());
    };

    let path = BackendBridge::stream_backend_path(ctx.backend_root, &stream_name);
    let mut bridge = BackendBridge::connect(&path).await?;
    bridge.send_command(&format!("P {}\n", ctx.state.remote_host)).await?;
    *ctx.backend = Some(bridge);

    ctx.state.stream_name = Some(stream_name);
    ctx.state.stream_opened = true;
    ctx.state.publishing = true;

    Ok(vec![
        reply_result(ctx, transaction_id, AmfValue::Boolean(true), amf3),
        writer::user_control(user_control_event::STREAM_BEGIN, STREAM_ID, ctx.state.chunk_snd_max),
        on_status(ctx, "status", "NetStream.Publish.Start", "Publish started.", amf3),
    ])
}

fn handle_play(ctx: &mut CommandContext<'_>, transaction_id: f64, rest: &[AmfValue]) -> Vec<Bytes> {
    if let Some(stream_name) = arg(rest, 3).and_then(|v| v.as_str()).map(str::to_string) {
        ctx.state.stream_name = Some(stream_name);
    }
    ctx.state.ready_for_data = true;
    ctx.state.pending_play_reply = Some(PendingPlayReply {
        transaction_id,
        message_type: ctx.msg_type_id,
        stream_id: ctx.msg_stream_id,
    });
    // No reply here — the play pump (§4.9) replies once the first backend
    // frame arrives.
    Vec::new()
}

async fn handle_seek(
    ctx: &mut CommandContext<'_>,
    transaction_id: f64,
    rest: &[AmfValue],
    amf3: bool,
) -> Result<Vec<Bytes>, SessionError> {
    ctx.state.pending_play_reply = Some(PendingPlayReply {
        transaction_id,
        message_type: ctx.msg_type_id,
        stream_id: ctx.msg_stream_id,
    });
    ctx.state.stream_inited = false;

    let reply = on_status(ctx, "status", "NetStream.Seek.Notify", "Seeking to requested position.", amf3);

    if let Some(ms) = arg(rest, 3).and_then(|v| v.as_number()) {
        if let Some(bridge) = ctx.backend.as_mut() {
            bridge.send_command(&format!("s {}\n", ms as i64)).await?;
        }
    }

    Ok(vec![reply])
}

async fn handle_pause(
    ctx: &mut CommandContext<'_>,
    rest: &[AmfValue],
    amf3: bool,
) -> Result<Vec<Bytes>, SessionError> {
    let pausing = arg(rest, 3).and_then(|v| v.as_bool()).unwrap_or(false);

    let reply = if pausing {
        if let Some(bridge) = ctx.backend.as_mut() {
            bridge.send_command("q\n").await?;
        }
        on_status(ctx, "status", "NetStream.Pause.Notify", "Pausing.", amf3)
    } else {
        if let Some(bridge) = ctx.backend.as_mut() {
            bridge.send_command("p\n").await?;
        }
        on_status(ctx, "status", "NetStream.Unpause.Notify", "Unpausing.", amf3)
    };

    Ok(vec![reply])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::amf0;

    fn fresh_state() -> SessionState {
        SessionState::new("127.0.0.1".into(), DEFAULT_WINDOW_ACK_SIZE, DEFAULT_PEER_BANDWIDTH)
    }

    fn fresh_ctx<'a>(
        state: &'a mut SessionState,
        backend: &'a mut Option<BackendBridge>,
        backend_root: &'a Path,
    ) -> CommandContext<'a> {
        CommandContext {
            state,
            backend_root,
            backend,
            msg_type_id: 20,
            msg_stream_id: 0,
        }
    }

    #[tokio::test]
    async fn connect_emits_five_messages_ending_in_a_result() {
        let mut state = fresh_state();
        let mut backend = None;
        let root = Path::new("/tmp/mist");
        let mut ctx = fresh_ctx(&mut state, &mut backend, root);

        let mut object = HashMap::new();
        object.insert("app".to_string(), AmfValue::String("live".to_string()));
        let values = vec![
            AmfValue::String("connect".to_string()),
            AmfValue::Number(1.0),
            AmfValue::Object(object),
        ];

        let out = dispatch(&mut ctx, values, false).await.unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(state.chunk_snd_max, POST_CONNECT_CHUNK_SIZE);

        let decoded = amf0::decode_all(&out[4][12..]).unwrap();
        assert_eq!(decoded[0].as_str(), Some("_result"));
    }

    #[tokio::test]
    async fn play_defers_its_reply() {
        let mut state = fresh_state();
        let mut backend = None;
        let root = Path::new("/tmp/mist");
        let mut ctx = fresh_ctx(&mut state, &mut backend, root);
        ctx.msg_stream_id = 1;

        let values = vec![
            AmfValue::String("play".to_string()),
            AmfValue::Number(5.0),
            AmfValue::Null,
            AmfValue::String("foo".to_string()),
        ];

        let out = dispatch(&mut ctx, values, false).await.unwrap();
        assert!(out.is_empty());
        assert!(state.ready_for_data);
        assert_eq!(state.stream_name.as_deref(), Some("foo"));
        let pending = state.pending_play_reply.as_ref().unwrap();
        assert_eq!(pending.transaction_id, 5.0);
        assert_eq!(pending.stream_id, 1);
    }

    #[tokio::test]
    async fn unhandled_command_produces_no_reply_and_does_not_error() {
        let mut state = fresh_state();
        let mut backend = None;
        let root = Path::new("/tmp/mist");
        let mut ctx = fresh_ctx(&mut state, &mut backend, root);

        let values = vec![AmfValue::String("releaseStream".to_string()), AmfValue::Number(3.0)];
        let out = dispatch(&mut ctx, values, false).await.unwrap();
        assert!(out.is_empty());
    }
}
