//! Proxies classified requests to their backend connector (spec §4.3).

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;

use crate::backend::fingerprint;
use crate::error::ProxyError;
use crate::http::message::HttpRequest;
use crate::http::pool::{backend_path, BackendPool};
use std::sync::Arc;

/// Outcome of forwarding a request to a backend: either the whole
/// response was read (known `Content-Length`), or the backend socket was
/// handed off for verbatim streaming (unknown length, spec §4.3).
pub enum BackendResponse {
    Complete(Vec<u8>),
    Streaming { head: Vec<u8>, socket: UnixStream },
}

/// Poll granularity for non-blocking backend reads (spec §4.3: "~5 ms").
const BACKEND_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Total number of `BACKEND_POLL_INTERVAL`-sized polls allotted to a single
/// proxied request before it fails with a `504` (spec §4.3: "~20 seconds").
/// The header and body phases each get their own fresh budget derived from
/// `backend_timeout`, matching `HttpConfig::backend_timeout`'s documented
/// use.
fn poll_budget(backend_timeout: Duration) -> usize {
    (backend_timeout.as_millis() / BACKEND_POLL_INTERVAL.as_millis().max(1)).max(1) as usize
}

/// Forward `request` (already classified as `dynamic`/`progressive`/`smooth`/`live`)
/// to the matching backend, pooling the connection by viewer fingerprint.
pub async fn proxy_request(
    pool: &Arc<BackendPool>,
    backend_root: &Path,
    connector_tag: &str,
    remote_host: &str,
    server_header: &str,
    backend_timeout: Duration,
    request: &HttpRequest,
    stream: &str,
) -> Result<BackendResponse, ProxyError> {
    let user_agent = request.header("user-agent").unwrap_or("");
    let uid = fingerprint(user_agent, remote_host, stream, connector_tag);

    let forwarded = request.to_bytes_with_extra_headers(&[
        ("X-UID", &uid),
        ("X-Origin", remote_host),
    ]);

    let lease = pool.lease(&uid).await;
    let mut held = lease.acquire().await;

    let path = backend_path(backend_root, connector_tag);
    let bridge = held
        .ensure_connected(&path)
        .await
        .map_err(|e| ProxyError::GatewayTimeout(e.to_string()))?;

    bridge
        .write_all(&forwarded)
        .await
        .map_err(|e| ProxyError::GatewayTimeout(e.to_string()))?;

    let poll_iterations = poll_budget(backend_timeout);
    let mut received = Vec::new();
    let mut header_end = None;
    for _ in 0..poll_iterations {
        let mut chunk = [0u8; 4096];
        match bridge.read_with_timeout(&mut chunk, BACKEND_POLL_INTERVAL).await {
            Ok(0) => return Err(ProxyError::GatewayTimeout("backend closed connection".into())),
            Ok(n) => {
                received.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find_double_crlf(&received) {
                    header_end = Some(pos);
                    break;
                }
            }
            Err(crate::error::BridgeError::Timeout) => continue,
            Err(e) => return Err(ProxyError::GatewayTimeout(e.to_string())),
        }
    }

    let header_end = header_end.ok_or_else(|| ProxyError::GatewayTimeout("backend did not respond in time".into()))?;
    let head_text = String::from_utf8_lossy(&received[..header_end]).to_string();
    let content_length = head_text
        .lines()
        .find_map(|line| line.split_once(':').filter(|(k, _)| k.trim().eq_ignore_ascii_case("content-length")))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok());

    let mut head_with_extra = stamp_response_headers(&head_text, &uid, server_header);

    match content_length {
        Some(len) => {
            let body_start = header_end + 4;
            let mut body = received[body_start..].to_vec();
            let mut remaining_iterations = poll_iterations;
            while body.len() < len {
                if remaining_iterations == 0 {
                    return Err(ProxyError::GatewayTimeout("backend did not finish the body in time".into()));
                }
                remaining_iterations -= 1;
                let mut chunk = [0u8; 4096];
                match bridge.read_with_timeout(&mut chunk, BACKEND_POLL_INTERVAL).await {
                    Ok(0) => return Err(ProxyError::GatewayTimeout("backend closed before full body sent".into())),
                    Ok(n) => body.extend_from_slice(&chunk[..n]),
                    Err(crate::error::BridgeError::Timeout) => continue,
                    Err(e) => return Err(ProxyError::GatewayTimeout(e.to_string())),
                }
            }
            head_with_extra.extend_from_slice(&body);
            Ok(BackendResponse::Complete(head_with_extra))
        }
        None => {
            let leftover = received[header_end + 4..].to_vec();
            let socket = held.detach().expect("just connected above").into_inner();
            let mut head = head_with_extra;
            head.extend_from_slice(&leftover);
            Ok(BackendResponse::Streaming { head, socket })
        }
    }
}

/// Pump the remainder of a streaming backend response to the client
/// verbatim until either side closes (spec §4.3).
pub async fn pump_streaming_body<W>(mut socket: UnixStream, mut sink: W) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    use tokio::io::AsyncWriteExt;
    let mut buf = [0u8; 16 * 1024];
    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n]).await?;
    }
    Ok(())
}

fn stamp_response_headers(head_text: &str, uid: &str, server_header: &str) -> Vec<u8> {
    let mut lines: Vec<&str> = head_text.split("\r\n").collect();
    lines.retain(|l| {
        !l.to_ascii_lowercase().starts_with("x-uid:") && !l.to_ascii_lowercase().starts_with("server:")
    });
    let mut out = lines.join("\r\n");
    out.push_str(&format!("\r\nX-UID: {uid}\r\nServer: {server_header}\r\n\r\n"));
    out.into_bytes()
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_budget_derives_iteration_count_from_the_configured_timeout() {
        assert_eq!(poll_budget(Duration::from_secs(20)), 4000);
        assert_eq!(poll_budget(Duration::from_millis(1)), 1);
    }

    #[test]
    fn stamp_response_headers_replaces_existing_x_uid_and_server() {
        let head = "HTTP/1.1 200 OK\r\nX-UID: stale\r\nServer: old\r\nContent-Length: 3";
        let stamped = String::from_utf8(stamp_response_headers(head, "new-uid", "mist-connect/0.1.0")).unwrap();
        assert_eq!(stamped.matches("X-UID:").count(), 1);
        assert!(stamped.contains("X-UID: new-uid"));
        assert!(stamped.contains("Server: mist-connect/0.1.0"));
        assert!(stamped.contains("Content-Length: 3"));
    }
}
