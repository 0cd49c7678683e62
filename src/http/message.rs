//! Minimal HTTP/1.1 request/response representation.
//!
//! The gateway needs byte-level control over proxied bodies (§4.3's dual
//! "known length / streamed" response modes forward backend bytes
//! verbatim), which a routing-oriented web framework's response
//! lifecycle does not expose cleanly. Request/response parsing is
//! therefore hand-rolled here, in the same spirit as the RTMP side's
//! hand-rolled handshake and chunk framing: read bytes directly off the
//! socket, no intermediate framework.

use bytes::{Bytes, BytesMut};

use crate::error::ProxyError;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize back to wire bytes, with additional headers appended
    /// (used to stamp `X-UID`/`X-Origin` before forwarding to a backend).
    pub fn to_bytes_with_extra_headers(&self, extra: &[(&str, &str)]) -> Bytes {
        let mut out = BytesMut::new();
        out.extend_from_slice(format!("{} {} {}\r\n", self.method, self.path, self.version).as_bytes());
        for (k, v) in &self.headers {
            out.extend_from_slice(format!("{k}: {v}\r\n").as_bytes());
        }
        for (k, v) in extra {
            out.extend_from_slice(format!("{k}: {v}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out.freeze()
    }
}

/// Parse a request out of an accumulated read buffer. Returns `None` if
/// the buffer does not yet hold a complete request (more bytes needed).
pub fn parse_request(buf: &[u8]) -> Result<Option<HttpRequest>, ProxyError> {
    let header_end = match find_double_crlf(buf) {
        Some(pos) => pos,
        None => return Ok(None),
    };
    let head = std::str::from_utf8(&buf[..header_end])
        .map_err(|_| ProxyError::UnsupportedMedia("request head was not valid UTF-8".into()))?;
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| ProxyError::UnsupportedMedia("empty request".into()))?;
    let mut parts = request_line.split(' ');
    let method = parts
        .next()
        .ok_or_else(|| ProxyError::UnsupportedMedia("missing method".into()))?
        .to_string();
    let path = parts
        .next()
        .ok_or_else(|| ProxyError::UnsupportedMedia("missing path".into()))?
        .to_string();
    let version = parts.next().unwrap_or("HTTP/1.1").to_string();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    if buf.len() < body_start + content_length {
        return Ok(None);
    }

    let body = Bytes::copy_from_slice(&buf[body_start..body_start + content_length]);
    Ok(Some(HttpRequest {
        method,
        path,
        version,
        headers,
        body,
    }))
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// An outgoing response this crate builds itself (inline responses, 415,
/// 504) — as opposed to a backend's response, which is forwarded verbatim.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, reason: &'static str, content_type: &str, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            status,
            reason,
            headers: vec![
                ("Content-Type".to_string(), content_type.to_string()),
                ("Content-Length".to_string(), body.len().to_string()),
            ],
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", self.status, self.reason).as_bytes());
        for (k, v) in &self.headers {
            out.extend_from_slice(format!("{k}: {v}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_request_with_body() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\nUser-Agent: curl\r\n\r\nhello";
        let req = parse_request(raw).unwrap().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/x");
        assert_eq!(req.header("user-agent"), Some("curl"));
        assert_eq!(&req.body[..], b"hello");
    }

    #[test]
    fn incomplete_request_returns_none() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n";
        assert!(parse_request(raw).unwrap().is_none());
    }

    #[test]
    fn incomplete_body_returns_none() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";
        assert!(parse_request(raw).unwrap().is_none());
    }

    #[test]
    fn response_serializes_status_line_and_headers() {
        let resp = HttpResponse::new(200, "OK", "text/xml", Bytes::from_static(b"<xml/>"));
        let bytes = resp.to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/xml\r\n"));
        assert!(text.ends_with("<xml/>"));
    }
}
