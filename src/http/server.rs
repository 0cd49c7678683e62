//! HTTP gateway listener and per-connection worker.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::http::classifier::{classify, HandlerTag};
use crate::http::config::HttpConfig;
use crate::http::message::{parse_request, HttpRequest};
use crate::http::pool::BackendPool;
use crate::http::proxy::{proxy_request, pump_streaming_body, BackendResponse};
use crate::http::responder;
use crate::http::streamlist::StreamList;

/// The HTTP multiplexing gateway.
pub struct HttpServer {
    config: HttpConfig,
    pool: Arc<BackendPool>,
}

impl HttpServer {
    pub fn new(config: HttpConfig) -> Self {
        let pool = BackendPool::new(config.idle_evict_after, config.sweep_interval);
        Self { config, pool }
    }

    /// Bind and run forever, accepting one task per connection.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "HTTP gateway listening");

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    let config = self.config.clone();
                    let pool = Arc::clone(&self.pool);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, peer_addr, config, pool).await {
                            tracing::debug!(peer = %peer_addr, error = %e, "HTTP connection error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept HTTP connection");
                }
            }
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    peer_addr: SocketAddr,
    config: HttpConfig,
    pool: Arc<BackendPool>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let request = loop {
        if let Some(req) = parse_request(&buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))? {
            break req;
        }
        let mut chunk = [0u8; 4096];
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let response = handle_request(&request, peer_addr, &config, &pool).await;
    match response {
        Handled::Inline(resp) => {
            socket.write_all(&resp.to_bytes()).await?;
        }
        Handled::Backend(BackendResponse::Complete(bytes)) => {
            socket.write_all(&bytes).await?;
        }
        Handled::Backend(BackendResponse::Streaming { head, socket: backend_socket }) => {
            socket.write_all(&head).await?;
            pump_streaming_body(backend_socket, &mut socket).await?;
        }
    }
    Ok(())
}

enum Handled {
    Inline(crate::http::message::HttpResponse),
    Backend(BackendResponse),
}

async fn handle_request(
    request: &HttpRequest,
    peer_addr: SocketAddr,
    config: &HttpConfig,
    pool: &Arc<BackendPool>,
) -> Handled {
    let (tag, stream) = classify(&request.path);
    let remote_host = peer_addr.ip().to_string();

    match tag {
        HandlerTag::Internal => Handled::Inline(handle_internal(&request.path, stream, request, config).await),
        HandlerTag::None => Handled::Inline(responder::unsupported_media()),
        HandlerTag::Dynamic | HandlerTag::Smooth | HandlerTag::Live | HandlerTag::Progressive => {
            let connector_tag = match tag {
                HandlerTag::Dynamic => "dynamic",
                HandlerTag::Smooth => "smooth",
                HandlerTag::Live => "live",
                HandlerTag::Progressive => "progressive",
                _ => unreachable!(),
            };
            let stream = stream.unwrap_or_default();
            match proxy_request(
                pool,
                &config.backend_root,
                connector_tag,
                &remote_host,
                &config.server_header,
                config.backend_timeout,
                request,
                &stream,
            )
            .await
            {
                Ok(resp) => Handled::Backend(resp),
                Err(_) => Handled::Inline(responder::gateway_timeout()),
            }
        }
    }
}

async fn handle_internal(
    path: &str,
    stream: Option<String>,
    request: &HttpRequest,
    config: &HttpConfig,
) -> crate::http::message::HttpResponse {
    if path == "/crossdomain.xml" {
        return responder::crossdomain();
    }
    if path == "/clientaccesspolicy.xml" {
        return responder::client_access_policy();
    }

    let Some(stream) = stream else {
        return responder::unsupported_media();
    };

    let streams = match StreamList::load(&config.streamlist_path).await {
        Ok(s) => s,
        Err(_) => return responder::unsupported_media(),
    };
    let host = request
        .header("host")
        .and_then(|h| h.split(':').next())
        .unwrap_or("localhost")
        .to_string();

    if path.starts_with("/info_") {
        responder::info_js(&streams, &stream, &host)
    } else if path.starts_with("/embed_") {
        responder::embed_js(&streams, &stream, &host)
    } else {
        responder::unsupported_media()
    }
}
