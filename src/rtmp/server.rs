//! RTMP TCP listener (spec §5): one task per accepted connection, mirroring
//! [`crate::http::HttpServer`]'s accept loop.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::rtmp::config::RtmpConfig;
use crate::rtmp::session;

pub struct RtmpServer {
    config: RtmpConfig,
}

impl RtmpServer {
    pub fn new(config: RtmpConfig) -> Self {
        Self { config }
    }

    /// Bind and run forever, spawning one task per accepted connection.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "RTMP connector listening");

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        handle_connection(socket, peer_addr, config).await;
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept RTMP connection");
                }
            }
        }
    }
}

async fn handle_connection(socket: TcpStream, peer_addr: SocketAddr, config: RtmpConfig) {
    if let Err(e) = session::run_session(socket, peer_addr, config).await {
        tracing::debug!(peer = %peer_addr, error = %e, "RTMP session error");
    }
}
