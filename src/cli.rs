//! Shared CLI surface for the two connector binaries (spec §6, §9A),
//! following the `clap` derive style used throughout the rest of the
//! retrieved corpus for service binaries (e.g. `synctv-stream`'s `Args`).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Flags shared by `http-connector` and `rtmp-connector`.
#[derive(Parser, Debug)]
#[command(about = "mist-connect client-facing protocol connector", long_about = None)]
pub struct Args {
    /// Interface to bind the listening socket on.
    #[arg(long, default_value = "0.0.0.0")]
    pub listen_interface: IpAddr,

    /// Port to bind the listening socket on. Defaults differ per binary.
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Path to the stream-list JSON document (spec §6). Only consulted by
    /// the HTTP connector's inline responder.
    #[arg(long, default_value = "/tmp/mist/streamlist")]
    pub streamlist: PathBuf,

    /// Directory under which per-protocol and per-stream backend domain
    /// sockets live.
    #[arg(long, default_value = "/tmp/mist")]
    pub backend_root: PathBuf,

    /// Fork into the background and exit immediately, matching the
    /// reference daemons' `-d`/daemonize control flag. Not implemented
    /// beyond acceptance, since this crate's process model is a single
    /// foreground `tokio` runtime; the flag is accepted so existing process
    /// supervisors invoking it don't fail to launch.
    #[arg(long, default_value_t = false)]
    pub daemonize: bool,
}

impl Args {
    pub fn bind_addr(&self, default_port: u16) -> SocketAddr {
        SocketAddr::new(self.listen_interface, self.listen_port.unwrap_or(default_port))
    }
}
