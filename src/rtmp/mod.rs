//! The RTMP connector (spec §2, §4.5-§4.9): handshake, chunk demux,
//! control/AMF command dispatch, and the publish/play direction pumps.

pub mod config;
pub mod dispatch;
pub mod frame;
pub mod play;
pub mod publish;
pub mod server;
pub mod session;
pub mod state;
pub mod writer;

pub use config::RtmpConfig;
pub use server::RtmpServer;
