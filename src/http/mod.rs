//! The HTTP multiplexing gateway (spec §2, §4.1-§4.4).

pub mod classifier;
pub mod config;
pub mod message;
pub mod pool;
pub mod proxy;
pub mod responder;
pub mod server;
pub mod streamlist;

pub use config::HttpConfig;
pub use server::HttpServer;
