//! The local-domain-socket bridge to backend processes, and the viewer
//! fingerprint used to key the HTTP pool (spec §3).

pub mod bridge;
pub mod fingerprint;

pub use bridge::BackendBridge;
pub use fingerprint::fingerprint;
