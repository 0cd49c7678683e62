//! Viewer fingerprint used as the HTTP pool key (spec §3).

/// `md5(user_agent || remote_host)`, hex-encoded, followed by the stream
/// name and connector tag. Two different viewers never collide; the same
/// viewer requesting a different stream or protocol tag gets a different
/// fingerprint by construction.
pub fn fingerprint(user_agent: &str, remote_host: &str, stream: &str, connector_tag: &str) -> String {
    let mut hashed = String::with_capacity(user_agent.len() + remote_host.len());
    hashed.push_str(user_agent);
    hashed.push_str(remote_host);
    let digest = md5::compute(hashed.as_bytes());
    format!("{digest:x}_{stream}_{connector_tag}")
}
