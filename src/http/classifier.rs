//! HTTP request classifier (spec §4.1)
//!
//! A pure function over the request path: decides which handler tag a
//! request belongs to and, where relevant, the stream name it names.
//! Matching is order-sensitive — the first matching rule wins.

/// Handler tag a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerTag {
    Internal,
    Dynamic,
    Smooth,
    Live,
    Progressive,
    None,
}

/// Classify a request path, returning the handler tag and, for
/// stream-bearing tags, the sanitized stream name.
pub fn classify(path: &str) -> (HandlerTag, Option<String>) {
    if path == "/crossdomain.xml" || path == "/clientaccesspolicy.xml" {
        return (HandlerTag::Internal, None);
    }

    if let Some(name) = strip_prefix_suffix(path, "/embed_", ".js") {
        return (HandlerTag::Internal, Some(sanitize_stream_name(&name)));
    }
    if let Some(name) = strip_prefix_suffix(path, "/info_", ".js") {
        return (HandlerTag::Internal, Some(sanitize_stream_name(&name)));
    }

    if path.contains("f4m") || (path.contains("Seg") && path.contains("Frag")) {
        let stream = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or("");
        return (HandlerTag::Dynamic, Some(sanitize_stream_name(stream)));
    }

    if path.contains("/smooth/") && path.contains(".ism") {
        if let Some(after) = path.split("/smooth/").nth(1) {
            let name = after.split(".ism").next().unwrap_or(after);
            return (HandlerTag::Smooth, Some(sanitize_stream_name(name)));
        }
    }

    if path.contains("/hls/") && (path.contains(".m3u") || path.contains(".ts")) {
        if let Some(after) = path.split("/hls/").nth(1) {
            let name = after.split('.').next().unwrap_or(after);
            return (HandlerTag::Live, Some(sanitize_stream_name(name)));
        }
    }

    if path.ends_with(".flv") || path.ends_with(".mp3") {
        let basename = path.rsplit('/').next().unwrap_or(path);
        let name = basename.rsplit_once('.').map(|(n, _)| n).unwrap_or(basename);
        return (HandlerTag::Progressive, Some(sanitize_stream_name(name)));
    }

    (HandlerTag::None, None)
}

fn strip_prefix_suffix(path: &str, prefix: &str, suffix: &str) -> Option<String> {
    let basename = path.rsplit('/').next().unwrap_or(path);
    let rest = format!("/{basename}");
    rest.strip_prefix(prefix)
        .and_then(|s| s.strip_suffix(suffix))
        .map(|s| s.to_string())
}

/// Lowercases and strips every byte outside `[a-z0-9_]` (spec §4.1).
pub fn sanitize_stream_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossdomain_and_clientaccesspolicy_are_internal() {
        assert_eq!(classify("/crossdomain.xml").0, HandlerTag::Internal);
        assert_eq!(classify("/clientaccesspolicy.xml").0, HandlerTag::Internal);
    }

    #[test]
    fn embed_and_info_extract_stream_name() {
        assert_eq!(
            classify("/embed_foo.js"),
            (HandlerTag::Internal, Some("foo".to_string()))
        );
        assert_eq!(
            classify("/info_Bar.js"),
            (HandlerTag::Internal, Some("bar".to_string()))
        );
    }

    #[test]
    fn f4m_and_seg_frag_are_dynamic() {
        assert_eq!(classify("/foo/manifest.f4m").0, HandlerTag::Dynamic);
        assert_eq!(classify("/foo/Seg1-Frag2").0, HandlerTag::Dynamic);
    }

    #[test]
    fn smooth_streaming_paths_extract_stream_name() {
        let (tag, stream) = classify("/smooth/foo.ism/Manifest");
        assert_eq!(tag, HandlerTag::Smooth);
        assert_eq!(stream.as_deref(), Some("foo"));
    }

    #[test]
    fn hls_paths_extract_stream_name() {
        let (tag, stream) = classify("/hls/foo.m3u8");
        assert_eq!(tag, HandlerTag::Live);
        assert_eq!(stream.as_deref(), Some("foo"));
    }

    #[test]
    fn flv_and_mp3_are_progressive() {
        assert_eq!(
            classify("/mystream.flv"),
            (HandlerTag::Progressive, Some("mystream".to_string()))
        );
        assert_eq!(
            classify("/audio/track.mp3"),
            (HandlerTag::Progressive, Some("track".to_string()))
        );
    }

    #[test]
    fn unrecognized_paths_classify_as_none() {
        assert_eq!(classify("/favicon.ico").0, HandlerTag::None);
    }

    #[test]
    fn classification_is_deterministic() {
        for path in ["/foo.flv", "/crossdomain.xml", "/hls/x.ts", "/nope"] {
            assert_eq!(classify(path), classify(path));
        }
    }

    #[test]
    fn sanitize_strips_illegal_bytes_and_lowercases() {
        assert_eq!(sanitize_stream_name("Foo-Bar 123!"), "foobar123");
    }
}
