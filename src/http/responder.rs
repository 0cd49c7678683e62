//! Inline HTTP responses the gateway serves itself (spec §4.2): the two
//! fixed cross-domain policy documents, the `info_`/`embed_` player
//! bootstrap scripts, and the `415` fallback for unroutable URLs.

use bytes::Bytes;

use crate::http::message::HttpResponse;
use crate::http::streamlist::StreamList;

const CROSSDOMAIN_XML: &str = concat!(
    "<?xml version=\"1.0\"?><!DOCTYPE cross-domain-policy SYSTEM ",
    "\"http://www.adobe.com/xml/dtds/cross-domain-policy.dtd\">",
    "<cross-domain-policy><allow-access-from domain=\"*\" />",
    "<site-control permitted-cross-domain-policies=\"all\"/></cross-domain-policy>"
);

const CLIENT_ACCESS_POLICY_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"utf-8\"?><access-policy><cross-domain-access>",
    "<policy><allow-from http-methods=\"*\" http-request-headers=\"*\">",
    "<domain uri=\"*\"/></allow-from><grant-to><resource path=\"/\" include-subpaths=\"true\"/>",
    "</grant-to></policy></cross-domain-access></access-policy>"
);

/// The embedded player blob is an external collaborator (spec §1); this
/// placeholder is emitted verbatim where the reference player bootstrap
/// would go.
const EMBED_PLAYER_BLOB: &str = "function(streamname)";

pub fn crossdomain() -> HttpResponse {
    HttpResponse::new(200, "OK", "text/xml", Bytes::from_static(CROSSDOMAIN_XML.as_bytes()))
}

pub fn client_access_policy() -> HttpResponse {
    HttpResponse::new(
        200,
        "OK",
        "text/xml",
        Bytes::from_static(CLIENT_ACCESS_POLICY_XML.as_bytes()),
    )
}

pub fn unsupported_media() -> HttpResponse {
    HttpResponse::new(
        415,
        "Unsupported Media Type",
        "text/html",
        Bytes::from_static(b"<!DOCTYPE html><html><head><title>Unsupported Media Type</title></head>\
<body><h1>Unsupported Media Type</h1>This server does not know how to handle this request.</body></html>"),
    )
}

pub fn gateway_timeout() -> HttpResponse {
    HttpResponse::new(
        504,
        "Gateway Timeout",
        "text/html",
        Bytes::from_static(b"<!DOCTYPE html><html><head><title>Gateway timeout</title></head><body><h1>Gateway timeout</h1>\
Though the server understood your request and attempted to handle it, somehow handling it took longer than it should. \
Your request has been cancelled - please try again later.</body></html>"),
    )
}

/// Build the `mistvideo['<stream>'] = {...};` payload shared by
/// `info_<stream>.js` and `embed_<stream>.js` (spec §4.2).
fn source_document(streams: &StreamList, stream: &str, host: &str) -> String {
    let protocols = &streams.config.protocols;
    match streams.streams.get(stream) {
        Some(entry) if !protocols.is_empty() => {
            let width = entry.meta.video.as_ref().map(|v| v.width).unwrap_or(0);
            let height = entry.meta.video.as_ref().map(|v| v.height).unwrap_or(0);

            let mut sources = Vec::new();
            for proto in protocols.iter().filter(|p| p.is_rtmp()) {
                sources.push(format!(
                    "{{\"type\":\"rtmp\",\"url\":\"rtmp://{host}:{}/play/{stream}\"}}",
                    proto.port
                ));
            }
            for proto in protocols.iter().filter(|p| p.is_http()) {
                sources.push(format!(
                    "{{\"type\":\"f4v\",\"url\":\"http://{host}:{}/{stream}/manifest.f4m\"}}",
                    proto.port
                ));
            }
            for proto in protocols.iter().filter(|p| p.is_http()) {
                sources.push(format!(
                    "{{\"type\":\"flv\",\"url\":\"http://{host}:{}/{stream}.flv\"}}",
                    proto.port
                ));
            }

            format!(
                "{{\"width\":{width},\"height\":{height},\"source\":[{}]}}",
                sources.join(",")
            )
        }
        _ => "{\"error\":\"The specified stream is not available on this server.\"}".to_string(),
    }
}

pub fn info_js(streams: &StreamList, stream: &str, host: &str) -> HttpResponse {
    let doc = source_document(streams, stream, host);
    let body = format!(
        "if (!mistvideo){{var mistvideo = {{}};}}\nmistvideo['{stream}'] = {doc};\n"
    );
    HttpResponse::new(200, "OK", "application/javascript", Bytes::from(body))
}

pub fn embed_js(streams: &StreamList, stream: &str, host: &str) -> HttpResponse {
    let doc = source_document(streams, stream, host);
    let mut body = format!(
        "if (!mistvideo){{var mistvideo = {{}};}}\nmistvideo['{stream}'] = {doc};\n"
    );
    if !doc.contains("\"error\"") {
        body.push_str(&format!("\n({EMBED_PLAYER_BLOB}(\"{stream}\"));\n"));
    }
    HttpResponse::new(200, "OK", "application/javascript", Bytes::from(body))
}
