//! AMF0/AMF3 codec
//!
//! RTMP command messages (message type 20 for AMF0, 17 for AMF3) carry an
//! ordered sequence of AMF-encoded values. Both versions decode into the
//! same [`AmfValue`] tree; only the wire format differs.

pub mod amf0;
pub mod amf3;
pub mod value;

pub use amf0::{Amf0Decoder, Amf0Encoder};
pub use amf3::{Amf3Decoder, Amf3Encoder};
pub use value::AmfValue;
