//! Payload encoding: raw bytes → `data:` URI.
//!
//! The data URI doubles as the inline preview source for the uploaded file
//! and as the transport form for the model request, where only the base64
//! part after the comma is sent.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;
use tracing::debug;

/// Encode file contents as `data:<media type>;base64,<data>`.
pub fn encode_payload(bytes: &[u8], media_type: &str) -> Arc<str> {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    format!("data:{media_type};base64,{b64}").into()
}

/// Strip a transport-encoding prefix such as `data:image/png;base64,`.
///
/// Returns the part after the first comma when there is one and it is not
/// empty; otherwise the payload is returned unchanged.
pub fn strip_transport_prefix(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, data)) if !data.is_empty() => data,
        _ => payload,
    }
}
