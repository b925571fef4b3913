//! Artifact re-encoding for transport over the message queue.

use crate::error::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;

/// Read a GIF written by the automation controller and re-encode it as a
/// data URI the chat front-end can render inline.
pub fn gif_data_uri(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("data:image/gif;base64,{}", STANDARD.encode(bytes)))
}

/// Decode a base64 audio payload from the front-end. MediaRecorder blobs
/// arrive as `data:audio/...;base64,<payload>`; a bare payload is accepted too.
pub fn decode_audio_payload(payload: &str) -> Result<Vec<u8>> {
    let encoded = match payload.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => payload,
    };
    Ok(STANDARD.decode(encoded.trim())?)
}
