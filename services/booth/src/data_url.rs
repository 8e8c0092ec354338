//! services/booth/src/data_url.rs
//!
//! `data:` URL encoding and decoding for images moving in and out of the blob cache.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use dream_booth_core::ports::{PortError, PortResult};
use percent_encoding::percent_decode_str;

pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Guesses an image MIME type from its leading bytes.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "image/gif"
    } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        "image/webp"
    } else {
        FALLBACK_MIME
    }
}

pub fn encode(data: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(data), STANDARD.encode(data))
}

/// Decodes a `data:` URL into its MIME type and payload.
/// Base64 payloads and percent-encoded plain payloads are both accepted.
pub fn decode(url: &str) -> PortResult<(String, Bytes)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| PortError::Unexpected("not a data: URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| PortError::Unexpected("data: URL has no payload".to_string()))?;

    let (mime, is_base64) = match meta.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (meta, false),
    };
    let mime = if mime.is_empty() { FALLBACK_MIME } else { mime };

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| PortError::Unexpected(format!("invalid base64 payload: {}", e)))?
    } else {
        percent_decode_str(payload).collect()
    };
    Ok((mime.to_string(), Bytes::from(bytes)))
}
