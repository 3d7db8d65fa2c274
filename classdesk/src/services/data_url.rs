//! `data:` URL encoding for files kept inline in local records

use crate::error::{AppError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Build `data:<mime>;base64,<payload>`
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Split a base64 data URL into its media type and decoded bytes
pub fn decode(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| AppError::Validation("not a data URL".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::Validation("data URL has no payload".into()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| AppError::Validation("data URL is not base64 encoded".into()))?;

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| AppError::Validation(format!("invalid base64 payload: {}", e)))?;

    Ok((mime.to_string(), bytes))
}
