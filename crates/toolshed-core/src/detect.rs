//! Built-in clipboard content detectors.
//!
//! Each detector is a pure function of the text, so they are safe to run from
//! any worker task. Leading and trailing whitespace is ignored.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use toolshed_config::DetectorKind;

/// Run the detector selected by `kind` against `content`.
pub fn matches(kind: DetectorKind, content: &str) -> bool {
    match kind {
        DetectorKind::None => false,
        DetectorKind::Json => is_json(content),
        DetectorKind::Base64 => is_base64(content),
        DetectorKind::Url => is_url(content),
        DetectorKind::Jwt => is_jwt(content),
        DetectorKind::Guid => is_guid(content),
        DetectorKind::Number => is_number(content),
    }
}

/// A JSON object or array.
pub fn is_json(content: &str) -> bool {
    let text = content.trim();
    if !(text.starts_with('{') || text.starts_with('[')) {
        return false;
    }
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

/// Standard-alphabet base64 whose payload is UTF-8 text.
pub fn is_base64(content: &str) -> bool {
    let text = content.trim();
    if text.len() < 4 || text.len() % 4 != 0 {
        return false;
    }
    match STANDARD.decode(text) {
        Ok(bytes) => !bytes.is_empty() && std::str::from_utf8(&bytes).is_ok(),
        Err(_) => false,
    }
}

/// An absolute URL of the form `scheme://rest` without whitespace.
pub fn is_url(content: &str) -> bool {
    let text = content.trim();
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((scheme, rest)) = text.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid_scheme && !rest.is_empty()
}

/// A JSON Web Token: `header.payload.signature`, header and payload being
/// base64url-encoded JSON objects.
pub fn is_jwt(content: &str) -> bool {
    let text = content.trim();
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 3 || parts[0].is_empty() || parts[1].is_empty() {
        return false;
    }
    parts[..2].iter().all(|segment| decodes_to_json_object(segment))
}

fn decodes_to_json_object(segment: &str) -> bool {
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')) else {
        return false;
    };
    matches!(
        serde_json::from_slice::<serde_json::Value>(&bytes),
        Ok(serde_json::Value::Object(_))
    )
}

/// A GUID in 8-4-4-4-12 form, optionally wrapped in braces.
pub fn is_guid(content: &str) -> bool {
    let text = content.trim();
    let text = text
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .unwrap_or(text);
    if text.len() != 36 {
        return false;
    }
    text.char_indices().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => c == '-',
        _ => c.is_ascii_hexdigit(),
    })
}

/// A decimal, `0x` hexadecimal, `0o` octal, or `0b` binary integer.
pub fn is_number(content: &str) -> bool {
    let text = content.trim();
    let lower = text.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.strip_prefix('-').unwrap_or(lower.as_str()), 10)
    };
    if digits.is_empty() || digits.starts_with('_') {
        return false;
    }
    digits.chars().all(|c| c.is_digit(radix) || c == '_')
}
