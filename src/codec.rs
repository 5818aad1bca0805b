//! Tracking parameter codec
//!
//! A destination travels inside the `url` query parameter of a tracking link. Links reach us
//! single- or double-encoded depending on who built them, so decoding is layered:
//!
//! 1. two strict percent-decodes,
//! 2. if either fails, one strict percent-decode,
//! 3. if that fails too, the raw key untouched.
//!
//! Decoding therefore never fails. It is not a bijection either: a destination that itself
//! contains `%XX` sequences loses a layer on the way back.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

use crate::models::DestinationKey;

/// Characters left literal by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed percent-escape at byte {0}")]
    MalformedEscape(usize),
    #[error("percent-decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

/// Encode a destination for the tracking parameter.
///
/// One decode layer is peeled first so that a caller who already encoded the destination does
/// not end up with a double-encoded link. Input that does not decode is encoded as-is.
pub fn encode(destination: &str) -> DestinationKey {
    let normalized = match decode_once(destination) {
        Ok(decoded) => decoded,
        Err(_) => destination.to_string(),
    };
    DestinationKey::new(encode_component(&normalized))
}

/// Decode a tracking parameter into a navigable destination.
pub fn decode(key: &str) -> String {
    if let Ok(twice) = decode_once(key).and_then(|once| decode_once(&once)) {
        return twice;
    }
    if let Ok(once) = decode_once(key) {
        return once;
    }
    tracing::debug!(key, "tracking parameter is not percent-decodable, using it verbatim");
    key.to_string()
}

/// Percent-encode every byte outside the URI component unreserved set.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Strict single-layer percent-decode.
///
/// Unlike `percent_decode_str`, a `%` that is not followed by two hex digits is an error rather
/// than a literal.
pub fn decode_once(input: &str) -> Result<String, DecodeError> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            match escape {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return Err(DecodeError::MalformedEscape(i)),
            }
        } else {
            i += 1;
        }
    }

    percent_decode_str(input)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| DecodeError::InvalidUtf8)
}
