//! Payload decoding: base64 transport and CSV text encodings.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use log::debug;
use zeroize::Zeroizing;

use super::types::{InterchangeError, InterchangeResult};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Decode a base64 transport payload. Surrounding whitespace and line
/// breaks are ignored.
pub fn decode_base64(payload: &str) -> InterchangeResult<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    B64.decode(compact.as_bytes())
        .map_err(|e| InterchangeError::invalid_payload(format!("Invalid base64 payload: {}", e)))
}

/// Decode a base64 key file into protected memory.
pub fn decode_key_file(payload: &str) -> InterchangeResult<Zeroizing<Vec<u8>>> {
    decode_base64(payload).map(Zeroizing::new)
}

pub fn encode_base64(data: &[u8]) -> String {
    B64.encode(data)
}

/// Decode CSV bytes into text.
///
/// UTF-8 (with or without BOM) and UTF-16 with a BOM are accepted.
pub fn decode_text(bytes: &[u8]) -> InterchangeResult<String> {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        return utf8(rest);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        debug!("Decoding UTF-16LE payload");
        return utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        debug!("Decoding UTF-16BE payload");
        return utf16(rest, u16::from_be_bytes);
    }
    utf8(bytes)
}

fn utf8(bytes: &[u8]) -> InterchangeResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| InterchangeError::invalid_payload(format!("Payload is not valid UTF-8: {}", e)))
}

fn utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> InterchangeResult<String> {
    if bytes.len() % 2 != 0 {
        return Err(InterchangeError::invalid_payload(
            "UTF-16 payload has an odd number of bytes",
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|e| InterchangeError::invalid_payload(format!("Payload is not valid UTF-16: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interchange::types::InterchangeErrorKind;

    #[test]
    fn test_decode_base64() {
        assert_eq!(decode_base64("aGVs\nbG8=").unwrap(), b"hello");
        let err = decode_base64("***").unwrap_err();
        assert_eq!(err.kind, InterchangeErrorKind::InvalidPayload);
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("Title,Username\n".as_bytes());
        assert_eq!(decode_text(&bytes).unwrap(), "Title,Username\n");
    }

    #[test]
    fn test_decode_utf16le() {
        let mut bytes = UTF16_LE_BOM.to_vec();
        for unit in "né,x".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes).unwrap(), "né,x");
    }

    #[test]
    fn test_decode_utf16be() {
        let mut bytes = UTF16_BE_BOM.to_vec();
        for unit in "abc".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text(&bytes).unwrap(), "abc");
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decode_text(&[0x61, 0xC3, 0x28]).unwrap_err();
        assert_eq!(err.kind, InterchangeErrorKind::InvalidPayload);
    }

    #[test]
    fn test_encode_roundtrip() {
        let data = b"\x00\x01binary";
        assert_eq!(decode_base64(&encode_base64(data)).unwrap(), data);
    }
}
