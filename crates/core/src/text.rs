//! Text extraction from fixed-length, optionally NUL-terminated buffers.
//!
//! Producers write C strings into fixed arrays. The text ends at the first
//! NUL or at the end of the buffer. UTF-8 is tried first; anything else is
//! decoded with a single-byte legacy codepage, so decoding never fails.

use encoding_rs::{Encoding, WINDOWS_1252};

/// Legacy codepage used when a buffer is not valid UTF-8.
pub fn default_legacy_encoding() -> &'static Encoding {
    WINDOWS_1252
}

/// Decode `buf` with the default legacy fallback.
pub fn decode_fixed_text(buf: &[u8]) -> String {
    decode_fixed_text_with(buf, default_legacy_encoding())
}

/// Decode `buf`, falling back to `legacy` on invalid UTF-8.
pub fn decode_fixed_text_with(buf: &[u8], legacy: &'static Encoding) -> String {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    if len == 0 {
        return String::new();
    }

    let bytes = &buf[..len];
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => {
            let (text, _had_errors) = legacy.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(text: &[u8], capacity: usize) -> Vec<u8> {
        let mut buf = text.to_vec();
        buf.resize(capacity, 0);
        buf
    }

    #[test]
    fn zero_padded_buffer_decodes_to_prefix() {
        let buf = padded(b"GPU Temperature", 260);
        assert_eq!(decode_fixed_text(&buf), "GPU Temperature");
    }

    #[test]
    fn unterminated_buffer_uses_full_length() {
        let buf = b"Core clock".to_vec();
        assert_eq!(decode_fixed_text(&buf), "Core clock");
    }

    #[test]
    fn stops_at_first_nul() {
        let buf = b"Fan\0speed\0\0";
        assert_eq!(decode_fixed_text(buf), "Fan");
    }

    #[test]
    fn empty_and_leading_nul_give_empty_string() {
        assert_eq!(decode_fixed_text(&[]), "");
        assert_eq!(decode_fixed_text(&[0, b'x', b'y']), "");
    }

    #[test]
    fn multibyte_utf8_is_preserved() {
        let buf = padded("°C".as_bytes(), 16);
        assert_eq!(decode_fixed_text(&buf), "°C");
    }

    #[test]
    fn invalid_utf8_falls_back_to_legacy_codepage() {
        // 0xB0 is the degree sign in Windows-1252 but a bare continuation
        // byte in UTF-8.
        let buf = padded(&[0xB0, b'C'], 8);
        assert_eq!(decode_fixed_text(&buf), "°C");
    }

    #[test]
    fn fallback_encoding_is_selectable() {
        // 0xC4 is 'Ä' in Windows-1252 and 'Д' in Windows-1251.
        let buf = [0xC4, b'1'];
        assert_eq!(decode_fixed_text_with(&buf, encoding_rs::WINDOWS_1251), "Д1");
        assert_eq!(decode_fixed_text_with(&buf, WINDOWS_1252), "Ä1");
    }

    #[test]
    fn arbitrary_bytes_always_decode() {
        let buf: Vec<u8> = (1..=255u8).collect();
        let text = decode_fixed_text(&buf);
        assert!(!text.is_empty());
    }

    #[test]
    fn truncated_multibyte_sequence_still_decodes() {
        // First byte of a two-byte UTF-8 sequence cut off by the buffer end.
        let buf = [b'G', b'P', b'U', 0xC2];
        assert_eq!(decode_fixed_text(&buf), "GPUÂ");
    }
}
