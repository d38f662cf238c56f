//! Textual encodings for keys, messages, ciphertexts and nonces
//!
//! Three encodings are supported:
//! - `raw`: the UTF-8 bytes of the text, unchanged
//! - `hex`: lowercase hex digits, two per byte, no separators (decoding
//!   accepts either case)
//! - `base64`: standard alphabet with padding

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use clap::ValueEnum;
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, KeyboxError, Result};
use crate::keys::KEY_LEN;

/// Textual representation of a byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Encoding {
    Raw,
    Hex,
    #[value(alias = "b64")]
    Base64,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::Raw => "raw",
            Encoding::Hex => "hex",
            Encoding::Base64 => "base64",
        };
        f.write_str(name)
    }
}

impl Encoding {
    /// Decode `text` into the bytes it represents under this encoding.
    pub fn decode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Raw => Ok(text.as_bytes().to_vec()),
            Encoding::Hex => hex::decode(text).map_err(|e| {
                KeyboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::MalformedInput,
                    "hex decoding failed",
                    e,
                )
            }),
            Encoding::Base64 => STANDARD.decode(text).map_err(|e| {
                KeyboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::MalformedInput,
                    "base64 decoding failed",
                    e,
                )
            }),
        }
    }

    /// Encode `bytes` as text under this encoding.
    ///
    /// `raw` only succeeds when the bytes are valid UTF-8.
    pub fn encode(self, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Raw => String::from_utf8(bytes.to_vec()).map_err(|e| {
                KeyboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Encoding,
                    "output is not valid UTF-8; choose hex or base64 output encoding",
                    e.utf8_error(),
                )
            }),
            Encoding::Hex => Ok(hex::encode(bytes)),
            Encoding::Base64 => Ok(STANDARD.encode(bytes)),
        }
    }

    /// Decode the contents of an input file.
    ///
    /// `raw` file content is taken byte-for-byte. For the textual encodings
    /// the content must be UTF-8, and surrounding ASCII whitespace (such as
    /// the trailing newline most editors add) is ignored.
    pub fn decode_file_content(self, content: &[u8]) -> Result<Vec<u8>> {
        match self {
            Encoding::Raw => Ok(content.to_vec()),
            Encoding::Hex | Encoding::Base64 => {
                let text = std::str::from_utf8(content).map_err(|e| {
                    KeyboxError::with_kind_and_source(
                        ErrorCategory::User,
                        ErrorKind::MalformedInput,
                        format!("{} input is not valid UTF-8", self),
                        e,
                    )
                })?;
                self.decode(text.trim_ascii())
            }
        }
    }

    /// Render `bytes` for writing to a file.
    ///
    /// Unlike [`Encoding::encode`], `raw` never fails here: the bytes are
    /// written as they are.
    pub fn encode_file_content(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Encoding::Raw => bytes.to_vec(),
            Encoding::Hex => hex::encode(bytes).into_bytes(),
            Encoding::Base64 => STANDARD.encode(bytes).into_bytes(),
        }
    }
}

/// Interpret the contents of a key file.
///
/// Content longer than [`KEY_LEN`] is taken to be base64 text and decoded;
/// anything else is used as the raw key bytes. The caller checks the final
/// length.
pub fn decode_key_file(content: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if content.len() <= KEY_LEN {
        return Ok(Zeroizing::new(content.to_vec()));
    }

    let text = std::str::from_utf8(content).map_err(|e| {
        KeyboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::MalformedInput,
            "key file is longer than a raw key but is not UTF-8 text",
            e,
        )
    })?;
    let decoded = STANDARD.decode(text.trim_ascii()).map_err(|e| {
        KeyboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::MalformedInput,
            "key file is longer than a raw key but is not valid base64",
            e,
        )
    })?;
    Ok(Zeroizing::new(decoded))
}

/// Render key bytes for a key file. Only `raw` and `base64` can be read back
/// by [`decode_key_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KeyFileFormat {
    #[default]
    Raw,
    #[value(alias = "b64")]
    Base64,
}

impl KeyFileFormat {
    pub fn encode(self, key: &[u8]) -> Zeroizing<Vec<u8>> {
        match self {
            KeyFileFormat::Raw => Zeroizing::new(key.to_vec()),
            KeyFileFormat::Base64 => Zeroizing::new(STANDARD.encode(key).into_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_is_lowercase_without_separators() {
        let encoded = Encoding::Hex.encode(&[0x00, 0xAB, 0xFF, 0x10]).unwrap();
        assert_eq!(encoded, "00abff10");
    }

    #[test]
    fn test_hex_decode_accepts_uppercase() {
        assert_eq!(
            Encoding::Hex.decode("00ABFF10").unwrap(),
            vec![0x00, 0xAB, 0xFF, 0x10]
        );
    }

    #[test]
    fn test_hex_odd_length() {
        let err = Encoding::Hex.decode("abc").expect_err("expected odd length error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedInput));
    }

    #[test]
    fn test_hex_invalid_digit() {
        let err = Encoding::Hex.decode("zz").expect_err("expected invalid digit error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedInput));
    }

    #[test]
    fn test_base64_is_standard_with_padding() {
        let bytes = vec![0xFFu8; 4];
        let encoded = Encoding::Base64.encode(&bytes).unwrap();
        assert_eq!(encoded, "/////w==");
    }

    #[test]
    fn test_base64_bad_alphabet() {
        let err = Encoding::Base64
            .decode("bad$$")
            .expect_err("expected base64 decode error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedInput));
    }

    #[test]
    fn test_base64_bad_padding() {
        let err = Encoding::Base64
            .decode("/////w=")
            .expect_err("expected padding error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedInput));
    }

    #[test]
    fn test_base64_rejects_url_safe_alphabet() {
        assert!(Encoding::Base64.decode("_____w==").is_err());
    }

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(Encoding::Raw.decode("héllo").unwrap(), "héllo".as_bytes());
        assert_eq!(Encoding::Raw.encode("héllo".as_bytes()).unwrap(), "héllo");
    }

    #[test]
    fn test_raw_encode_rejects_non_utf8() {
        let err = Encoding::Raw
            .encode(&[0xff, 0xfe])
            .expect_err("expected encoding error");
        assert_eq!(err.kind, Some(ErrorKind::Encoding));
    }

    #[test]
    fn test_textual_file_content_must_be_utf8() {
        for encoding in [Encoding::Hex, Encoding::Base64] {
            let err = encoding
                .decode_file_content(&[0xff, 0xfe])
                .expect_err("expected malformed input");
            assert_eq!(err.kind, Some(ErrorKind::MalformedInput), "{}", encoding);
        }
        assert_eq!(
            Encoding::Raw.decode_file_content(&[0xff, 0xfe]).unwrap(),
            vec![0xff, 0xfe]
        );
    }

    #[test]
    fn test_all_byte_values_survive_textual_encodings() {
        let bytes: Vec<u8> = (0..=255).collect();
        for encoding in [Encoding::Hex, Encoding::Base64] {
            let text = encoding.encode(&bytes).unwrap();
            assert_eq!(encoding.decode(&text).unwrap(), bytes, "{}", encoding);
        }
    }

    #[test]
    fn test_file_content_ignores_trailing_newline() {
        assert_eq!(
            Encoding::Hex.decode_file_content(b"0102\n").unwrap(),
            vec![1, 2]
        );
        assert_eq!(
            Encoding::Base64.decode_file_content(b"  AQI=\r\n").unwrap(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_raw_file_content_is_untouched() {
        let content = [0xff, 0x00, b'\n'];
        assert_eq!(Encoding::Raw.decode_file_content(&content).unwrap(), content);
        assert_eq!(Encoding::Raw.encode_file_content(&content), content);
    }

    #[test]
    fn test_key_file_raw_bytes() {
        let key = [7u8; KEY_LEN];
        assert_eq!(&*decode_key_file(&key).unwrap(), &key);
    }

    #[test]
    fn test_key_file_short_content_is_kept_raw() {
        // Not a valid key, but the length check belongs to the caller.
        assert_eq!(&*decode_key_file(b"abc").unwrap(), b"abc");
    }

    #[test]
    fn test_key_file_base64_text() {
        let key = [7u8; KEY_LEN];
        let text = STANDARD.encode(key);
        assert_eq!(&*decode_key_file(text.as_bytes()).unwrap(), &key);

        let with_newline = format!("{}\n", text);
        assert_eq!(&*decode_key_file(with_newline.as_bytes()).unwrap(), &key);
    }

    #[test]
    fn test_key_file_long_binary_is_rejected() {
        let content = vec![0xffu8; KEY_LEN + 1];
        let err = decode_key_file(&content).expect_err("expected decode error");
        assert_eq!(err.kind, Some(ErrorKind::MalformedInput));
    }

    #[test]
    fn test_key_file_format_roundtrip() {
        let key = [9u8; KEY_LEN];
        for format in [KeyFileFormat::Raw, KeyFileFormat::Base64] {
            let content = format.encode(&key);
            assert_eq!(&*decode_key_file(&content).unwrap(), &key);
        }
    }
}
