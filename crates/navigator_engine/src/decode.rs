use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes with {encoding}: {message}")]
    DecodeFailure { encoding: String, message: String },
}

/// Incremental byte-to-text decoder for a streamed response body.
///
/// A multi-byte character split across two network reads is held back until
/// the rest of its bytes arrive.
pub struct StreamDecoder {
    encoding: &'static Encoding,
    decoder: Decoder,
}

impl StreamDecoder {
    /// Picks the encoding from the `Content-Type` charset, defaulting to UTF-8.
    pub fn for_content_type(content_type: Option<&str>) -> Self {
        let encoding = content_type
            .and_then(extract_charset)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        Self {
            encoding,
            decoder: encoding.new_decoder_with_bom_removal(),
        }
    }

    pub fn encoding_label(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decodes the next chunk. Pass `last = true` once the body has ended so
    /// that an incomplete trailing sequence is reported.
    pub fn decode(&mut self, bytes: &[u8], last: bool) -> Result<String, DecodeError> {
        let mut out = String::with_capacity(
            self.decoder
                .max_utf8_buffer_length(bytes.len())
                .unwrap_or(bytes.len() * 3 + 4),
        );
        let (result, read, had_errors) = self.decoder.decode_to_string(bytes, &mut out, last);
        if had_errors {
            return Err(DecodeError::DecodeFailure {
                encoding: self.encoding.name().to_string(),
                message: "malformed byte sequence".into(),
            });
        }
        match result {
            CoderResult::InputEmpty => Ok(out),
            CoderResult::OutputFull => Err(DecodeError::DecodeFailure {
                encoding: self.encoding.name().to_string(),
                message: format!("output buffer full after {read} of {} bytes", bytes.len()),
            }),
        }
    }
}

pub(crate) fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let part = part.trim();
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim_matches([' ', '"', '\''].as_ref()))
        })
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_multibyte_character_is_reassembled() {
        let text = "température ≥ 90°";
        let bytes = text.as_bytes();
        // Split inside the two-byte 'é'.
        let cut = text.find('é').unwrap() + 1;

        let mut decoder = StreamDecoder::for_content_type(Some("text/event-stream"));
        let mut decoded = decoder.decode(&bytes[..cut], false).unwrap();
        assert_eq!(decoded, "temp");
        decoded.push_str(&decoder.decode(&bytes[cut..], false).unwrap());
        decoded.push_str(&decoder.decode(&[], true).unwrap());
        assert_eq!(decoded, text);
    }

    #[test]
    fn truncated_sequence_at_end_is_an_error() {
        let mut decoder = StreamDecoder::for_content_type(None);
        let bytes = "≥".as_bytes();
        assert_eq!(decoder.decode(&bytes[..2], false).unwrap(), "");
        assert!(decoder.decode(&[], true).is_err());
    }

    #[test]
    fn charset_from_content_type_is_honoured() {
        let mut decoder =
            StreamDecoder::for_content_type(Some("text/event-stream; Charset=\"ISO-8859-1\""));
        assert_eq!(decoder.encoding_label(), "windows-1252");
        assert_eq!(decoder.decode(&[0x63, 0x61, 0x66, 0xe9], true).unwrap(), "café");
    }

    #[test]
    fn unknown_charset_falls_back_to_utf8() {
        let decoder = StreamDecoder::for_content_type(Some("text/plain; charset=bogus"));
        assert_eq!(decoder.encoding_label(), "UTF-8");
        assert_eq!(extract_charset("text/html"), None);
    }
}
