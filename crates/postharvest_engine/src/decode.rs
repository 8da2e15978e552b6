use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use crate::{SurfaceError, SurfaceFailure};

/// Bytes scanned for a `<meta charset>` declaration.
const META_PRESCAN_BYTES: usize = 1024;

/// Decodes a fetched document to UTF-8.
///
/// Label priority: byte-order mark, `charset` in the Content-Type header,
/// `<meta charset>` in the head of the document, then statistical detection.
pub fn decode_document(bytes: &[u8], content_type: Option<&str>) -> Result<String, SurfaceError> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| content_type.and_then(header_charset).and_then(label_to_encoding))
        .or_else(|| meta_charset(bytes).and_then(label_to_encoding))
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors && used == UTF_8 {
        return Err(SurfaceError::new(
            SurfaceFailure::Decode,
            format!("document is not valid {}", used.name()),
        ));
    }
    Ok(text.into_owned())
}

fn label_to_encoding(label: String) -> Option<&'static Encoding> {
    Encoding::for_label(label.as_bytes())
}

fn header_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_PRESCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let start = head.find("charset=")? + "charset=".len();
    let label: String = head[start..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
        .collect();
    (!label.is_empty()).then_some(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_charset_wins_over_detection() {
        let bytes = [0x63, 0x61, 0x66, 0xE9];
        let text = decode_document(&bytes, Some("text/html; charset=ISO-8859-1")).unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn meta_charset_is_read_from_document_head() {
        let mut bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>".to_vec();
        bytes.push(0xE9);
        let text = decode_document(&bytes, Some("text/html")).unwrap();
        assert!(text.ends_with('é'));
    }

    #[test]
    fn invalid_utf8_under_utf8_label_is_a_decode_failure() {
        let err = decode_document(&[0x61, 0xFF, 0x62], Some("text/html; charset=utf-8"))
            .unwrap_err();
        assert_eq!(err.kind, SurfaceFailure::Decode);
    }
}
