//! Small pure helpers shared by the services.

use base64::Engine;
use bytes::Bytes;
use domains::{DomainError, Result};
use mime::Mime;

/// Shortens `text` to at most `max` characters, marking the cut with `...`.
///
/// Counts characters, not bytes, so multi-byte text never splits mid-glyph.
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(&"..."[..max.min(3)]);
    out
}

/// A decoded `data:<mime>;base64,<payload>` URI.
#[derive(Debug, Clone)]
pub struct DataUri {
    pub mime: Mime,
    pub data: Bytes,
}

/// Parses the inline image format web clients send with a new post.
pub fn parse_data_uri(raw: &str) -> Result<DataUri> {
    let rest = raw
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| DomainError::validation("img must be a data URI"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| DomainError::validation("img data URI has no payload"))?;
    let mime_str = meta
        .strip_suffix(";base64")
        .ok_or_else(|| DomainError::validation("img data URI must be base64 encoded"))?;

    let mime = mime_str
        .parse::<Mime>()
        .map_err(|_| DomainError::validation(format!("invalid media type: {mime_str}")))?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| DomainError::validation(format!("invalid base64 payload: {e}")))?;
    if data.is_empty() {
        return Err(DomainError::validation("img payload is empty"));
    }

    Ok(DataUri {
        mime,
        data: Bytes::from(data),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_text("hello", 15), "hello");
        assert_eq!(truncate_text("exactly fifteen", 15), "exactly fifteen");
    }

    #[test]
    fn long_text_fits_the_limit() {
        let out = truncate_text("this post is far too long for a subject", 15);
        assert_eq!(out, "this post is...");
        assert!(out.chars().count() <= 15);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let out = truncate_text("ééééééééééééééééééé", 10);
        assert_eq!(out, "ééééééé...");
    }

    #[test]
    fn parses_base64_png_uri() {
        let uri = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(uri.mime, mime::IMAGE_PNG);
        assert_eq!(&uri.data[..], b"hello");
    }

    #[test]
    fn rejects_plain_urls_and_bad_payloads() {
        for raw in [
            "https://example.com/a.png",
            "data:image/png,plain",
            "data:image/png;base64",
            "data:image/png;base64,@@@",
            "data:image/png;base64,",
        ] {
            assert!(
                matches!(parse_data_uri(raw), Err(DomainError::Validation(_))),
                "{raw} should be rejected"
            );
        }
    }
}
