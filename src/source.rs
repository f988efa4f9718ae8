//! Input payload normalization.
//!
//! Hosts hand the node wildly different image references: http(s) URLs,
//! data URLs, local paths, raw byte buffers, or the JSON form a byte buffer
//! takes after crossing the wire. Everything funnels into one byte buffer
//! before the pool is ever touched.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;
use tracing::debug;

use crate::error::OcrError;

/// One image reference in any of the accepted representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// http(s) URL to download.
    Url(String),
    /// RFC 2397 data URL with base64 payload.
    DataUrl(String),
    /// Local filesystem path.
    Path(PathBuf),
    /// Ready byte buffer.
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Classify a wire payload value.
    ///
    /// Strings are URLs, data URLs, or paths depending on their prefix.
    /// Number arrays and `{"type": "Buffer", "data": [...]}` objects are the
    /// wire encodings of a byte buffer.
    pub fn from_value(payload: &Value) -> Result<Self, OcrError> {
        match payload {
            Value::String(text) if text.starts_with("http://") || text.starts_with("https://") => {
                Ok(ImageSource::Url(text.clone()))
            }
            Value::String(text) if text.starts_with("data:") => {
                Ok(ImageSource::DataUrl(text.clone()))
            }
            Value::String(text) => Ok(ImageSource::Path(PathBuf::from(text))),
            Value::Array(items) => Ok(ImageSource::Bytes(bytes_from_array(items)?)),
            Value::Object(map)
                if map.get("type").and_then(Value::as_str) == Some("Buffer") =>
            {
                let data = map
                    .get("data")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        OcrError::UnsupportedPayload(
                            "Buffer object is missing its data array".to_string(),
                        )
                    })?;
                Ok(ImageSource::Bytes(bytes_from_array(data)?))
            }
            other => Err(OcrError::UnsupportedPayload(format!(
                "cannot derive an image from a {} payload",
                json_kind(other)
            ))),
        }
    }

    /// Produce the normalized byte buffer for this source.
    pub async fn resolve(&self, client: &reqwest::Client) -> Result<Vec<u8>, OcrError> {
        match self {
            ImageSource::Url(url) => download(client, url).await,
            ImageSource::DataUrl(url) => decode_data_url(url),
            ImageSource::Path(path) => {
                debug!(path = %path.display(), "reading image file");
                tokio::fs::read(path).await.map_err(|err| {
                    OcrError::SourceUnavailable(format!(
                        "cannot read image at {}: {err}",
                        path.display()
                    ))
                })
            }
            ImageSource::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, OcrError> {
    debug!(url, "downloading image");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| OcrError::SourceUnavailable(format!("download failed: {err}")))?;

    if !response.status().is_success() {
        return Err(OcrError::SourceUnavailable(format!(
            "download failed with status {} for {url}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| OcrError::SourceUnavailable(format!("download interrupted: {err}")))?;
    Ok(bytes.to_vec())
}

fn decode_data_url(url: &str) -> Result<Vec<u8>, OcrError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| OcrError::UnsupportedPayload("not a data URL".to_string()))?;
    let (metadata, payload) = rest.split_once(',').ok_or_else(|| {
        OcrError::UnsupportedPayload("data URL is missing its payload".to_string())
    })?;
    if !metadata.ends_with(";base64") {
        return Err(OcrError::UnsupportedPayload(
            "only base64 data URLs are supported".to_string(),
        ));
    }
    BASE64
        .decode(payload.trim())
        .map_err(|err| OcrError::UnsupportedPayload(format!("invalid base64 payload: {err}")))
}

fn bytes_from_array(items: &[Value]) -> Result<Vec<u8>, OcrError> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| {
                    OcrError::UnsupportedPayload(
                        "byte array contains values outside 0..=255".to_string(),
                    )
                })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_classify_url_and_data_url_and_path() {
        assert_eq!(
            ImageSource::from_value(&json!("https://example.com/cat.png")).unwrap(),
            ImageSource::Url("https://example.com/cat.png".to_string())
        );
        assert!(matches!(
            ImageSource::from_value(&json!("data:image/png;base64,AAAA")).unwrap(),
            ImageSource::DataUrl(_)
        ));
        assert_eq!(
            ImageSource::from_value(&json!("/tmp/cat.png")).unwrap(),
            ImageSource::Path(PathBuf::from("/tmp/cat.png"))
        );
    }

    #[test]
    fn test_classify_wire_byte_arrays() {
        assert_eq!(
            ImageSource::from_value(&json!([1, 2, 255])).unwrap(),
            ImageSource::Bytes(vec![1, 2, 255])
        );
        assert_eq!(
            ImageSource::from_value(&json!({"type": "Buffer", "data": [9, 8, 7]})).unwrap(),
            ImageSource::Bytes(vec![9, 8, 7])
        );
    }

    #[test]
    fn test_classify_rejects_unknown_shapes() {
        for payload in [json!(null), json!(42), json!({"kind": "mystery"})] {
            let err = ImageSource::from_value(&payload).unwrap_err();
            assert!(matches!(err, OcrError::UnsupportedPayload(_)), "{payload}");
        }

        let err = ImageSource::from_value(&json!([1, 300])).unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedPayload(_)));
    }

    #[tokio::test]
    async fn test_resolve_data_url() {
        let encoded = BASE64.encode([10u8, 20, 30]);
        let source = ImageSource::DataUrl(format!("data:image/png;base64,{encoded}"));
        let bytes = source.resolve(&reqwest::Client::new()).await.unwrap();
        assert_eq!(bytes, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_resolve_rejects_non_base64_data_url() {
        let source = ImageSource::DataUrl("data:text/plain,hello".to_string());
        let err = source.resolve(&reqwest::Client::new()).await.unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedPayload(_)));
    }

    #[tokio::test]
    async fn test_resolve_reads_local_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not really a png").unwrap();

        let source = ImageSource::Path(file.path().to_path_buf());
        let bytes = source.resolve(&reqwest::Client::new()).await.unwrap();
        assert_eq!(bytes, b"not really a png");
    }

    #[tokio::test]
    async fn test_resolve_missing_file_is_source_unavailable() {
        let source = ImageSource::Path(PathBuf::from("/nonexistent/image.png"));
        let err = source.resolve(&reqwest::Client::new()).await.unwrap_err();
        assert!(matches!(err, OcrError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_resolve_bytes_passthrough() {
        let source = ImageSource::Bytes(vec![1, 2, 3]);
        let bytes = source.resolve(&reqwest::Client::new()).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
