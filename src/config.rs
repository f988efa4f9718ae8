//! Request configuration surface.
//!
//! A node carries [`NodeDefaults`] from its deploy-time settings; each
//! incoming message may carry [`RequestOverrides`]. Merging the two yields
//! the [`EffectiveConfig`] a single request runs with. Configuration is
//! built fresh per request and never persisted.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::OcrError;
use crate::pool::{MAX_POOL_SIZE, MIN_POOL_SIZE};

/// Language the engine is initialized with when the caller names none.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Default recognition timeout. Zero or negative disables the timeout.
pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;

/// Deploy-time settings for one node instance.
///
/// Deserialized from the host's JSON node configuration; every field has a
/// documented default so an empty object is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeDefaults {
    /// Language code requested from the engine (e.g. "eng").
    pub language: String,
    /// Engine parameter map. The default restricts recognition to digit
    /// characters in single-line segmentation mode.
    pub parameters: BTreeMap<String, Value>,
    /// Optional sub-region of the image, as a loose wire value.
    pub rectangle: Option<Value>,
    /// Desired worker pool size, clamped to 1..=4.
    pub pool_size: i64,
    /// Recognition timeout in milliseconds; `<= 0` disables it.
    pub timeout_ms: i64,
    /// Reject malformed rectangles instead of silently recognizing the
    /// whole image.
    pub strict_rectangle: bool,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            parameters: default_parameters(),
            rectangle: None,
            pool_size: MIN_POOL_SIZE as i64,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            strict_rectangle: false,
        }
    }
}

/// Default engine parameters: digits only, single text line.
pub fn default_parameters() -> BTreeMap<String, Value> {
    let mut parameters = BTreeMap::new();
    parameters.insert(
        "tessedit_char_whitelist".to_string(),
        Value::String("0123456789".to_string()),
    );
    parameters.insert(
        "tessedit_pageseg_mode".to_string(),
        Value::String("7".to_string()),
    );
    parameters
}

/// Per-message overrides. Every field is optional; parameters override the
/// node defaults per key, not wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RequestOverrides {
    pub language: Option<String>,
    pub parameters: BTreeMap<String, Value>,
    pub rectangle: Option<Value>,
    pub pool_size: Option<i64>,
    pub timeout_ms: Option<i64>,
}

/// Sub-region of the input image restricting recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    /// Parse a rectangle from a loose wire value.
    ///
    /// Returns `None` unless all four fields are present and are
    /// non-negative integers; fractional or string dimensions do not count.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let field = |name: &str| -> Option<u32> {
            let number = object.get(name)?.as_i64()?;
            u32::try_from(number).ok()
        };
        Some(Self {
            left: field("left")?,
            top: field("top")?,
            width: field("width")?,
            height: field("height")?,
        })
    }
}

/// Fully resolved configuration for one request.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub language: String,
    pub parameters: BTreeMap<String, String>,
    pub rectangle: Option<Rectangle>,
    pub pool_size: usize,
    pub timeout: Option<Duration>,
}

impl NodeDefaults {
    /// Merge per-message overrides over the node defaults.
    pub fn merge(&self, overrides: &RequestOverrides) -> Result<EffectiveConfig, OcrError> {
        let language = overrides
            .language
            .clone()
            .unwrap_or_else(|| self.language.clone());

        let mut raw = self.parameters.clone();
        for (name, value) in &overrides.parameters {
            raw.insert(name.clone(), value.clone());
        }
        let mut parameters = BTreeMap::new();
        for (name, value) in raw {
            match parameter_value(&value) {
                Some(text) => {
                    parameters.insert(name, text);
                }
                None => warn!(name = %name, "ignoring non-scalar engine parameter"),
            }
        }

        let rectangle = match overrides.rectangle.as_ref().or(self.rectangle.as_ref()) {
            None => None,
            Some(value) => match Rectangle::from_value(value) {
                Some(rect) => Some(rect),
                None if self.strict_rectangle => {
                    return Err(OcrError::UnsupportedPayload(
                        "rectangle must provide integer left, top, width and height".to_string(),
                    ));
                }
                None => {
                    warn!("malformed rectangle; recognizing the whole image instead");
                    None
                }
            },
        };

        let pool_size = overrides
            .pool_size
            .unwrap_or(self.pool_size)
            .clamp(MIN_POOL_SIZE as i64, MAX_POOL_SIZE as i64) as usize;

        let timeout_ms = overrides.timeout_ms.unwrap_or(self.timeout_ms);
        let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms as u64));

        Ok(EffectiveConfig {
            language,
            parameters,
            rectangle,
            pool_size,
            timeout,
        })
    }
}

/// Stringify a scalar wire value for the engine parameter table.
fn parameter_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = NodeDefaults::default()
            .merge(&RequestOverrides::default())
            .unwrap();

        assert_eq!(config.language, "eng");
        assert_eq!(config.pool_size, 1);
        assert_eq!(config.timeout, Some(Duration::from_millis(30_000)));
        assert!(config.rectangle.is_none());
        assert_eq!(
            config.parameters.get("tessedit_char_whitelist").unwrap(),
            "0123456789"
        );
        assert_eq!(config.parameters.get("tessedit_pageseg_mode").unwrap(), "7");
    }

    #[test]
    fn test_parameters_merge_per_key() {
        let overrides = RequestOverrides {
            parameters: BTreeMap::from([(
                "tessedit_pageseg_mode".to_string(),
                json!(6),
            )]),
            ..Default::default()
        };

        let config = NodeDefaults::default().merge(&overrides).unwrap();

        // The overridden key changes, the default whitelist survives.
        assert_eq!(config.parameters.get("tessedit_pageseg_mode").unwrap(), "6");
        assert_eq!(
            config.parameters.get("tessedit_char_whitelist").unwrap(),
            "0123456789"
        );
    }

    #[test]
    fn test_pool_size_clamped() {
        for (requested, expected) in [(-3, 1), (0, 1), (2, 2), (4, 4), (99, 4)] {
            let overrides = RequestOverrides {
                pool_size: Some(requested),
                ..Default::default()
            };
            let config = NodeDefaults::default().merge(&overrides).unwrap();
            assert_eq!(config.pool_size, expected, "pool size {requested}");
        }
    }

    #[test]
    fn test_timeout_zero_or_negative_disables() {
        for requested in [0, -1] {
            let overrides = RequestOverrides {
                timeout_ms: Some(requested),
                ..Default::default()
            };
            let config = NodeDefaults::default().merge(&overrides).unwrap();
            assert!(config.timeout.is_none());
        }
    }

    #[test]
    fn test_rectangle_requires_all_integer_fields() {
        let valid = json!({"left": 10, "top": 20, "width": 30, "height": 40});
        assert_eq!(
            Rectangle::from_value(&valid),
            Some(Rectangle {
                left: 10,
                top: 20,
                width: 30,
                height: 40
            })
        );

        let fractional = json!({"left": 10, "top": 20, "width": 30.5, "height": 40});
        assert_eq!(Rectangle::from_value(&fractional), None);

        let missing = json!({"left": 10, "top": 20, "width": 30});
        assert_eq!(Rectangle::from_value(&missing), None);

        let negative = json!({"left": -1, "top": 20, "width": 30, "height": 40});
        assert_eq!(Rectangle::from_value(&negative), None);

        let text = json!({"left": "10", "top": 20, "width": 30, "height": 40});
        assert_eq!(Rectangle::from_value(&text), None);
    }

    #[test]
    fn test_malformed_rectangle_permissive_by_default() {
        let overrides = RequestOverrides {
            rectangle: Some(json!({"left": 0, "top": 0, "width": "ten", "height": 5})),
            ..Default::default()
        };
        let config = NodeDefaults::default().merge(&overrides).unwrap();
        assert!(config.rectangle.is_none());
    }

    #[test]
    fn test_malformed_rectangle_rejected_in_strict_mode() {
        let defaults = NodeDefaults {
            strict_rectangle: true,
            ..Default::default()
        };
        let overrides = RequestOverrides {
            rectangle: Some(json!({"left": 0, "top": 0, "width": "ten", "height": 5})),
            ..Default::default()
        };
        let err = defaults.merge(&overrides).unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedPayload(_)));
    }

    #[test]
    fn test_overrides_from_wire_json() {
        let overrides: RequestOverrides = serde_json::from_value(json!({
            "language": "deu",
            "pool_size": 3,
            "timeout_ms": 5000,
            "parameters": {"user_defined_dpi": 300}
        }))
        .unwrap();

        let config = NodeDefaults::default().merge(&overrides).unwrap();
        assert_eq!(config.language, "deu");
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.timeout, Some(Duration::from_millis(5000)));
        assert_eq!(config.parameters.get("user_defined_dpi").unwrap(), "300");
    }
}
