//! Hashing System - SHA-256 for Outputs and Run Summaries
//!
//! Every written PNG carries its digest, and each run records a fingerprint
//! of the configuration it rendered so two summaries can be compared.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

use crate::config::ScreenshotConfig;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), sort_value(v))).collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Fingerprint of the configuration after merge keys and defaults are applied.
/// YAML formatting, comments and anchor layout do not affect it.
pub fn config_fingerprint(config: &ScreenshotConfig) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(config)?.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": {"y": 2, "b": 3}});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":{"b":3,"y":2},"z":1}"#);
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_ignores_yaml_layout() {
        let plain = r##"
default_language: en
default_theme: standard
theme_styles:
  standard:
    main_text_style: {color: "#111111", font_size: 120}
screenshots: []
"##;
        let anchored = r##"
_base: &base
  color: "#111111"
default_theme: standard
default_language: en   # reordered
theme_styles:
  standard:
    main_text_style:
      <<: *base
      font_size: 120
screenshots: []
"##;
        let a = ScreenshotConfig::from_yaml_str(plain).unwrap().config;
        let b = ScreenshotConfig::from_yaml_str(anchored).unwrap().config;
        assert_eq!(config_fingerprint(&a).unwrap(), config_fingerprint(&b).unwrap());
    }
}
