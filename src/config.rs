//! Configuration Model - Single Parse Boundary
//!
//! YAML is decoded into a `serde_yaml::Value`, merge keys are applied, unknown
//! keys are collected as warnings, and the typed model is built section by
//! section so every failure names its key path.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::style::{Spacing, TextStyleOverrides};
use crate::themes::{TextLayout, TextSlot};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error at '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse { path: path.into(), message: message.into() }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration. Read-only once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    pub default_language: String,
    pub default_theme: String,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default = "default_output_sizes")]
    pub output_sizes: Vec<(u32, u32)>,
    #[serde(default)]
    pub theme_styles: BTreeMap<String, ThemeStyle>,
    #[serde(default)]
    pub font_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub fallback_font: Option<String>,
    pub screenshots: Vec<ScreenshotSpec>,
}

pub fn default_output_sizes() -> Vec<(u32, u32)> {
    vec![(1320, 2868), (2064, 2752)]
}

/// Style customisation of one theme (preset or custom).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeStyle {
    #[serde(default)]
    pub text_layout: Option<TextLayout>,
    #[serde(default)]
    pub text_area_height: Option<u32>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub image_style: Option<ImageStyle>,
    #[serde(default)]
    pub main_text_style: Option<TextStyleOverrides>,
    #[serde(default)]
    pub sub_text_style: Option<TextStyleOverrides>,
}

impl ThemeStyle {
    pub const FIELDS: &'static [&'static str] = &[
        "text_layout",
        "text_area_height",
        "background_color",
        "image_style",
        "main_text_style",
        "sub_text_style",
    ];

    pub fn text_style(&self, slot: TextSlot) -> Option<&TextStyleOverrides> {
        match slot {
            TextSlot::Main => self.main_text_style.as_ref(),
            TextSlot::Sub => self.sub_text_style.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageStyle {
    #[serde(default)]
    pub corner_radius: Option<Spacing>,
    #[serde(default)]
    pub padding: Option<Spacing>,
}

impl ImageStyle {
    pub const FIELDS: &'static [&'static str] = &["corner_radius", "padding"];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotSpec {
    pub input_image: String,
    pub output_name: String,
    #[serde(default)]
    pub theme: Option<String>,
    pub text: TextContent,
    #[serde(default)]
    pub main_text_style: Option<TextStyleOverrides>,
    #[serde(default)]
    pub sub_text_style: Option<TextStyleOverrides>,
}

impl ScreenshotSpec {
    pub const FIELDS: &'static [&'static str] = &[
        "input_image",
        "output_name",
        "theme",
        "text",
        "main_text_style",
        "sub_text_style",
    ];

    pub fn text_style(&self, slot: TextSlot) -> Option<&TextStyleOverrides> {
        match slot {
            TextSlot::Main => self.main_text_style.as_ref(),
            TextSlot::Sub => self.sub_text_style.as_ref(),
        }
    }
}

/// Slot -> language -> string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub main_text: BTreeMap<String, String>,
    #[serde(default)]
    pub sub_text: Option<BTreeMap<String, String>>,
}

impl TextContent {
    pub const FIELDS: &'static [&'static str] = &["main_text", "sub_text"];

    pub fn slot(&self, slot: TextSlot) -> Option<&BTreeMap<String, String>> {
        match slot {
            TextSlot::Main => Some(&self.main_text),
            TextSlot::Sub => self.sub_text.as_ref(),
        }
    }

    /// String for `language`, falling back to the default language.
    pub fn text_for(&self, slot: TextSlot, language: &str, default_language: &str) -> Option<&str> {
        let values = self.slot(slot)?;
        values
            .get(language)
            .or_else(|| values.get(default_language))
            .map(String::as_str)
    }
}

impl ScreenshotConfig {
    const FIELDS: &'static [&'static str] = &[
        "default_language",
        "default_theme",
        "languages",
        "output_sizes",
        "theme_styles",
        "font_dirs",
        "fallback_font",
        "screenshots",
    ];

    /// Load from disk; relative paths in the document resolve against its directory.
    pub fn load(path: &Path) -> ConfigResult<ConfigDocument> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut document = Self::from_yaml_str(&content)?;
        document.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(document)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<ConfigDocument> {
        let mut root: Value = serde_yaml::from_str(content)?;
        root.apply_merge()?;

        let Value::Mapping(map) = &root else {
            return Err(ConfigError::parse("<root>", "expected a mapping at the top level"));
        };

        let mut unknown_keys = vec![];
        collect_unknown(map, Self::FIELDS, "", true, &mut unknown_keys);

        let default_language: String = required(map, "default_language", "")?;
        let default_theme: String = required(map, "default_theme", "")?;
        let languages: Option<Vec<String>> = optional(map, "languages", "")?;
        let output_sizes: Vec<(u32, u32)> =
            optional(map, "output_sizes", "")?.unwrap_or_else(default_output_sizes);
        let font_dirs: Vec<PathBuf> = optional(map, "font_dirs", "")?.unwrap_or_default();
        let fallback_font: Option<String> = optional(map, "fallback_font", "")?;

        let mut theme_styles = BTreeMap::new();
        match map.get("theme_styles") {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(themes)) => {
                for (name, value) in themes {
                    let name = key_name(name, "theme_styles")?;
                    let path = format!("theme_styles.{name}");
                    collect_theme_unknown(value, &path, &mut unknown_keys);
                    theme_styles.insert(name, convert::<ThemeStyle>(value, &path)?);
                }
            }
            Some(_) => {
                return Err(ConfigError::parse("theme_styles", "expected a mapping of theme names"));
            }
        }

        let mut screenshots = vec![];
        match map.get("screenshots") {
            Some(Value::Sequence(items)) => {
                for (i, value) in items.iter().enumerate() {
                    let path = format!("screenshots[{i}]");
                    collect_screenshot_unknown(value, &path, &mut unknown_keys);
                    screenshots.push(convert_screenshot(value, &path)?);
                }
            }
            None => return Err(ConfigError::parse("screenshots", "missing required key")),
            Some(_) => {
                return Err(ConfigError::parse("screenshots", "expected a list of screenshots"));
            }
        }

        if output_sizes.iter().any(|(w, h)| *w == 0 || *h == 0) {
            return Err(ConfigError::parse("output_sizes", "width and height must be positive"));
        }

        let config = ScreenshotConfig {
            default_language,
            default_theme,
            languages,
            output_sizes,
            theme_styles,
            font_dirs,
            fallback_font,
            screenshots,
        };

        Ok(ConfigDocument {
            config,
            base_dir: PathBuf::from("."),
            unknown_keys,
        })
    }

    /// Languages to render: explicit selection, then `languages`, then every
    /// language appearing in any `main_text`.
    pub fn languages_to_generate(&self, selected: Option<&str>) -> Vec<String> {
        if let Some(lang) = selected {
            return vec![lang.to_string()];
        }
        if let Some(languages) = &self.languages {
            return languages.clone();
        }
        let mut all: Vec<String> = self
            .screenshots
            .iter()
            .flat_map(|s| s.text.main_text.keys().cloned())
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

/// A parsed configuration plus the context it was loaded in.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    pub config: ScreenshotConfig,
    /// Directory relative input paths and font dirs resolve against.
    pub base_dir: PathBuf,
    /// Key paths that are not part of the schema.
    pub unknown_keys: Vec<String>,
}

impl ConfigDocument {
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

fn convert<T: DeserializeOwned>(value: &Value, path: &str) -> ConfigResult<T> {
    serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::parse(path, e.to_string()))
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn required<T: DeserializeOwned>(map: &Mapping, key: &str, prefix: &str) -> ConfigResult<T> {
    let path = join(prefix, key);
    match map.get(key) {
        None | Some(Value::Null) => Err(ConfigError::parse(path, "missing required key")),
        Some(value) => convert(value, &path),
    }
}

fn optional<T>(map: &Mapping, key: &str, prefix: &str) -> ConfigResult<Option<T>>
where
    T: DeserializeOwned,
{
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => convert(value, &join(prefix, key)).map(Some),
    }
}

fn key_name(key: &Value, path: &str) -> ConfigResult<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        other => Err(ConfigError::parse(path, format!("expected string key, found {other:?}"))),
    }
}

fn convert_screenshot(value: &Value, path: &str) -> ConfigResult<ScreenshotSpec> {
    let Value::Mapping(map) = value else {
        return Err(ConfigError::parse(path, "expected a mapping"));
    };
    let input_image: String = required(map, "input_image", path)?;
    let output_name: String = required(map, "output_name", path)?;
    let theme: Option<String> = optional(map, "theme", path)?;

    let text_path = join(path, "text");
    let text = match map.get("text") {
        Some(Value::Mapping(text)) => TextContent {
            main_text: required(text, "main_text", &text_path)?,
            sub_text: optional(text, "sub_text", &text_path)?,
        },
        None | Some(Value::Null) => {
            return Err(ConfigError::parse(text_path, "missing required key"));
        }
        Some(_) => return Err(ConfigError::parse(text_path, "expected a mapping of text slots")),
    };

    Ok(ScreenshotSpec {
        input_image,
        output_name,
        theme,
        text,
        main_text_style: optional(map, "main_text_style", path)?,
        sub_text_style: optional(map, "sub_text_style", path)?,
    })
}

fn collect_unknown(
    map: &Mapping,
    known: &[&str],
    prefix: &str,
    allow_stash: bool,
    out: &mut Vec<String>,
) {
    for key in map.keys() {
        let Some(key) = key.as_str() else {
            out.push(join(prefix, &format!("{key:?}")));
            continue;
        };
        // `_name:` keys hold YAML anchors for reuse.
        if allow_stash && key.starts_with('_') {
            continue;
        }
        if !known.contains(&key) {
            out.push(join(prefix, key));
        }
    }
}

fn collect_style_unknown(map: &Mapping, prefix: &str, key: &str, out: &mut Vec<String>) {
    if let Some(Value::Mapping(style)) = map.get(key) {
        collect_unknown(style, TextStyleOverrides::FIELDS, &join(prefix, key), false, out);
    }
}

fn collect_theme_unknown(value: &Value, prefix: &str, out: &mut Vec<String>) {
    let Value::Mapping(map) = value else { return };
    collect_unknown(map, ThemeStyle::FIELDS, prefix, false, out);
    if let Some(Value::Mapping(image)) = map.get("image_style") {
        collect_unknown(image, ImageStyle::FIELDS, &join(prefix, "image_style"), false, out);
    }
    collect_style_unknown(map, prefix, "main_text_style", out);
    collect_style_unknown(map, prefix, "sub_text_style", out);
}

fn collect_screenshot_unknown(value: &Value, prefix: &str, out: &mut Vec<String>) {
    let Value::Mapping(map) = value else { return };
    collect_unknown(map, ScreenshotSpec::FIELDS, prefix, false, out);
    if let Some(Value::Mapping(text)) = map.get("text") {
        collect_unknown(text, TextContent::FIELDS, &join(prefix, "text"), false, out);
    }
    collect_style_unknown(map, prefix, "main_text_style", out);
    collect_style_unknown(map, prefix, "sub_text_style", out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Localized;

    const MINIMAL: &str = r##"
default_language: en
default_theme: standard
screenshots:
  - input_image: "shots/{lang}/home.png"
    output_name: "01_home_{lang}_{width}x{height}"
    text:
      main_text: {en: "Track everything", ja: "すべてを記録"}
"##;

    #[test]
    fn test_minimal_config_defaults() {
        let doc = ScreenshotConfig::from_yaml_str(MINIMAL).unwrap();
        let config = doc.config;
        assert_eq!(config.default_language, "en");
        assert_eq!(config.output_sizes, default_output_sizes());
        assert!(config.theme_styles.is_empty());
        assert!(doc.unknown_keys.is_empty());
        assert_eq!(config.languages_to_generate(None), vec!["en", "ja"]);
        assert_eq!(config.languages_to_generate(Some("ja")), vec!["ja"]);
    }

    #[test]
    fn test_missing_required_key_names_path() {
        let yaml = r##"
default_language: en
default_theme: standard
screenshots:
  - input_image: a.png
    output_name: a
    text: {main_text: {en: A}}
  - input_image: b.png
    text: {main_text: {en: B}}
"##;
        let err = ScreenshotConfig::from_yaml_str(yaml).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, "screenshots[1].output_name"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_theme_required() {
        let yaml = "default_language: en\nscreenshots: []\n";
        let err = ScreenshotConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("default_theme"));
    }

    #[test]
    fn test_wrong_type_names_path() {
        let yaml = r##"
default_language: en
default_theme: standard
theme_styles:
  standard:
    text_area_height: tall
screenshots: []
"##;
        let err = ScreenshotConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("theme_styles.standard"));
    }

    #[test]
    fn test_unknown_keys_reported_and_anchor_stash_ignored() {
        let yaml = r##"
_fonts: &fonts
  ja: "Hiragino Sans"
  en: "Helvetica"
default_language: en
default_theme: standard
colour_scheme: dark
theme_styles:
  standard:
    main_text_style:
      font_family: *fonts
      font_sise: 120
screenshots:
  - input_image: a.png
    output_name: a
    subtitle: nope
    text: {main_text: {en: A}}
"##;
        let doc = ScreenshotConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            doc.unknown_keys,
            vec![
                "colour_scheme".to_string(),
                "theme_styles.standard.main_text_style.font_sise".to_string(),
                "screenshots[0].subtitle".to_string(),
            ]
        );
    }

    #[test]
    fn test_merge_keys_and_aliases() {
        let yaml = r##"
_common: &common
  color: "#1A1A1A"
  shadow: true
default_language: en
default_theme: standard
theme_styles:
  standard:
    main_text_style:
      <<: *common
      font_size: 120
    sub_text_style:
      <<: *common
      color: "#666666"
screenshots: []
"##;
        let doc = ScreenshotConfig::from_yaml_str(yaml).unwrap();
        let theme = &doc.config.theme_styles["standard"];
        let main = theme.main_text_style.as_ref().unwrap();
        let sub = theme.sub_text_style.as_ref().unwrap();
        assert_eq!(main.color, Some(Localized::Uniform("#1A1A1A".to_string())));
        assert_eq!(main.font_size, Some(Localized::Uniform(120)));
        assert_eq!(sub.color, Some(Localized::Uniform("#666666".to_string())));
        assert_eq!(sub.shadow, Some(Localized::Uniform(true)));
        assert!(doc.unknown_keys.is_empty());
    }

    #[test]
    fn test_text_fallback_to_default_language() {
        let doc = ScreenshotConfig::from_yaml_str(MINIMAL).unwrap();
        let text = &doc.config.screenshots[0].text;
        assert_eq!(text.text_for(TextSlot::Main, "de", "en"), Some("Track everything"));
        assert_eq!(text.text_for(TextSlot::Main, "ja", "en"), Some("すべてを記録"));
        assert_eq!(text.text_for(TextSlot::Sub, "en", "en"), None);
    }
}
