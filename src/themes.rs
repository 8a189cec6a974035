//! Theme System - Presets, Custom Themes, Layered Resolution
//!
//! Styling resolves through fixed layers so a theme never needs `if/else`
//! handling at call sites: built-in default, the default theme's
//! customisation, the named theme's customisation, then the screenshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::{ScreenshotConfig, ScreenshotSpec, ThemeStyle};
use crate::style::{Corners, Edges, ResolvedTextStyle, TextStyle};

pub const DEFAULT_TEXT_AREA_HEIGHT: u32 = 400;
pub const DEFAULT_BACKGROUND_COLOR: &str = "#F5F5F5";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ThemeError {
    #[error("Unknown theme '{name}'. Available: {available}")]
    Unknown { name: String, available: String },
}

/// Where the main and sub text sit in the text band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextLayout {
    /// Main text on top, sub text below.
    #[default]
    Standard,
    /// Sub text on top, main text below.
    Inverted,
}

/// Where a theme definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeOrigin {
    /// Built into the tool
    Preset,
    /// Declared by a `theme_styles` key that is not a preset
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSlot {
    Main,
    Sub,
}

impl TextSlot {
    pub const ALL: [TextSlot; 2] = [TextSlot::Main, TextSlot::Sub];

    /// Key under `text:`.
    pub fn key(&self) -> &'static str {
        match self {
            TextSlot::Main => "main_text",
            TextSlot::Sub => "sub_text",
        }
    }

    /// Key of the matching style block.
    pub fn style_key(&self) -> &'static str {
        match self {
            TextSlot::Main => "main_text_style",
            TextSlot::Sub => "sub_text_style",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeDefinition {
    pub name: String,
    pub layout: TextLayout,
    pub origin: ThemeOrigin,
    pub description: String,
}

pub struct PresetTheme {
    pub name: &'static str,
    pub layout: TextLayout,
    pub description: &'static str,
}

pub const PRESET_THEMES: &[PresetTheme] = &[
    PresetTheme {
        name: "standard",
        layout: TextLayout::Standard,
        description: "Main text on top, sub text below",
    },
    PresetTheme {
        name: "standard_inverted",
        layout: TextLayout::Inverted,
        description: "Sub text on top, main text below",
    },
];

pub fn is_preset(name: &str) -> bool {
    PRESET_THEMES.iter().any(|p| p.name == name)
}

/// Theme registry - presets plus custom themes declared in `theme_styles`
pub struct ThemeRegistry {
    themes: BTreeMap<String, ThemeDefinition>,
}

impl ThemeRegistry {
    pub fn presets() -> Self {
        let themes = PRESET_THEMES
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    ThemeDefinition {
                        name: p.name.to_string(),
                        layout: p.layout,
                        origin: ThemeOrigin::Preset,
                        description: p.description.to_string(),
                    },
                )
            })
            .collect();
        Self { themes }
    }

    pub fn from_config(config: &ScreenshotConfig) -> Self {
        let mut registry = Self::presets();
        for (name, style) in &config.theme_styles {
            if registry.themes.contains_key(name) {
                continue;
            }
            registry.register(ThemeDefinition {
                name: name.clone(),
                layout: style.text_layout.unwrap_or_default(),
                origin: ThemeOrigin::Custom,
                description: "Custom theme".to_string(),
            });
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&ThemeDefinition> {
        self.themes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    pub fn list(&self) -> Vec<&ThemeDefinition> {
        self.themes.values().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.themes.keys().map(String::as_str).collect()
    }

    pub fn register(&mut self, theme: ThemeDefinition) {
        self.themes.insert(theme.name.clone(), theme);
    }

    fn unknown(&self, name: &str) -> ThemeError {
        ThemeError::Unknown {
            name: name.to_string(),
            available: self.names().join(", "),
        }
    }
}

/// Everything about the canvas a theme controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasStyle {
    pub layout: TextLayout,
    pub text_area_height: u32,
    pub background_color: String,
    pub padding: Edges,
    pub corner_radius: Corners,
}

impl Default for CanvasStyle {
    fn default() -> Self {
        Self {
            layout: TextLayout::Standard,
            text_area_height: DEFAULT_TEXT_AREA_HEIGHT,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            padding: Edges::default(),
            corner_radius: Corners::default(),
        }
    }
}

impl CanvasStyle {
    fn apply(&mut self, layer: &ThemeStyle) {
        if let Some(h) = layer.text_area_height {
            self.text_area_height = h;
        }
        if let Some(bg) = &layer.background_color {
            self.background_color = bg.clone();
        }
        if let Some(image) = &layer.image_style {
            if let Some(padding) = &image.padding {
                self.padding = padding.as_edges();
            }
            if let Some(radius) = &image.corner_radius {
                self.corner_radius = radius.as_corners();
            }
        }
    }
}

/// Resolves styles against a read-only configuration.
pub struct ThemeResolver<'a> {
    config: &'a ScreenshotConfig,
    registry: ThemeRegistry,
    base: TextStyle,
}

impl<'a> ThemeResolver<'a> {
    pub fn new(config: &'a ScreenshotConfig) -> Self {
        Self {
            config,
            registry: ThemeRegistry::from_config(config),
            base: TextStyle::default(),
        }
    }

    pub fn registry(&self) -> &ThemeRegistry {
        &self.registry
    }

    /// Name of the theme that applies, validated against the registry.
    pub fn theme_name<'n>(&'n self, theme: Option<&'n str>) -> Result<&'n str, ThemeError> {
        let name = theme.unwrap_or(self.config.default_theme.as_str());
        if self.registry.contains(name) {
            Ok(name)
        } else {
            Err(self.registry.unknown(name))
        }
    }

    /// Theme customisation layers, lowest first.
    fn layers(&self, theme: Option<&str>) -> Result<Vec<&'a ThemeStyle>, ThemeError> {
        let name = self.theme_name(theme)?.to_string();
        let default_name = self.config.default_theme.as_str();
        if !self.registry.contains(default_name) {
            return Err(self.registry.unknown(default_name));
        }

        let mut layers = vec![];
        if let Some(global) = self.config.theme_styles.get(default_name) {
            layers.push(global);
        }
        if name != default_name {
            if let Some(named) = self.config.theme_styles.get(&name) {
                layers.push(named);
            }
        }
        Ok(layers)
    }

    /// Built-in default, then `theme_styles[default_theme]`, then `theme_styles[theme]`.
    pub fn resolve(
        &self,
        theme: Option<&str>,
        slot: TextSlot,
    ) -> Result<ResolvedTextStyle, ThemeError> {
        let mut resolved = ResolvedTextStyle::from_base(&self.base);
        for layer in self.layers(theme)? {
            if let Some(overrides) = layer.text_style(slot) {
                resolved.apply(overrides);
            }
        }
        Ok(resolved)
    }

    /// Theme resolution plus the screenshot's own style block on top.
    pub fn resolve_for_screenshot(
        &self,
        spec: &ScreenshotSpec,
        slot: TextSlot,
    ) -> Result<ResolvedTextStyle, ThemeError> {
        let mut resolved = self.resolve(spec.theme.as_deref(), slot)?;
        if let Some(overrides) = spec.text_style(slot) {
            resolved.apply(overrides);
        }
        Ok(resolved)
    }

    pub fn resolve_canvas(&self, theme: Option<&str>) -> Result<CanvasStyle, ThemeError> {
        let name = self.theme_name(theme)?;
        let mut canvas = CanvasStyle {
            layout: self.registry.get(name).map(|t| t.layout).unwrap_or_default(),
            ..CanvasStyle::default()
        };
        for layer in self.layers(theme)? {
            canvas.apply(layer);
        }
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreenshotConfig;

    fn config(yaml: &str) -> ScreenshotConfig {
        ScreenshotConfig::from_yaml_str(yaml).unwrap().config
    }

    const THEMED: &str = r##"
default_language: en
default_theme: standard
theme_styles:
  standard:
    background_color: "#101010"
    main_text_style:
      font_size: 120
      font_family: {en: "Helvetica", ja: "Hiragino Sans"}
  standard_inverted:
    text_area_height: 500
    main_text_style:
      color: "#FF0000"
      font_family: {ja: "Noto Sans JP"}
  brand:
    text_layout: inverted
    sub_text_style:
      font_size: 48
screenshots:
  - input_image: a.png
    output_name: a_{lang}
    text: {main_text: {en: A}}
    main_text_style:
      font_weight: bold
"##;

    #[test]
    fn test_registry_contains_presets_and_custom() {
        let config = config(THEMED);
        let registry = ThemeRegistry::from_config(&config);
        assert_eq!(registry.get("standard").unwrap().origin, ThemeOrigin::Preset);
        let brand = registry.get("brand").unwrap();
        assert_eq!(brand.origin, ThemeOrigin::Custom);
        assert_eq!(brand.layout, TextLayout::Inverted);
        assert!(!registry.contains("nonexistent"));
    }

    #[test]
    fn test_no_theme_resolves_to_global_values() {
        let config = config(THEMED);
        let resolver = ThemeResolver::new(&config);
        let style = resolver.resolve(None, TextSlot::Main).unwrap().for_language("en", "en");
        assert_eq!(style.font_size, 120);
        assert_eq!(style.font_family, "Helvetica");
        assert_eq!(style.color, TextStyle::default().color);
    }

    #[test]
    fn test_named_theme_overrides_field_by_field() {
        let config = config(THEMED);
        let resolver = ThemeResolver::new(&config);
        let resolved = resolver.resolve(Some("standard_inverted"), TextSlot::Main).unwrap();

        let ja = resolved.for_language("ja", "en");
        assert_eq!(ja.font_family, "Noto Sans JP");
        assert_eq!(ja.color, "#FF0000");
        assert_eq!(ja.font_size, 120);

        let en = resolved.for_language("en", "en");
        assert_eq!(en.font_family, "Helvetica");
    }

    #[test]
    fn test_resolution_is_idempotent_and_total() {
        let config = config(THEMED);
        let resolver = ThemeResolver::new(&config);
        let a = resolver.resolve(Some("brand"), TextSlot::Sub).unwrap();
        let b = resolver.resolve(Some("brand"), TextSlot::Sub).unwrap();
        assert_eq!(a, b);

        let style = a.for_language("fr", "en");
        assert_eq!(style.font_size, 48);
        assert_eq!(style.font_family, "Arial");
        assert_eq!(style.shadow_offset, (2, 2));
    }

    #[test]
    fn test_screenshot_style_is_top_layer() {
        let config = config(THEMED);
        let resolver = ThemeResolver::new(&config);
        let spec = &config.screenshots[0];
        let style = resolver
            .resolve_for_screenshot(spec, TextSlot::Main)
            .unwrap()
            .for_language("en", "en");
        assert_eq!(style.font_weight, 700);
        assert_eq!(style.font_size, 120);
    }

    #[test]
    fn test_unknown_theme_error() {
        let config = config(THEMED);
        let resolver = ThemeResolver::new(&config);
        let err = resolver.resolve(Some("nonexistent"), TextSlot::Main).unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
        assert!(resolver.resolve_canvas(Some("nonexistent")).is_err());
    }

    #[test]
    fn test_canvas_layers() {
        let config = config(THEMED);
        let resolver = ThemeResolver::new(&config);

        let standard = resolver.resolve_canvas(None).unwrap();
        assert_eq!(standard.layout, TextLayout::Standard);
        assert_eq!(standard.background_color, "#101010");
        assert_eq!(standard.text_area_height, DEFAULT_TEXT_AREA_HEIGHT);

        let inverted = resolver.resolve_canvas(Some("standard_inverted")).unwrap();
        assert_eq!(inverted.layout, TextLayout::Inverted);
        assert_eq!(inverted.text_area_height, 500);
        assert_eq!(inverted.background_color, "#101010");
    }
}
