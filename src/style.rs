//! Style Model - Localized Values and Layered Overrides
//!
//! Every style field may be written once for all languages or as a map keyed
//! by language code. Layers are partial; a resolved style is total.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A value given once, or per language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Localized<T> {
    Uniform(T),
    PerLanguage(BTreeMap<String, T>),
}

impl<T> Localized<T> {
    /// Iterate every concrete value, regardless of language.
    pub fn values(&self) -> Vec<&T> {
        match self {
            Localized::Uniform(v) => vec![v],
            Localized::PerLanguage(map) => map.values().collect(),
        }
    }
}

/// A resolved field: a base value plus per-language overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredValue<T> {
    pub base: T,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub by_language: BTreeMap<String, T>,
}

impl<T: Clone> LayeredValue<T> {
    pub fn new(base: T) -> Self {
        Self { base, by_language: BTreeMap::new() }
    }

    /// Apply one layer. A uniform value replaces everything below it;
    /// a per-language map is merged key by key.
    pub fn apply<U>(&mut self, layer: &Localized<U>, convert: impl Fn(&U) -> T) {
        match layer {
            Localized::Uniform(v) => {
                self.base = convert(v);
                self.by_language.clear();
            }
            Localized::PerLanguage(map) => {
                for (lang, v) in map {
                    self.by_language.insert(lang.clone(), convert(v));
                }
            }
        }
    }

    /// Language value, then default-language value, then base.
    pub fn get(&self, language: &str, default_language: &str) -> &T {
        self.by_language
            .get(language)
            .or_else(|| self.by_language.get(default_language))
            .unwrap_or(&self.base)
    }
}

/// Font weight as written in YAML: a name or an OpenType number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    Numeric(u16),
    Named(String),
}

impl FontWeight {
    /// Map to the OpenType 100-900 scale. Unknown names read as regular.
    pub fn value(&self) -> u16 {
        match self {
            FontWeight::Numeric(n) => *n,
            FontWeight::Named(name) => weight_from_name(name).unwrap_or(400),
        }
    }
}

pub fn weight_from_name(name: &str) -> Option<u16> {
    let key: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let value = match key.as_str() {
        "thin" | "hairline" => 100,
        "ultralight" | "extralight" => 200,
        "light" => 300,
        "normal" | "regular" | "book" => 400,
        "medium" => 500,
        "semibold" | "demibold" => 600,
        "bold" => 700,
        "extrabold" | "ultrabold" => 800,
        "black" | "heavy" => 900,
        _ => return None,
    };
    Some(value)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

/// Partial text style: one layer of overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyleOverrides {
    #[serde(default)]
    pub font_family: Option<Localized<String>>,
    #[serde(default)]
    pub font_style: Option<Localized<FontStyle>>,
    #[serde(default)]
    pub font_weight: Option<Localized<FontWeight>>,
    #[serde(default)]
    pub font_size: Option<Localized<u32>>,
    #[serde(default)]
    pub color: Option<Localized<String>>,
    #[serde(default)]
    pub offset: Option<Localized<(i32, i32)>>,
    #[serde(default)]
    pub position: Option<Localized<(i32, i32)>>,
    #[serde(default)]
    pub shadow: Option<Localized<bool>>,
    #[serde(default)]
    pub shadow_color: Option<Localized<String>>,
    #[serde(default)]
    pub shadow_offset: Option<Localized<(i32, i32)>>,
    #[serde(default)]
    pub shadow_blur: Option<Localized<u32>>,
}

impl TextStyleOverrides {
    pub const FIELDS: &'static [&'static str] = &[
        "font_family",
        "font_style",
        "font_weight",
        "font_size",
        "color",
        "offset",
        "position",
        "shadow",
        "shadow_color",
        "shadow_offset",
        "shadow_blur",
    ];

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Every colour string mentioned by this layer.
    pub fn colors(&self) -> Vec<&String> {
        let mut out = vec![];
        if let Some(c) = &self.color {
            out.extend(c.values());
        }
        if let Some(c) = &self.shadow_color {
            out.extend(c.values());
        }
        out
    }
}

/// Concrete style for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_family: String,
    pub font_style: FontStyle,
    pub font_weight: u16,
    pub font_size: u32,
    pub color: String,
    pub offset: (i32, i32),
    pub position: Option<(i32, i32)>,
    pub shadow: bool,
    pub shadow_color: String,
    pub shadow_offset: (i32, i32),
    pub shadow_blur: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_style: FontStyle::Normal,
            font_weight: 400,
            font_size: 96,
            color: "#FFFFFF".to_string(),
            offset: (0, 0),
            position: None,
            shadow: false,
            shadow_color: "#000000".to_string(),
            shadow_offset: (2, 2),
            shadow_blur: 4,
        }
    }
}

/// Total, language-indexed style produced by merging layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTextStyle {
    pub font_family: LayeredValue<String>,
    pub font_style: LayeredValue<FontStyle>,
    pub font_weight: LayeredValue<u16>,
    pub font_size: LayeredValue<u32>,
    pub color: LayeredValue<String>,
    pub offset: LayeredValue<(i32, i32)>,
    pub position: LayeredValue<Option<(i32, i32)>>,
    pub shadow: LayeredValue<bool>,
    pub shadow_color: LayeredValue<String>,
    pub shadow_offset: LayeredValue<(i32, i32)>,
    pub shadow_blur: LayeredValue<u32>,
}

impl Default for ResolvedTextStyle {
    fn default() -> Self {
        Self::from_base(&TextStyle::default())
    }
}

impl ResolvedTextStyle {
    pub fn from_base(base: &TextStyle) -> Self {
        Self {
            font_family: LayeredValue::new(base.font_family.clone()),
            font_style: LayeredValue::new(base.font_style),
            font_weight: LayeredValue::new(base.font_weight),
            font_size: LayeredValue::new(base.font_size),
            color: LayeredValue::new(base.color.clone()),
            offset: LayeredValue::new(base.offset),
            position: LayeredValue::new(base.position),
            shadow: LayeredValue::new(base.shadow),
            shadow_color: LayeredValue::new(base.shadow_color.clone()),
            shadow_offset: LayeredValue::new(base.shadow_offset),
            shadow_blur: LayeredValue::new(base.shadow_blur),
        }
    }

    /// Merge one partial layer on top; present fields win.
    pub fn apply(&mut self, layer: &TextStyleOverrides) {
        if let Some(v) = &layer.font_family {
            self.font_family.apply(v, Clone::clone);
        }
        if let Some(v) = &layer.font_style {
            self.font_style.apply(v, |s| *s);
        }
        if let Some(v) = &layer.font_weight {
            self.font_weight.apply(v, FontWeight::value);
        }
        if let Some(v) = &layer.font_size {
            self.font_size.apply(v, |s| *s);
        }
        if let Some(v) = &layer.color {
            self.color.apply(v, Clone::clone);
        }
        if let Some(v) = &layer.offset {
            self.offset.apply(v, |o| *o);
        }
        if let Some(v) = &layer.position {
            self.position.apply(v, |p| Some(*p));
        }
        if let Some(v) = &layer.shadow {
            self.shadow.apply(v, |s| *s);
        }
        if let Some(v) = &layer.shadow_color {
            self.shadow_color.apply(v, Clone::clone);
        }
        if let Some(v) = &layer.shadow_offset {
            self.shadow_offset.apply(v, |o| *o);
        }
        if let Some(v) = &layer.shadow_blur {
            self.shadow_blur.apply(v, |b| *b);
        }
    }

    pub fn for_language(&self, language: &str, default_language: &str) -> TextStyle {
        TextStyle {
            font_family: self.font_family.get(language, default_language).clone(),
            font_style: *self.font_style.get(language, default_language),
            font_weight: *self.font_weight.get(language, default_language),
            font_size: *self.font_size.get(language, default_language),
            color: self.color.get(language, default_language).clone(),
            offset: *self.offset.get(language, default_language),
            position: *self.position.get(language, default_language),
            shadow: *self.shadow.get(language, default_language),
            shadow_color: self.shadow_color.get(language, default_language).clone(),
            shadow_offset: *self.shadow_offset.get(language, default_language),
            shadow_blur: *self.shadow_blur.get(language, default_language),
        }
    }
}

/// One value for all sides/corners, or a CSS-like list of 1-4 values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Spacing {
    Uniform(u32),
    List(Vec<u32>),
}

impl Spacing {
    pub fn values(&self) -> &[u32] {
        match self {
            Spacing::Uniform(v) => std::slice::from_ref(v),
            Spacing::List(values) => values,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        match self {
            Spacing::Uniform(_) => true,
            Spacing::List(values) => (1..=4).contains(&values.len()),
        }
    }

    /// (top, right, bottom, left), CSS order.
    pub fn as_edges(&self) -> Edges {
        match self {
            Spacing::Uniform(v) => Edges::uniform(*v),
            Spacing::List(v) => match v.as_slice() {
                [a, b] => Edges { top: *a, right: *b, bottom: *a, left: *b },
                [t, h, b] => Edges { top: *t, right: *h, bottom: *b, left: *h },
                [t, r, b, l] => Edges { top: *t, right: *r, bottom: *b, left: *l },
                other => Edges::uniform(other.first().copied().unwrap_or(0)),
            },
        }
    }

    /// (top-left, top-right, bottom-right, bottom-left); two values pair diagonals.
    pub fn as_corners(&self) -> Corners {
        match self {
            Spacing::Uniform(v) => Corners::uniform(*v),
            Spacing::List(v) => match v.as_slice() {
                [a, b] => Corners {
                    top_left: *a,
                    top_right: *b,
                    bottom_right: *a,
                    bottom_left: *b,
                },
                [tl, d, br] => Corners {
                    top_left: *tl,
                    top_right: *d,
                    bottom_right: *br,
                    bottom_left: *d,
                },
                [tl, tr, br, bl] => Corners {
                    top_left: *tl,
                    top_right: *tr,
                    bottom_right: *br,
                    bottom_left: *bl,
                },
                other => Corners::uniform(other.first().copied().unwrap_or(0)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edges {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Edges {
    pub fn uniform(v: u32) -> Self {
        Self { top: v, right: v, bottom: v, left: v }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corners {
    pub top_left: u32,
    pub top_right: u32,
    pub bottom_right: u32,
    pub bottom_left: u32,
}

impl Corners {
    pub fn uniform(v: u32) -> Self {
        Self { top_left: v, top_right: v, bottom_right: v, bottom_left: v }
    }

    pub fn is_zero(&self) -> bool {
        self.top_left == 0 && self.top_right == 0 && self.bottom_right == 0 && self.bottom_left == 0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid color '{0}': expected #RRGGBB or #RRGGBBAA")]
pub struct ColorError(pub String);

/// Parse `#RRGGBB` / `#RRGGBBAA` (leading `#` optional) into RGBA.
pub fn parse_color(color: &str) -> Result<[u8; 4], ColorError> {
    let hex = color.trim().trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ColorError(color.to_string()));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColorError(color.to_string()))
    };
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok([channel(0)?, channel(2)?, channel(4)?, alpha])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#FF8000").unwrap(), [255, 128, 0, 255]);
        assert_eq!(parse_color("00000080").unwrap(), [0, 0, 0, 128]);
        assert!(parse_color("#FFF").is_err());
        assert!(parse_color("#GG0000").is_err());
    }

    #[test]
    fn test_layered_value_lookup_order() {
        let mut v = LayeredValue::new("Arial".to_string());
        let mut fonts = BTreeMap::new();
        fonts.insert("ja".to_string(), "Hiragino Sans".to_string());
        fonts.insert("en".to_string(), "Helvetica".to_string());
        v.apply(&Localized::PerLanguage(fonts), Clone::clone);

        assert_eq!(v.get("ja", "en"), "Hiragino Sans");
        assert_eq!(v.get("de", "en"), "Helvetica");
        assert_eq!(v.get("de", "fr"), "Arial");
    }

    #[test]
    fn test_uniform_layer_replaces_language_map() {
        let mut v = LayeredValue::new(96u32);
        let mut sizes = BTreeMap::new();
        sizes.insert("ja".to_string(), 100);
        v.apply(&Localized::PerLanguage(sizes), |s| *s);
        v.apply(&Localized::Uniform(120), |s| *s);

        assert_eq!(*v.get("ja", "en"), 120);
        assert!(v.by_language.is_empty());
    }

    #[test]
    fn test_weight_names() {
        assert_eq!(FontWeight::Named("Bold".into()).value(), 700);
        assert_eq!(FontWeight::Named("semi-bold".into()).value(), 600);
        assert_eq!(FontWeight::Named("mystery".into()).value(), 400);
        assert_eq!(FontWeight::Numeric(300).value(), 300);
    }

    #[test]
    fn test_spacing_expansion() {
        assert_eq!(
            Spacing::List(vec![10, 20]).as_edges(),
            Edges { top: 10, right: 20, bottom: 10, left: 20 }
        );
        assert_eq!(
            Spacing::List(vec![1, 2, 3]).as_edges(),
            Edges { top: 1, right: 2, bottom: 3, left: 2 }
        );
        assert_eq!(
            Spacing::List(vec![40, 10]).as_corners(),
            Corners { top_left: 40, top_right: 10, bottom_right: 40, bottom_left: 10 }
        );
        assert!(!Spacing::List(vec![]).is_well_formed());
        assert_eq!(Spacing::List(vec![]).as_edges(), Edges::uniform(0));
    }

    #[test]
    fn test_resolution_is_total() {
        let resolved = ResolvedTextStyle::default();
        assert_eq!(resolved.for_language("en", "en"), TextStyle::default());
    }
}
