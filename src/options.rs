//! Configuration Reference - Static Option Table
//!
//! Backs `--show-options`. Entries are grouped by the section of the YAML
//! document they live in.

use serde::Serialize;
use std::fmt::Write;

use crate::themes::{DEFAULT_BACKGROUND_COLOR, DEFAULT_TEXT_AREA_HEIGHT, PRESET_THEMES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionSection {
    Root,
    Theme,
    ImageStyle,
    TextStyle,
    Screenshot,
}

impl OptionSection {
    pub const ALL: [OptionSection; 5] = [
        OptionSection::Root,
        OptionSection::Theme,
        OptionSection::ImageStyle,
        OptionSection::TextStyle,
        OptionSection::Screenshot,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            OptionSection::Root => "Root level settings",
            OptionSection::Theme => "Theme settings (theme_styles.<theme>)",
            OptionSection::ImageStyle => "Image style (theme_styles.<theme>.image_style)",
            OptionSection::TextStyle => "Text style (main_text_style / sub_text_style)",
            OptionSection::Screenshot => "Screenshot entries (screenshots[])",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigOption {
    pub section: OptionSection,
    pub key: &'static str,
    pub value_type: &'static str,
    pub default: Option<&'static str>,
    pub required: bool,
    pub description: &'static str,
}

const fn opt(
    section: OptionSection,
    key: &'static str,
    value_type: &'static str,
    default: Option<&'static str>,
    required: bool,
    description: &'static str,
) -> ConfigOption {
    ConfigOption { section, key, value_type, default, required, description }
}

use OptionSection::{ImageStyle, Root, Screenshot, TextStyle, Theme};

#[rustfmt::skip]
pub const CONFIG_OPTIONS: &[ConfigOption] = &[
    opt(Root, "default_language", "string", None, true, "Language used when a text or style has no entry for the target language"),
    opt(Root, "default_theme", "string", None, true, "Theme for screenshots without `theme`; its theme_styles entry is the global style layer"),
    opt(Root, "languages", "list[string]", None, false, "Languages to render; defaults to every language found in main_text"),
    opt(Root, "output_sizes", "list[[width, height]]", Some("[[1320, 2868], [2064, 2752]]"), false, "Canvas sizes rendered for every screenshot and language"),
    opt(Root, "theme_styles", "map[string, Theme]", None, false, "Per-theme customisation; keys that are not presets declare custom themes"),
    opt(Root, "font_dirs", "list[path]", Some("[]"), false, "Extra directories scanned for .ttf/.otf/.ttc files, relative to the config file"),
    opt(Root, "fallback_font", "string", None, false, "Family or font file tried when a requested family is not installed"),
    opt(Root, "screenshots", "list[Screenshot]", None, true, "Screenshots to generate"),
    opt(Theme, "text_layout", "standard | inverted", Some("standard"), false, "Custom themes only: which text sits on top"),
    opt(Theme, "text_area_height", "int", Some("400"), false, "Height in pixels of the text band at the top of the canvas"),
    opt(Theme, "background_color", "color", Some("#F5F5F5"), false, "Canvas background as #RRGGBB or #RRGGBBAA"),
    opt(Theme, "image_style", "ImageStyle", None, false, "Screenshot placement and corner shape"),
    opt(Theme, "main_text_style", "TextStyle", None, false, "Style of the main text"),
    opt(Theme, "sub_text_style", "TextStyle", None, false, "Style of the sub text"),
    opt(ImageStyle, "corner_radius", "int | list[int]", Some("0"), false, "Squircle corner radius; a list gives top-left, top-right, bottom-right, bottom-left"),
    opt(ImageStyle, "padding", "int | list[int]", Some("0"), false, "Space around the screenshot below the text band, CSS order"),
    opt(TextStyle, "font_family", "string | map", Some("Arial"), false, "Family name or font file path"),
    opt(TextStyle, "font_style", "normal | italic | oblique", Some("normal"), false, "Face style"),
    opt(TextStyle, "font_weight", "int | name", Some("400"), false, "100-900 or a name such as bold, semibold, light"),
    opt(TextStyle, "font_size", "int | map", Some("96"), false, "Font size in pixels"),
    opt(TextStyle, "color", "color | map", Some("#FFFFFF"), false, "Text colour"),
    opt(TextStyle, "offset", "[x, y] | map", Some("[0, 0]"), false, "Shift from the automatic anchor"),
    opt(TextStyle, "position", "[x, y] | map", None, false, "Explicit top-left of the text; replaces the automatic anchor"),
    opt(TextStyle, "shadow", "bool | map", Some("false"), false, "Draw a drop shadow"),
    opt(TextStyle, "shadow_color", "color | map", Some("#000000"), false, "Shadow colour"),
    opt(TextStyle, "shadow_offset", "[x, y] | map", Some("[2, 2]"), false, "Shadow displacement"),
    opt(TextStyle, "shadow_blur", "int | map", Some("4"), false, "Shadow blur radius; sigma is half of it"),
    opt(Screenshot, "input_image", "path template", None, true, "Source screenshot; may use {lang}, {width}, {height}"),
    opt(Screenshot, "output_name", "name template", None, true, "Output file name under the output directory; .png is appended"),
    opt(Screenshot, "theme", "string", None, false, "Theme for this screenshot"),
    opt(Screenshot, "text.main_text", "map[lang, string]", None, true, "Main text per language; must include the default language"),
    opt(Screenshot, "text.sub_text", "map[lang, string]", None, false, "Sub text per language"),
    opt(Screenshot, "main_text_style", "TextStyle", None, false, "Top style layer for the main text of this screenshot"),
    opt(Screenshot, "sub_text_style", "TextStyle", None, false, "Top style layer for the sub text of this screenshot"),
];

/// Human-readable listing of every option, grouped by section.
pub fn render_options() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "appscreenshots configuration options");
    let _ = writeln!(out);

    for section in OptionSection::ALL {
        let _ = writeln!(out, "## {}", section.title());
        for option in CONFIG_OPTIONS.iter().filter(|o| o.section == section) {
            let default = option.default.unwrap_or("none");
            let required = if option.required { "required" } else { "optional" };
            let _ = writeln!(out, "  {}", option.key);
            let _ = writeln!(
                out,
                "    type: {} | default: {} | {}",
                option.value_type, default, required
            );
            let _ = writeln!(out, "    {}", option.description);
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Preset themes");
    for preset in PRESET_THEMES {
        let _ = writeln!(out, "  {:<18} {}", preset.name, preset.description);
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Theme defaults: text_area_height {DEFAULT_TEXT_AREA_HEIGHT}, \
         background_color {DEFAULT_BACKGROUND_COLOR}"
    );
    let _ = writeln!(out, "Placeholders: {{lang}}, {{width}}, {{height}}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImageStyle as ImageStyleConfig, ScreenshotSpec, ThemeStyle};
    use crate::style::TextStyleOverrides;

    fn keys(section: OptionSection) -> Vec<&'static str> {
        CONFIG_OPTIONS.iter().filter(|o| o.section == section).map(|o| o.key).collect()
    }

    #[test]
    fn test_table_covers_schema() {
        assert_eq!(keys(OptionSection::Theme), ThemeStyle::FIELDS);
        assert_eq!(keys(OptionSection::ImageStyle), ImageStyleConfig::FIELDS);
        assert_eq!(keys(OptionSection::TextStyle), TextStyleOverrides::FIELDS);
        for field in ScreenshotSpec::FIELDS.iter().filter(|f| **f != "text") {
            assert!(keys(OptionSection::Screenshot).contains(field), "missing {field}");
        }
    }

    #[test]
    fn test_required_root_keys() {
        let required: Vec<_> = CONFIG_OPTIONS
            .iter()
            .filter(|o| o.section == OptionSection::Root && o.required)
            .map(|o| o.key)
            .collect();
        assert_eq!(required, vec!["default_language", "default_theme", "screenshots"]);
    }

    #[test]
    fn test_render_options_lists_everything() {
        let text = render_options();
        for option in CONFIG_OPTIONS {
            assert!(text.contains(option.key), "missing {}", option.key);
        }
        assert!(text.contains("standard_inverted"));
        assert!(text.contains("{lang}"));
    }
}
