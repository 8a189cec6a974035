//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured issues against a loaded configuration.
//! The caller decides policy: any `error` aborts before rendering.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::{ConfigDocument, ScreenshotConfig};
use crate::placeholders::{self, expand, output_file_name};
use crate::style::{parse_color, weight_from_name, FontWeight, Spacing, TextStyleOverrides};
use crate::themes::{is_preset, TextLayout, TextSlot, ThemeRegistry};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub rule: String,
    /// Key path in the configuration, e.g. `screenshots[0].theme`.
    pub path: String,
    pub severity: ViolationSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == ViolationSeverity::Error)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.with_severity(ViolationSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.with_severity(ViolationSeverity::Warning)
    }

    pub fn at_path<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues.iter().filter(move |i| i.path == path)
    }

    fn with_severity(&self, severity: ViolationSeverity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }
}

/// Everything a rule may look at. Read-only.
pub struct ValidationContext<'a> {
    pub config: &'a ScreenshotConfig,
    pub base_dir: &'a Path,
    /// Languages that will actually be rendered.
    pub languages: Vec<String>,
    pub registry: ThemeRegistry,
}

/// Validation rule trait - produces issues
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue>;

    fn issue(
        &self,
        path: impl Into<String>,
        severity: ViolationSeverity,
        message: impl Into<String>,
    ) -> ValidationIssue
    where
        Self: Sized,
    {
        ValidationIssue {
            rule: self.name().to_string(),
            path: path.into(),
            severity,
            message: message.into(),
        }
    }
}

// --- Concrete Rules ---

pub struct ThemeReferenceRule;

impl ValidationRule for ThemeReferenceRule {
    fn name(&self) -> &'static str { "theme_reference" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let available = ctx.registry.names().join(", ");
        let mut issues = vec![];

        if !ctx.registry.contains(&ctx.config.default_theme) {
            issues.push(self.issue(
                "default_theme",
                ViolationSeverity::Error,
                format!("Unknown theme '{}'. Available: {available}", ctx.config.default_theme),
            ));
        }
        for (i, spec) in ctx.config.screenshots.iter().enumerate() {
            if let Some(theme) = &spec.theme {
                if !ctx.registry.contains(theme) {
                    issues.push(self.issue(
                        format!("screenshots[{i}].theme"),
                        ViolationSeverity::Error,
                        format!("Unknown theme '{theme}'. Available: {available}"),
                    ));
                }
            }
        }
        issues
    }
}

pub struct DefaultLanguageTextRule;

impl ValidationRule for DefaultLanguageTextRule {
    fn name(&self) -> &'static str { "default_language_text" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let default = &ctx.config.default_language;
        let mut issues = vec![];

        for (i, spec) in ctx.config.screenshots.iter().enumerate() {
            let main_path = format!("screenshots[{i}].text.main_text");
            if spec.text.main_text.is_empty() {
                let message = "main_text has no languages";
                issues.push(self.issue(main_path, ViolationSeverity::Error, message));
            } else if !spec.text.main_text.contains_key(default) {
                issues.push(self.issue(
                    main_path,
                    ViolationSeverity::Error,
                    format!("main_text has no text for default language '{default}'"),
                ));
            }

            if let Some(sub) = &spec.text.sub_text {
                if !sub.contains_key(default) {
                    issues.push(self.issue(
                        format!("screenshots[{i}].text.sub_text"),
                        ViolationSeverity::Error,
                        format!("sub_text has no text for default language '{default}'"),
                    ));
                }
            }
        }
        issues
    }
}

pub struct PlaceholderRule;

impl ValidationRule for PlaceholderRule {
    fn name(&self) -> &'static str { "placeholders" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let mut issues = vec![];
        for (i, spec) in ctx.config.screenshots.iter().enumerate() {
            let templates =
                [("input_image", &spec.input_image), ("output_name", &spec.output_name)];
            for (key, template) in templates {
                if let Err(e) = placeholders::check(template) {
                    let path = format!("screenshots[{i}].{key}");
                    issues.push(self.issue(path, ViolationSeverity::Error, e.to_string()));
                }
            }
        }
        issues
    }
}

pub struct InputAssetRule;

impl ValidationRule for InputAssetRule {
    fn name(&self) -> &'static str { "input_assets" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let default_language = &ctx.config.default_language;
        // The default language is always checked, even when it is not rendered.
        let languages: Vec<&String> = std::iter::once(default_language)
            .chain(ctx.languages.iter().filter(|l| *l != default_language))
            .collect();

        let mut issues = vec![];
        for (i, spec) in ctx.config.screenshots.iter().enumerate() {
            let mut seen = BTreeSet::new();
            for lang in languages.iter().copied() {
                for &(width, height) in &ctx.config.output_sizes {
                    // Unknown tokens are reported by the placeholder rule.
                    let Ok(expanded) = expand(&spec.input_image, lang, width, height) else {
                        continue;
                    };
                    let path = resolve(ctx.base_dir, &expanded);
                    if !seen.insert(path.clone()) || path.is_file() {
                        continue;
                    }
                    let severity = if lang == default_language {
                        ViolationSeverity::Error
                    } else {
                        ViolationSeverity::Warning
                    };
                    issues.push(self.issue(
                        format!("screenshots[{i}].input_image"),
                        severity,
                        format!("Input image not found for '{lang}': {}", path.display()),
                    ));
                }
            }
        }
        issues
    }
}

pub struct UnusedStyleRule;

impl ValidationRule for UnusedStyleRule {
    fn name(&self) -> &'static str { "unused_style" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let any_sub_text = ctx.config.screenshots.iter().any(|s| s.text.sub_text.is_some());
        let mut issues = vec![];

        if !any_sub_text {
            for (name, theme) in &ctx.config.theme_styles {
                if theme.sub_text_style.is_some() {
                    issues.push(self.issue(
                        format!("theme_styles.{name}.sub_text_style"),
                        ViolationSeverity::Warning,
                        "sub_text_style is set but no screenshot defines sub_text",
                    ));
                }
            }
        }
        for (i, spec) in ctx.config.screenshots.iter().enumerate() {
            if spec.sub_text_style.is_some() && spec.text.sub_text.is_none() {
                issues.push(self.issue(
                    format!("screenshots[{i}].sub_text_style"),
                    ViolationSeverity::Warning,
                    "sub_text_style is set but this screenshot has no sub_text",
                ));
            }
        }
        issues
    }
}

pub struct LanguageCoverageRule;

impl ValidationRule for LanguageCoverageRule {
    fn name(&self) -> &'static str { "language_coverage" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let Some(configured) = &ctx.config.languages else {
            return vec![];
        };
        let used: BTreeSet<&String> = ctx
            .config
            .screenshots
            .iter()
            .flat_map(|s| {
                let sub = s.text.sub_text.iter().flat_map(|m| m.keys());
                s.text.main_text.keys().chain(sub)
            })
            .collect();

        let mut issues = vec![];
        for lang in configured {
            if !used.contains(lang) {
                issues.push(self.issue(
                    "languages",
                    ViolationSeverity::Warning,
                    format!(
                        "Language '{lang}' has no text in any screenshot; \
                         default-language text will be used"
                    ),
                ));
            }
        }
        for lang in used {
            if !configured.contains(lang) {
                issues.push(self.issue(
                    "languages",
                    ViolationSeverity::Warning,
                    format!(
                        "Language '{lang}' has text but is not listed in languages \
                         and will not be rendered"
                    ),
                ));
            }
        }
        issues
    }
}

pub struct OutputCollisionRule;

impl ValidationRule for OutputCollisionRule {
    fn name(&self) -> &'static str { "output_collision" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        let mut owners: BTreeMap<String, (usize, String, u32, u32)> = BTreeMap::new();
        let mut reported = BTreeSet::new();
        let mut issues = vec![];

        for (i, spec) in ctx.config.screenshots.iter().enumerate() {
            for lang in &ctx.languages {
                for &(width, height) in &ctx.config.output_sizes {
                    let Ok(name) = output_file_name(&spec.output_name, lang, width, height) else {
                        continue;
                    };
                    match owners.get(&name) {
                        None => {
                            owners.insert(name, (i, lang.clone(), width, height));
                        }
                        Some((j, other_lang, w, h)) => {
                            if reported.insert((i, name.clone())) {
                                issues.push(self.issue(
                                    format!("screenshots[{i}].output_name"),
                                    ViolationSeverity::Error,
                                    format!(
                                        "Output '{name}' ({lang} {width}x{height}) is also \
                                         produced by screenshots[{j}] ({other_lang} {w}x{h})"
                                    ),
                                ));
                            }
                        }
                    }
                }
            }
        }
        issues
    }
}

pub struct StyleValueRule;

impl StyleValueRule {
    fn check_text_style(
        &self,
        style: &TextStyleOverrides,
        path: &str,
        limit: u32,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if style.is_empty() {
            issues.push(self.issue(path, ViolationSeverity::Warning, "Empty style block"));
            return;
        }
        for color in style.colors() {
            if let Err(e) = parse_color(color) {
                issues.push(self.issue(path, ViolationSeverity::Error, e.to_string()));
            }
        }
        if let Some(size) = &style.font_size {
            if size.values().into_iter().any(|s| *s == 0) {
                let key = format!("{path}.font_size");
                issues.push(self.issue(key, ViolationSeverity::Error, "font_size must be > 0"));
            }
        }
        if let Some(weight) = &style.font_weight {
            for w in weight.values() {
                let valid = match w {
                    FontWeight::Numeric(n) => (1..=1000).contains(n),
                    FontWeight::Named(name) => weight_from_name(name).is_some(),
                };
                if !valid {
                    issues.push(self.issue(
                        format!("{path}.font_weight"),
                        ViolationSeverity::Error,
                        format!("Unrecognised font weight {w:?}"),
                    ));
                }
            }
        }

        let points = [
            ("offset", &style.offset),
            ("position", &style.position),
            ("shadow_offset", &style.shadow_offset),
        ];
        for (key, point) in points {
            let Some(point) = point else { continue };
            let outside =
                |(x, y): &(i32, i32)| x.unsigned_abs() > limit || y.unsigned_abs() > limit;
            if point.values().into_iter().any(outside) {
                issues.push(self.out_of_bounds(format!("{path}.{key}"), limit));
            }
        }
        if let Some(blur) = &style.shadow_blur {
            if blur.values().into_iter().any(|b| *b > limit) {
                issues.push(self.out_of_bounds(format!("{path}.shadow_blur"), limit));
            }
        }
    }

    fn check_spacing(
        &self,
        spacing: &Option<Spacing>,
        path: String,
        limit: u32,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let Some(spacing) = spacing else { return };
        if !spacing.is_well_formed() {
            let message = "Expected a number or a list of 1 to 4 numbers";
            issues.push(self.issue(path, ViolationSeverity::Error, message));
        } else if spacing.values().iter().any(|v| *v > limit) {
            issues.push(self.out_of_bounds(path, limit));
        }
    }

    fn out_of_bounds(&self, path: String, limit: u32) -> ValidationIssue {
        let message = format!("Value exceeds the largest output dimension ({limit}px)");
        self.issue(path, ViolationSeverity::Error, message)
    }
}

impl ValidationRule for StyleValueRule {
    fn name(&self) -> &'static str { "style_values" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        // Geometry larger than every canvas can only overflow layout math.
        let sizes = &ctx.config.output_sizes;
        let limit = sizes.iter().map(|&(w, h)| w.max(h)).max().unwrap_or(u32::MAX);
        let mut issues = vec![];

        for (name, theme) in &ctx.config.theme_styles {
            let prefix = format!("theme_styles.{name}");
            if theme.text_area_height.is_some_and(|h| h > limit) {
                issues.push(self.out_of_bounds(format!("{prefix}.text_area_height"), limit));
            }
            if let Some(bg) = &theme.background_color {
                if let Err(e) = parse_color(bg) {
                    let path = format!("{prefix}.background_color");
                    issues.push(self.issue(path, ViolationSeverity::Error, e.to_string()));
                }
            }
            if let Some(image) = &theme.image_style {
                let padding = format!("{prefix}.image_style.padding");
                self.check_spacing(&image.padding, padding, limit, &mut issues);
                let radius = format!("{prefix}.image_style.corner_radius");
                self.check_spacing(&image.corner_radius, radius, limit, &mut issues);
            }
            for slot in TextSlot::ALL {
                if let Some(style) = theme.text_style(slot) {
                    let path = format!("{prefix}.{}", slot.style_key());
                    self.check_text_style(style, &path, limit, &mut issues);
                }
            }
        }

        for (i, spec) in ctx.config.screenshots.iter().enumerate() {
            for slot in TextSlot::ALL {
                if let Some(style) = spec.text_style(slot) {
                    let path = format!("screenshots[{i}].{}", slot.style_key());
                    self.check_text_style(style, &path, limit, &mut issues);
                }
            }
        }
        issues
    }
}

pub struct CustomThemeRule;

impl ValidationRule for CustomThemeRule {
    fn name(&self) -> &'static str { "custom_theme" }

    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<ValidationIssue> {
        ctx.config
            .theme_styles
            .iter()
            .filter(|(name, _)| !is_preset(name))
            .map(|(name, style)| {
                self.issue(
                    format!("theme_styles.{name}"),
                    ViolationSeverity::Info,
                    format!(
                        "Custom theme '{name}' declared (text_layout: {})",
                        match style.text_layout.unwrap_or_default() {
                            TextLayout::Standard => "standard",
                            TextLayout::Inverted => "inverted",
                        }
                    ),
                )
            })
            .collect()
    }
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Validator orchestrates rules. It never fails; it reports.
pub struct Validator {
    base_dir: PathBuf,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            rules: vec![
                Box::new(ThemeReferenceRule),
                Box::new(DefaultLanguageTextRule),
                Box::new(PlaceholderRule),
                Box::new(InputAssetRule),
                Box::new(UnusedStyleRule),
                Box::new(LanguageCoverageRule),
                Box::new(OutputCollisionRule),
                Box::new(StyleValueRule),
                Box::new(CustomThemeRule),
            ],
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate(&self, config: &ScreenshotConfig) -> ValidationReport {
        self.validate_for(config, None)
    }

    /// Validate only what rendering `language` (or every language) would touch.
    pub fn validate_for(
        &self,
        config: &ScreenshotConfig,
        language: Option<&str>,
    ) -> ValidationReport {
        let ctx = ValidationContext {
            config,
            base_dir: &self.base_dir,
            languages: config.languages_to_generate(language),
            registry: ThemeRegistry::from_config(config),
        };

        let mut issues = vec![];
        for rule in &self.rules {
            issues.extend(rule.validate(&ctx));
        }
        ValidationReport { issues }
    }

    /// Rule issues plus a warning per unknown key recorded at parse time.
    pub fn validate_document(
        &self,
        document: &ConfigDocument,
        language: Option<&str>,
    ) -> ValidationReport {
        let mut report = self.validate_for(&document.config, language);
        let mut issues: Vec<ValidationIssue> = document
            .unknown_keys
            .iter()
            .map(|key| ValidationIssue {
                rule: "unknown_key".to_string(),
                path: key.clone(),
                severity: ViolationSeverity::Warning,
                message: format!("Unknown key '{key}' is ignored"),
            })
            .collect();
        issues.append(&mut report.issues);
        report.issues = issues;
        report
    }
}
