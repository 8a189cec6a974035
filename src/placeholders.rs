//! Placeholder expansion for path and output-name templates.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use thiserror::Error;

pub const KNOWN_PLACEHOLDERS: &[&str] = &["lang", "width", "height"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error(
        "Unknown placeholder '{{{token}}}' in template '{template}' \
         (known: {{lang}}, {{width}}, {{height}})"
    )]
    Unknown { token: String, template: String },
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("static placeholder regex"))
}

/// Every `{token}` in `template`, in order of appearance.
pub fn placeholders_in(template: &str) -> Vec<String> {
    token_pattern()
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// First token that is not one of `{lang}`, `{width}`, `{height}`.
pub fn check(template: &str) -> Result<(), PlaceholderError> {
    match placeholders_in(template)
        .into_iter()
        .find(|t| !KNOWN_PLACEHOLDERS.contains(&t.as_str()))
    {
        Some(token) => Err(PlaceholderError::Unknown {
            token,
            template: template.to_string(),
        }),
        None => Ok(()),
    }
}

/// Replace `{lang}`, `{width}` and `{height}`; any other token is an error.
pub fn expand(
    template: &str,
    lang: &str,
    width: u32,
    height: u32,
) -> Result<String, PlaceholderError> {
    check(template)?;
    let expanded = token_pattern().replace_all(template, |caps: &Captures| match &caps[1] {
        "lang" => lang.to_string(),
        "width" => width.to_string(),
        _ => height.to_string(),
    });
    Ok(expanded.into_owned())
}

/// Output file name for one target. `.png` is appended unless already present.
pub fn output_file_name(
    template: &str,
    lang: &str,
    width: u32,
    height: u32,
) -> Result<String, PlaceholderError> {
    let mut name = expand(template, lang, width, height)?;
    if !name.to_ascii_lowercase().ends_with(".png") {
        name.push_str(".png");
    }
    Ok(name)
}
