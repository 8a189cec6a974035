//! Font discovery and loading.
//!
//! Font files are indexed once per run by walking the platform font
//! directories plus any configured ones. Lookups match a normalised family
//! key derived from the file name, then pick the closest weight.

use rusttype::Font;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::style::{weight_from_name, FontStyle};

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

/// Families tried when neither the style's family nor `fallback_font` resolve.
pub const BUILTIN_FALLBACK_FAMILIES: &[&str] = &[
    "Helvetica",
    "Arial",
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFace {
    pub path: PathBuf,
    pub family_key: String,
    pub weight: u16,
    pub style: FontStyle,
}

#[derive(Debug, Clone, Default)]
pub struct FontCatalog {
    faces: Vec<FontFace>,
}

impl FontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform font directories followed by `extra_dirs`.
    pub fn system(extra_dirs: &[PathBuf]) -> Self {
        let mut dirs = system_font_dirs();
        dirs.extend(extra_dirs.iter().cloned());
        Self::scan(&dirs)
    }

    pub fn scan(dirs: &[PathBuf]) -> Self {
        let mut catalog = Self::new();
        for dir in dirs {
            if !dir.is_dir() {
                trace!(dir = %dir.display(), "font directory not present");
                continue;
            }
            for entry in WalkDir::new(dir).follow_links(true).into_iter().filter_map(Result::ok) {
                if entry.file_type().is_file() {
                    catalog.add_file(entry.path());
                }
            }
        }
        debug!(faces = catalog.faces.len(), "indexed font files");
        catalog
    }

    pub fn add_file(&mut self, path: &Path) {
        if let Some(face) = describe_font_file(path) {
            self.faces.push(face);
        }
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn faces(&self) -> &[FontFace] {
        &self.faces
    }

    /// Find a face for `family`. A family naming an existing font file is used as is.
    pub fn resolve(&self, family: &str, weight: u16, style: FontStyle) -> Option<PathBuf> {
        let as_path = Path::new(family);
        if is_font_file(as_path) && as_path.is_file() {
            return Some(as_path.to_path_buf());
        }

        let key = normalize_family(family);
        self.faces
            .iter()
            .filter(|f| f.family_key == key)
            .min_by_key(|f| {
                let style_penalty = if f.style == style { 0 } else { 1000 };
                style_penalty + (i32::from(f.weight) - i32::from(weight)).unsigned_abs()
            })
            .map(|f| f.path.clone())
    }
}

pub fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];
    if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
    } else if cfg!(target_os = "windows") {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
    } else {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
    }
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        if cfg!(target_os = "macos") {
            dirs.push(home.join("Library/Fonts"));
        } else {
            dirs.push(home.join(".fonts"));
            dirs.push(home.join(".local/share/fonts"));
        }
    }
    dirs
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FONT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lowercase with spaces, dashes and underscores removed.
pub fn normalize_family(family: &str) -> String {
    family
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Derive family key, weight and style from a font file name such as
/// `DejaVuSans-BoldOblique.ttf` or `HiraginoSans-W6.ttc`.
pub fn describe_font_file(path: &Path) -> Option<FontFace> {
    if !is_font_file(path) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;

    let (family, suffix) = match stem.rfind(['-', ' ']) {
        Some(idx) if parse_style_suffix(&stem[idx + 1..]).is_some() => {
            (&stem[..idx], &stem[idx + 1..])
        }
        _ => (stem, ""),
    };
    let (weight, style) = parse_style_suffix(suffix).unwrap_or((400, FontStyle::Normal));

    Some(FontFace {
        path: path.to_path_buf(),
        family_key: normalize_family(family),
        weight,
        style,
    })
}

fn parse_style_suffix(suffix: &str) -> Option<(u16, FontStyle)> {
    if suffix.is_empty() {
        return None;
    }
    let lower = suffix.to_ascii_lowercase();

    // Hiragino-style W1..W9
    if let Some(digit) = lower.strip_prefix('w').and_then(|d| d.parse::<u16>().ok()) {
        if (1..=9).contains(&digit) {
            return Some((digit * 100, FontStyle::Normal));
        }
    }

    let (rest, style) = if let Some(rest) = lower.strip_suffix("italic") {
        (rest, FontStyle::Italic)
    } else if let Some(rest) = lower.strip_suffix("oblique") {
        (rest, FontStyle::Oblique)
    } else {
        (lower.as_str(), FontStyle::Normal)
    };

    if rest.is_empty() {
        return (style != FontStyle::Normal).then_some((400, style));
    }
    weight_from_name(rest).map(|w| (w, style))
}

/// Read and parse a font file. Collections use their first face.
pub fn load_font(path: &Path) -> std::io::Result<Option<Font<'static>>> {
    let data = fs::read(path)?;
    Ok(Font::try_from_vec_and_index(data, 0))
}
