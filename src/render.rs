//! Renderer - one RenderTarget in, one PNG out.
//!
//! CRITICAL: outputs are written to a temporary file in the destination
//! directory and renamed into place. A target either has a complete file or
//! none at all.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Pixel, Rgb, RgbImage, Rgba, RgbaImage};
use rusttype::{point, Font, PositionedGlyph, Scale};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fonts::{load_font, FontCatalog, BUILTIN_FALLBACK_FAMILIES};
use crate::hashing::sha256_hex;
use crate::style::{parse_color, ColorError, Corners, Edges, TextStyle};
use crate::themes::{CanvasStyle, TextLayout, TextSlot};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Input image not found: {}", path.display())]
    MissingAsset { path: PathBuf },

    #[error("No font resolvable for family '{family}' (language '{language}')")]
    FontResolution { family: String, language: String },

    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),

    #[error(transparent)]
    InvalidColor(#[from] ColorError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Identity of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId {
    pub screenshot: usize,
    pub language: String,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "screenshots[{}] {} {}x{}",
            self.screenshot, self.language, self.width, self.height
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub slot: TextSlot,
    pub text: String,
    pub style: TextStyle,
}

/// A fully resolved render request. Nothing in it refers back to the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTarget {
    pub id: TargetId,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub canvas: CanvasStyle,
    pub texts: Vec<TextBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    pub target: TargetId,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Screenshot placement inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub struct Renderer {
    fonts: FontCatalog,
    fallback_font: Option<String>,
    base_dir: PathBuf,
}

impl Renderer {
    pub fn new(
        fonts: FontCatalog,
        fallback_font: Option<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fonts,
            fallback_font,
            base_dir: base_dir.into(),
        }
    }

    pub fn fonts(&self) -> &FontCatalog {
        &self.fonts
    }

    pub fn render(&self, target: &RenderTarget) -> Result<RenderResult, RenderError> {
        if !target.input_path.is_file() {
            return Err(RenderError::MissingAsset {
                path: target.input_path.clone(),
            });
        }
        let source = image::open(&target.input_path)
            .map_err(|source| RenderError::Decode {
                path: target.input_path.clone(),
                source,
            })?
            .to_rgba8();
        debug!(
            target = %target.id,
            source_width = source.width(),
            source_height = source.height(),
            "loaded input image"
        );

        let canvas = self.compose(target, &source)?;
        let encoded = encode_png(&canvas)?;
        let sha256 = sha256_hex(&encoded);

        write_atomic(&target.output_path, |file| file.write_all(&encoded))?;
        debug!(target = %target.id, path = %target.output_path.display(), "wrote output");

        Ok(RenderResult {
            target: target.id.clone(),
            path: target.output_path.clone(),
            bytes: encoded.len() as u64,
            sha256,
        })
    }

    /// Background, scaled screenshot, then text.
    pub fn compose(
        &self,
        target: &RenderTarget,
        source: &RgbaImage,
    ) -> Result<RgbaImage, RenderError> {
        let (width, height) = (target.id.width, target.id.height);
        let style = &target.canvas;
        let background = Rgba(parse_color(&style.background_color)?);
        let mut canvas = RgbaImage::from_pixel(width, height, background);

        let band = style.text_area_height;
        match fit_screenshot(width, height, band, style.padding, source.dimensions()) {
            Some(p) => {
                let mut shot = imageops::resize(source, p.width, p.height, FilterType::Lanczos3);
                apply_corner_radius(&mut shot, style.corner_radius);
                imageops::overlay(&mut canvas, &shot, i64::from(p.x), i64::from(p.y));
            }
            None => {
                warn!(target = %target.id, "no room left for the screenshot below the text area")
            }
        }

        let has_sub = target.texts.iter().any(|b| b.slot == TextSlot::Sub);
        for block in &target.texts {
            self.draw_block(&mut canvas, block, style, has_sub, &target.id.language)?;
        }
        Ok(canvas)
    }

    fn draw_block(
        &self,
        canvas: &mut RgbaImage,
        block: &TextBlock,
        style: &CanvasStyle,
        has_sub: bool,
        language: &str,
    ) -> Result<(), RenderError> {
        if block.text.trim().is_empty() {
            return Ok(());
        }
        let text_style = &block.style;
        let font = self.load_face(text_style, language)?;
        warn_missing_glyphs(&font, &block.text, &text_style.font_family);

        let scale = em_scale(&font, text_style.font_size as f32);
        let Some(layout) = TextLayoutBox::new(&font, scale, &block.text) else {
            return Ok(());
        };

        let (x, y) = anchor_text(
            canvas.width(),
            style.text_area_height,
            style.layout,
            block.slot,
            has_sub,
            (layout.width(), layout.height()),
            text_style,
        );

        if text_style.shadow {
            let shadow = Rgba(parse_color(&text_style.shadow_color)?);
            let (sx, sy) = text_style.shadow_offset;
            let blur = text_style.shadow_blur.min(canvas.width().max(canvas.height()));
            let origin = (x.saturating_add(sx), y.saturating_add(sy));
            draw_shadow(canvas, &layout, origin, shadow, blur);
        }

        let color = Rgba(parse_color(&text_style.color)?);
        layout.draw(canvas, (x - layout.min_x, y - layout.min_y), color);
        Ok(())
    }

    /// Requested family, then `fallback_font`, then the built-in list.
    fn load_face(&self, style: &TextStyle, language: &str) -> Result<Font<'static>, RenderError> {
        let candidates = std::iter::once(style.font_family.as_str())
            .chain(self.fallback_font.as_deref())
            .chain(BUILTIN_FALLBACK_FAMILIES.iter().copied());

        for (i, family) in candidates.enumerate() {
            let Some(path) = self.resolve_family(family, style) else {
                continue;
            };
            match load_font(&path) {
                Ok(Some(font)) => {
                    if i > 0 {
                        warn!(
                            requested = %style.font_family,
                            used = %family,
                            language,
                            "font not found, using fallback"
                        );
                    }
                    return Ok(font);
                }
                Ok(None) => warn!(path = %path.display(), "unsupported font file"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to read font file"),
            }
        }

        Err(RenderError::FontResolution {
            family: style.font_family.clone(),
            language: language.to_string(),
        })
    }

    fn resolve_family(&self, family: &str, style: &TextStyle) -> Option<PathBuf> {
        let relative = self.base_dir.join(family);
        if Path::new(family).is_relative() && relative.is_file() {
            return Some(relative);
        }
        self.fonts.resolve(family, style.font_weight, style.font_style)
    }
}

/// Fit the source into the area below the text band, keeping aspect ratio,
/// centred inside the padding.
pub fn fit_screenshot(
    canvas_width: u32,
    canvas_height: u32,
    text_area_height: u32,
    padding: Edges,
    (source_width, source_height): (u32, u32),
) -> Option<Placement> {
    let horizontal = padding.left.checked_add(padding.right)?;
    let vertical = text_area_height.checked_add(padding.top)?.checked_add(padding.bottom)?;
    let available_w = canvas_width.checked_sub(horizontal)?;
    let available_h = canvas_height.checked_sub(vertical)?;
    if available_w == 0 || available_h == 0 || source_width == 0 || source_height == 0 {
        return None;
    }

    let scale = f64::min(
        f64::from(available_w) / f64::from(source_width),
        f64::from(available_h) / f64::from(source_height),
    );
    let width = ((f64::from(source_width) * scale) as u32).clamp(1, available_w);
    let height = ((f64::from(source_height) * scale) as u32).clamp(1, available_h);

    Some(Placement {
        x: padding.left + (available_w - width) / 2,
        y: text_area_height + padding.top + (available_h - height) / 2,
        width,
        height,
    })
}

/// Cut superellipse (n = 4) corners into the alpha channel, 2x2 supersampled.
pub fn apply_corner_radius(image: &mut RgbaImage, corners: Corners) {
    if corners.is_zero() {
        return;
    }
    let (w, h) = image.dimensions();
    let max_radius = w.min(h) / 2;

    let radii = [
        (corners.top_left, false, false),
        (corners.top_right, true, false),
        (corners.bottom_right, true, true),
        (corners.bottom_left, false, true),
    ];
    for (radius, flip_x, flip_y) in radii {
        let r = radius.min(max_radius);
        if r == 0 {
            continue;
        }
        for cy in 0..r {
            for cx in 0..r {
                let coverage = squircle_coverage(cx, cy, r);
                if coverage >= 1.0 {
                    continue;
                }
                let x = if flip_x { w - 1 - cx } else { cx };
                let y = if flip_y { h - 1 - cy } else { cy };
                let pixel = image.get_pixel_mut(x, y);
                pixel[3] = (f32::from(pixel[3]) * coverage).round() as u8;
            }
        }
    }
}

/// Fraction of pixel (cx, cy) of an r x r corner square inside the curve.
/// (0, 0) is the outermost pixel.
fn squircle_coverage(cx: u32, cy: u32, r: u32) -> f32 {
    const SAMPLES: [f32; 2] = [0.25, 0.75];
    let r = r as f32;
    let mut inside = 0u8;
    for sy in SAMPLES {
        for sx in SAMPLES {
            let dx = (r - (cx as f32 + sx)) / r;
            let dy = (r - (cy as f32 + sy)) / r;
            if dx.powi(4) + dy.powi(4) <= 1.0 {
                inside += 1;
            }
        }
    }
    f32::from(inside) / 4.0
}

/// Scale so one em equals `px` pixels.
fn em_scale(font: &Font<'_>, px: f32) -> Scale {
    let units = f32::from(font.units_per_em().max(1));
    let v = font.v_metrics_unscaled();
    let height = px * (v.ascent - v.descent) / units;
    Scale::uniform(height.max(1.0))
}

fn warn_missing_glyphs(font: &Font<'_>, text: &str, family: &str) {
    let missing: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && font.glyph(*c).id().0 == 0)
        .take(8)
        .collect();
    if !missing.is_empty() {
        warn!(family, missing = %missing, "font has no glyphs for some characters");
    }
}

/// Top-left of the text's ink box on the canvas.
pub fn anchor_text(
    canvas_width: u32,
    text_area_height: u32,
    layout: TextLayout,
    slot: TextSlot,
    has_sub: bool,
    (text_width, text_height): (i32, i32),
    style: &TextStyle,
) -> (i32, i32) {
    if let Some(position) = style.position {
        return position;
    }

    let band = text_area_height as f32;
    let band_height = i32::try_from(text_area_height).unwrap_or(i32::MAX);
    let canvas_width = i32::try_from(canvas_width).unwrap_or(i32::MAX);
    let x = canvas_width.saturating_sub(text_width) / 2;
    let top_slot = match layout {
        TextLayout::Standard => TextSlot::Main,
        TextLayout::Inverted => TextSlot::Sub,
    };
    let y = if !has_sub {
        band_height.saturating_sub(text_height) / 2
    } else {
        let centre = if slot == top_slot { band * 0.25 } else { band * 0.65 };
        centre as i32 - text_height / 2
    };

    (x.saturating_add(style.offset.0), y.saturating_add(style.offset.1))
}

/// Laid-out glyphs for a possibly multi-line string, lines centred on each other.
struct TextLayoutBox {
    glyphs: Vec<PositionedGlyph<'static>>,
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

impl TextLayoutBox {
    fn new(font: &Font<'static>, scale: Scale, text: &str) -> Option<Self> {
        let v = font.v_metrics(scale);
        let line_height = v.ascent - v.descent + v.line_gap;

        let mut lines = vec![];
        for (i, line) in text.lines().enumerate() {
            let baseline = v.ascent + i as f32 * line_height;
            let glyphs: Vec<_> = font.layout(line, scale, point(0.0, baseline)).collect();
            let bounds = ink_bounds(&glyphs);
            lines.push((glyphs, bounds));
        }

        let block_width = lines
            .iter()
            .filter_map(|(_, b)| b.map(|(x0, _, x1, _)| x1 - x0))
            .max()?;

        let mut glyphs = vec![];
        for (line, bounds) in lines {
            let Some((x0, _, x1, _)) = bounds else { continue };
            let dx = ((block_width - (x1 - x0)) / 2 - x0) as f32;
            glyphs.extend(line.into_iter().map(|g| {
                let p = g.position();
                let mut g = g;
                g.set_position(point(p.x + dx, p.y));
                g
            }));
        }

        let (min_x, min_y, max_x, max_y) = ink_bounds(&glyphs)?;
        Some(Self { glyphs, min_x, min_y, max_x, max_y })
    }

    fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    fn height(&self) -> i32 {
        self.max_y - self.min_y
    }

    /// Blend glyph coverage into `image`, glyph origin translated by `offset`.
    fn draw(&self, image: &mut RgbaImage, offset: (i32, i32), color: Rgba<u8>) {
        let (w, h) = (image.width() as i32, image.height() as i32);
        for glyph in &self.glyphs {
            let Some(bb) = glyph.pixel_bounding_box() else { continue };
            glyph.draw(|gx, gy, coverage| {
                let x = bb.min.x + gx as i32 + offset.0;
                let y = bb.min.y + gy as i32 + offset.1;
                if x < 0 || y < 0 || x >= w || y >= h {
                    return;
                }
                let alpha = (coverage * f32::from(color[3])).round().clamp(0.0, 255.0) as u8;
                if alpha == 0 {
                    return;
                }
                image
                    .get_pixel_mut(x as u32, y as u32)
                    .blend(&Rgba([color[0], color[1], color[2], alpha]));
            });
        }
    }
}

fn ink_bounds(glyphs: &[PositionedGlyph<'_>]) -> Option<(i32, i32, i32, i32)> {
    glyphs
        .iter()
        .filter_map(|g| g.pixel_bounding_box())
        .fold(None, |acc, bb| {
            Some(match acc {
                None => (bb.min.x, bb.min.y, bb.max.x, bb.max.y),
                Some((x0, y0, x1, y1)) => (
                    x0.min(bb.min.x),
                    y0.min(bb.min.y),
                    x1.max(bb.max.x),
                    y1.max(bb.max.y),
                ),
            })
        })
}

/// Shadow drawn on its own layer so it can be blurred; `top_left` is where
/// the shadow's ink box lands.
fn draw_shadow(
    canvas: &mut RgbaImage,
    layout: &TextLayoutBox,
    top_left: (i32, i32),
    color: Rgba<u8>,
    blur: u32,
) {
    if blur == 0 {
        layout.draw(canvas, (top_left.0 - layout.min_x, top_left.1 - layout.min_y), color);
        return;
    }

    let sigma = blur as f32 / 2.0;
    let margin = (sigma * 3.0).ceil() as i32;
    let layer_w = (layout.width() + 2 * margin).max(1) as u32;
    let layer_h = (layout.height() + 2 * margin).max(1) as u32;
    let clear = Rgba([color[0], color[1], color[2], 0]);
    let mut layer = RgbaImage::from_pixel(layer_w, layer_h, clear);
    layout.draw(&mut layer, (margin - layout.min_x, margin - layout.min_y), color);

    let blurred = imageproc::filter::gaussian_blur_f32(&layer, sigma);
    imageops::overlay(
        canvas,
        &blurred,
        i64::from(top_left.0 - margin),
        i64::from(top_left.1 - margin),
    );
}

/// Flatten onto white and encode as PNG.
pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let flat = RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let p = canvas.get_pixel(x, y);
        let a = u32::from(p[3]);
        let mix = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([mix(p[0]), mix(p[1]), mix(p[2])])
    });

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(flat)
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(RenderError::Encode)?;
    Ok(buffer.into_inner())
}

/// Write through a temporary file in the same directory, then rename over
/// `path`. A failed `write` leaves neither the target nor the temporary file.
pub fn write_atomic<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".appscreenshots-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
