//! appscreenshots - App Store Screenshot Compositor
//!
//! Takes raw app screenshots and a YAML description, and renders localized
//! marketing images: a themed background, a text band with per-language
//! copy, and the screenshot fitted below it.
//!
//! # Flow
//! 1. `config` parses YAML once into typed, read-only structs
//! 2. `validation` reports every problem before any pixel is drawn
//! 3. `pipeline` expands screenshots x languages x sizes into render targets
//! 4. `render` composes each target and writes it atomically

pub mod config;
pub mod fonts;
pub mod hashing;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod placeholders;
pub mod render;
pub mod style;
pub mod themes;
pub mod validation;

pub use config::{ConfigDocument, ConfigError, ScreenshotConfig, ScreenshotSpec, ThemeStyle};
pub use fonts::FontCatalog;
pub use hashing::{config_fingerprint, sha256_hex};
pub use logging::{init_logging, LoggingConfig};
pub use pipeline::{Pipeline, PipelineError, RunOptions, RunSummary, TargetFailure};
pub use placeholders::{expand, PlaceholderError};
pub use render::{RenderError, RenderResult, RenderTarget, Renderer, TargetId};
pub use style::{ResolvedTextStyle, TextStyle, TextStyleOverrides};
pub use themes::{TextLayout, TextSlot, ThemeError, ThemeRegistry, ThemeResolver};
pub use validation::{
    ValidationIssue, ValidationReport, ValidationRule, Validator, ViolationSeverity,
};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
