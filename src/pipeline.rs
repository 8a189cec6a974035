//! Generation Pipeline - Plan, Then Execute
//!
//! CRITICAL: `plan` resolves every target before any pixel is drawn.
//! Authoring mistakes fail the whole run; a missing asset or font fails
//! only its own target.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::ConfigDocument;
use crate::fonts::FontCatalog;
use crate::hashing::config_fingerprint;
use crate::placeholders::{expand, output_file_name, PlaceholderError};
use crate::render::{RenderResult, RenderTarget, Renderer, TargetId, TextBlock};
use crate::themes::{TextSlot, ThemeError, ThemeResolver};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("screenshots[{screenshot}]: {source}")]
    Placeholder {
        screenshot: usize,
        #[source]
        source: PlaceholderError,
    },

    #[error("screenshots[{screenshot}]: {source}")]
    Theme {
        screenshot: usize,
        #[source]
        source: ThemeError,
    },

    #[error("Output {} is produced by both {first} and {second}", path.display())]
    OutputCollision {
        path: PathBuf,
        first: TargetId,
        second: TargetId,
    },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Worker threads; at least one is used.
    pub jobs: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            jobs: num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFailure {
    pub target: TargetId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub engine_version: String,
    /// Fingerprint of the rendered configuration.
    pub config_hash: Option<String>,
    pub succeeded: Vec<RenderResult>,
    pub failed: Vec<TargetFailure>,
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped == 0
    }
}

/// The generation pipeline - single entry point for a batch
pub struct Pipeline<'a> {
    document: &'a ConfigDocument,
    options: RunOptions,
    renderer: Renderer,
}

impl<'a> Pipeline<'a> {
    /// Index system fonts plus the configured `font_dirs`.
    pub fn new(document: &'a ConfigDocument, options: RunOptions) -> Self {
        let config = &document.config;
        let font_dirs: Vec<PathBuf> =
            config.font_dirs.iter().map(|d| document.resolve_path(d)).collect();
        let fonts = FontCatalog::system(&font_dirs);
        let renderer =
            Renderer::new(fonts, config.fallback_font.clone(), document.base_dir.clone());
        Self::with_renderer(document, options, renderer)
    }

    pub fn with_renderer(
        document: &'a ConfigDocument,
        options: RunOptions,
        renderer: Renderer,
    ) -> Self {
        Self { document, options, renderer }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Expand every (screenshot, language, size) into a resolved target.
    pub fn plan(&self, language: Option<&str>) -> Result<Vec<RenderTarget>, PipelineError> {
        let config = &self.document.config;
        let default_language = config.default_language.as_str();
        let resolver = ThemeResolver::new(config);
        let languages = config.languages_to_generate(language);

        let mut targets = vec![];
        let mut owners: HashMap<PathBuf, TargetId> = HashMap::new();

        for (screenshot, spec) in config.screenshots.iter().enumerate() {
            let theme_err = |source| PipelineError::Theme { screenshot, source };
            let placeholder_err = |source| PipelineError::Placeholder { screenshot, source };

            let canvas = resolver.resolve_canvas(spec.theme.as_deref()).map_err(theme_err)?;
            let mut styles = Vec::with_capacity(TextSlot::ALL.len());
            for slot in TextSlot::ALL {
                let style = resolver.resolve_for_screenshot(spec, slot).map_err(theme_err)?;
                styles.push((slot, style));
            }

            for lang in &languages {
                let texts: Vec<TextBlock> = styles
                    .iter()
                    .filter_map(|(slot, style)| {
                        spec.text.text_for(*slot, lang, default_language).map(|text| TextBlock {
                            slot: *slot,
                            text: text.to_string(),
                            style: style.for_language(lang, default_language),
                        })
                    })
                    .collect();

                for &(width, height) in &config.output_sizes {
                    let input = expand(&spec.input_image, lang, width, height)
                        .map_err(placeholder_err)?;
                    let name = output_file_name(&spec.output_name, lang, width, height)
                        .map_err(placeholder_err)?;
                    let id = TargetId {
                        screenshot,
                        language: lang.clone(),
                        width,
                        height,
                    };
                    let output_path = self.options.output_dir.join(name);

                    if let Some(first) = owners.get(&output_path) {
                        return Err(PipelineError::OutputCollision {
                            path: output_path,
                            first: first.clone(),
                            second: id,
                        });
                    }
                    owners.insert(output_path.clone(), id.clone());

                    targets.push(RenderTarget {
                        id,
                        input_path: self.document.resolve_path(input),
                        output_path,
                        canvas: canvas.clone(),
                        texts: texts.clone(),
                    });
                }
            }
        }

        debug!(targets = targets.len(), languages = ?languages, "planned render targets");
        Ok(targets)
    }

    /// Render `targets` on scoped worker threads. Failures are collected;
    /// once `cancel` is set no new target starts.
    pub fn execute(&self, targets: &[RenderTarget], cancel: &AtomicBool) -> RunSummary {
        let started_at = Utc::now();
        let jobs = self.options.jobs.clamp(1, targets.len().max(1));
        info!(
            targets = targets.len(),
            jobs,
            output_dir = %self.options.output_dir.display(),
            "starting render"
        );

        let cursor = AtomicUsize::new(0);
        let mut outcomes: Vec<Option<Result<RenderResult, String>>> = vec![None; targets.len()];

        thread::scope(|scope| {
            let (tx, rx) = mpsc::channel();
            for _ in 0..jobs {
                let tx = tx.clone();
                let cursor = &cursor;
                scope.spawn(move || loop {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(target) = targets.get(index) else {
                        break;
                    };
                    let outcome = self.renderer.render(target).map_err(|e| e.to_string());
                    if tx.send((index, outcome)).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for (index, outcome) in rx {
                let id = &targets[index].id;
                match &outcome {
                    Ok(result) => debug!(target = %id, path = %result.path.display(), "rendered"),
                    Err(e) => error!(target = %id, error = %e, "render failed"),
                }
                outcomes[index] = Some(outcome);
            }
        });

        let mut succeeded = vec![];
        let mut failed = vec![];
        let mut skipped = 0;
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Some(Ok(result)) => succeeded.push(result),
                Some(Err(error)) => failed.push(TargetFailure {
                    target: target.id.clone(),
                    error,
                }),
                None => skipped += 1,
            }
        }

        let summary = RunSummary {
            engine_version: ENGINE_VERSION.to_string(),
            config_hash: config_fingerprint(&self.document.config).ok(),
            succeeded,
            failed,
            skipped,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped,
            "render finished"
        );
        summary
    }

    /// `plan` followed by `execute`.
    pub fn run(
        &self,
        language: Option<&str>,
        cancel: &AtomicBool,
    ) -> Result<RunSummary, PipelineError> {
        let targets = self.plan(language)?;
        Ok(self.execute(&targets, cancel))
    }
}
