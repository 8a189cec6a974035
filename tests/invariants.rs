//! Contract Invariant Tests
//!
//! These tests verify the guarantees the tool makes to its users:
//! atomic outputs, independent targets, pure templates, stable styling.

use image::{Rgba, RgbaImage};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::AtomicBool;
use tempfile::tempdir;

use appscreenshots::{
    placeholders::expand,
    render::write_atomic,
    FontCatalog, Pipeline, RunOptions, ScreenshotConfig, TextSlot, ThemeResolver, Validator,
};

fn write_png(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(width, height, Rgba([30, 90, 200, 255])).save(path).unwrap();
}

/// Any installed font file, or None on hosts without fonts.
fn any_system_font() -> Option<PathBuf> {
    let catalog = FontCatalog::system(&[]);
    let mut paths: Vec<_> = catalog
        .faces()
        .iter()
        .map(|f| f.path.clone())
        .filter(|p| p.extension().map_or(false, |e| e.eq_ignore_ascii_case("ttf")))
        .collect();
    paths.sort();
    let preferred = paths.iter().position(|p| {
        let name = p.file_name().unwrap_or_default().to_string_lossy();
        name == "DejaVuSans.ttf" || name == "LiberationSans-Regular.ttf"
    });
    match preferred {
        Some(i) => Some(paths.swap_remove(i)),
        None => paths.into_iter().next(),
    }
}

fn load(dir: &Path, yaml: &str) -> appscreenshots::ConfigDocument {
    let path = dir.join("config.yml");
    fs::write(&path, yaml).unwrap();
    ScreenshotConfig::load(&path).unwrap()
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_appscreenshots"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

fn e2e_config(font: &Path) -> String {
    format!(
        r##"
default_language: en
default_theme: standard
output_sizes: [[1320, 2868]]
fallback_font: "{}"
theme_styles:
  standard:
    main_text_style:
      font_size: 120
      color: "#000000"
screenshots:
  - input_image: "shots/{{lang}}/home.png"
    output_name: "01_home_{{lang}}_{{width}}x{{height}}"
    text:
      main_text:
        en: "Track everything"
"##,
        font.display()
    )
}

#[test]
fn invariant_end_to_end_single_output() {
    let Some(font) = any_system_font() else {
        eprintln!("skipping: no .ttf font installed");
        return;
    };
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("shots/en/home.png"), 660, 1434);
    let doc = load(dir.path(), &e2e_config(&font));

    let report = Validator::new(&doc.base_dir).validate_document(&doc, None);
    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);

    let out = dir.path().join("output");
    let options = RunOptions { output_dir: out.clone(), jobs: 2 };
    let summary = Pipeline::new(&doc, options).run(None, &AtomicBool::new(false)).unwrap();
    assert!(summary.is_success(), "failures: {:?}", summary.failed);

    let files: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files, vec!["01_home_en_1320x2868.png"]);

    let image = image::open(out.join("01_home_en_1320x2868.png")).unwrap().to_rgb8();
    assert_eq!(image.dimensions(), (1320, 2868));
    let dark_in_band = (0..400)
        .flat_map(|y| (0..1320).map(move |x| (x, y)))
        .filter(|&(x, y)| image.get_pixel(x, y)[0] < 100)
        .count();
    assert!(dark_in_band > 0, "no text drawn in the text band");
    let bytes = fs::read(out.join("01_home_en_1320x2868.png")).unwrap();
    assert_eq!(summary.succeeded[0].sha256, appscreenshots::sha256_hex(&bytes));
}

#[test]
fn invariant_validate_only_succeeds_without_issues() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("shots/en/home.png"), 10, 20);
    let yaml = r##"
default_language: en
default_theme: standard
output_sizes: [[1320, 2868]]
theme_styles:
  standard:
    main_text_style:
      font_size: 120
screenshots:
  - input_image: "shots/{lang}/home.png"
    output_name: "01_home_{lang}_{width}x{height}"
    text:
      main_text: {en: "Track everything"}
"##;
    let config = dir.path().join("config.yml");
    fs::write(&config, yaml).unwrap();

    let output = run_cli(&["-c", config.to_str().unwrap(), "--validate-only", "--json"]);
    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["issues"].as_array().unwrap().len(), 0);
    assert!(!dir.path().join("output").exists());
}

#[test]
fn invariant_unknown_theme_is_one_issue_at_its_path() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("a.png"), 10, 20);
    let doc = load(
        dir.path(),
        r##"
default_language: en
default_theme: standard
screenshots:
  - input_image: a.png
    output_name: a_{lang}_{width}x{height}
    theme: nonexistent
    text: {main_text: {en: A}}
"##,
    );

    let report = Validator::new(&doc.base_dir).validate(&doc.config);
    assert_eq!(report.issues.len(), 1, "{:?}", report.issues);
    assert_eq!(report.issues[0].path, "screenshots[0].theme");
    assert!(report.has_errors());

    let config = dir.path().join("config.yml");
    let out = dir.path().join("out");
    let output = run_cli(&["-c", config.to_str().unwrap(), "-o", out.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!out.exists());
}

#[test]
fn invariant_missing_config_exits_with_config_error() {
    let output = run_cli(&[]);
    assert_eq!(output.status.code(), Some(1));

    let output = run_cli(&["-c", "/definitely/not/here.yml"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn invariant_show_options_needs_no_config() {
    let output = run_cli(&["--show-options"]);
    assert_eq!(output.status.code(), Some(0));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("default_theme"));
    assert!(text.contains("shadow_blur"));
}

#[test]
fn invariant_interrupted_write_leaves_no_file() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("shots/01_home_en_1320x2868.png");

    let result = write_atomic(&target, |file| {
        file.write_all(&[0x89, b'P', b'N', b'G'])?;
        Err(io::Error::new(io::ErrorKind::Other, "killed mid-write"))
    });

    assert!(result.is_err());
    assert!(!target.exists());
    let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap()).unwrap().collect();
    assert!(leftovers.is_empty(), "temporary files left behind");
}

#[test]
fn invariant_failed_target_does_not_affect_siblings() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("one.png"), 10, 20);
    write_png(&dir.path().join("two.png"), 10, 20);
    write_png(&dir.path().join("three.png"), 10, 20);
    let doc = load(
        dir.path(),
        r##"
default_language: en
default_theme: standard
output_sizes: [[100, 200], [50, 100]]
screenshots:
  - {input_image: one.png, output_name: "one_{width}", text: {main_text: {en: ""}}}
  - {input_image: two.png, output_name: "two_{width}", text: {main_text: {en: ""}}}
  - {input_image: three.png, output_name: "three_{width}", text: {main_text: {en: ""}}}
"##,
    );
    fs::remove_file(dir.path().join("two.png")).unwrap();

    let out = dir.path().join("out");
    let options = RunOptions { output_dir: out.clone(), jobs: 3 };
    let summary = Pipeline::new(&doc, options).run(None, &AtomicBool::new(false)).unwrap();

    assert_eq!(summary.succeeded.len(), 4);
    assert_eq!(summary.failed.len(), 2);
    assert!(summary.failed.iter().all(|f| f.target.screenshot == 1));
    for name in ["one_100.png", "one_50.png", "three_100.png", "three_50.png"] {
        assert!(out.join(name).is_file(), "{name} missing");
    }
    assert!(!out.join("two_100.png").exists());
}

#[test]
fn invariant_render_failure_exits_2() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("en.png"), 10, 20);
    let config = dir.path().join("config.yml");
    fs::write(
        &config,
        r##"
default_language: en
default_theme: standard
output_sizes: [[100, 200]]
screenshots:
  - input_image: "{lang}.png"
    output_name: "shot_{lang}"
    text: {main_text: {en: "", ja: ""}}
"##,
    )
    .unwrap();

    let out = dir.path().join("out");
    let output = run_cli(&["-c", config.to_str().unwrap(), "-o", out.to_str().unwrap(), "--json"]);
    assert_eq!(output.status.code(), Some(2));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["succeeded"].as_array().unwrap().len(), 1);
    assert_eq!(summary["failed"][0]["target"]["language"], "ja");
    assert!(out.join("shot_en.png").is_file());
}

#[cfg(unix)]
#[test]
fn invariant_interrupt_stops_new_targets_and_keeps_outputs_whole() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("in.png"), 10, 20);
    let sizes: Vec<String> = (1000..1200).map(|w| format!("[{w}, 2000]")).collect();
    let config = dir.path().join("config.yml");
    let yaml = format!(
        r#"
default_language: en
default_theme: standard
output_sizes: [{}]
screenshots:
  - input_image: in.png
    output_name: "shot_{{width}}"
    text: {{main_text: {{en: ""}}}}
"#,
        sizes.join(", ")
    );
    fs::write(&config, yaml).unwrap();

    let out = dir.path().join("out");
    let mut child = Command::new(env!("CARGO_BIN_EXE_appscreenshots"))
        .args(["-c", config.to_str().unwrap(), "-o", out.to_str().unwrap(), "-j", "1", "--json"])
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stderr = BufReader::new(child.stderr.take().unwrap());
    let mut line = String::new();
    while !line.contains("starting render") {
        line.clear();
        assert!(stderr.read_line(&mut line).unwrap() > 0, "render never started");
    }
    let drain = std::thread::spawn(move || io::copy(&mut stderr, &mut io::sink()));

    let status = Command::new("kill").args(["-INT", &child.id().to_string()]).status().unwrap();
    assert!(status.success());
    let output = child.wait_with_output().unwrap();
    drain.join().unwrap().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(summary["skipped"].as_u64().unwrap() > 0);

    let written = summary["succeeded"].as_array().unwrap().len();
    let files: Vec<_> = fs::read_dir(&out)
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default();
    assert_eq!(files.len(), written);
    for file in files {
        assert!(image::open(&file).is_ok(), "{} is not a complete image", file.display());
    }
}

#[test]
fn invariant_placeholder_expansion_is_pure() {
    let template = "{lang}/{width}x{height}/{lang}.png";
    let first = expand(template, "zh-Hans", 2064, 2752).unwrap();
    for _ in 0..3 {
        assert_eq!(expand(template, "zh-Hans", 2064, 2752).unwrap(), first);
    }
    assert_eq!(first, "zh-Hans/2064x2752/zh-Hans.png");
    assert!(expand("{size}", "en", 1, 1).is_err());
}

#[test]
fn invariant_theme_resolution_is_idempotent_and_global_by_default() {
    let config = ScreenshotConfig::from_yaml_str(
        r##"
default_language: en
default_theme: standard
theme_styles:
  standard:
    main_text_style: {font_size: 120, color: {ja: "#222222"}}
  standard_inverted:
    main_text_style: {font_size: 80}
screenshots: []
"##,
    )
    .unwrap()
    .config;
    let resolver = ThemeResolver::new(&config);

    let none = resolver.resolve(None, TextSlot::Main).unwrap();
    let standard = resolver.resolve(Some("standard"), TextSlot::Main).unwrap();
    assert_eq!(none, standard);
    assert_eq!(none, resolver.resolve(None, TextSlot::Main).unwrap());
    assert_eq!(none.for_language("en", "en").font_size, 120);
    assert_eq!(none.for_language("ja", "en").color, "#222222");

    let inverted = resolver.resolve(Some("standard_inverted"), TextSlot::Main).unwrap();
    assert_eq!(inverted.for_language("ja", "en").font_size, 80);
    assert_eq!(inverted.for_language("ja", "en").color, "#222222");
}
