pub mod ast;
pub mod blk;
pub mod context;
pub mod generator;
pub mod hardware;
pub mod java;
pub mod javascript;
pub mod mutation;
pub mod order;
pub mod registry;
pub mod types;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use anyhow::{Context, Result};
use generator::{JavaOptions, Mode};
use hardware::HardwareConfig;
use std::path::{Path, PathBuf};

pub use blk::{load_blk_file, parse_blk, BlkFile};

/// Renders the blocks of a `.blk` document as a script for the runtime bridge.
pub fn render_javascript(source: &str, hardware: &HardwareConfig) -> Result<String> {
    let file = parse_blk(source)?;
    generator::generate(&file, Mode::JavaScript, hardware, &JavaOptions::default())
}

/// Renders the blocks of a `.blk` document as a compiled `LinearOpMode` class.
pub fn render_java(source: &str, hardware: &HardwareConfig, options: &JavaOptions) -> Result<String> {
    let file = parse_blk(source)?;
    generator::generate(&file, Mode::Java, hardware, options)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    let total_stages = 3 + usize::from(args.hardware.is_some());
    let progress = CliProgress::new("Generate", total_stages);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Resolving input path");
    let input = canonicalize_file(&args.input)?;

    let hardware = match &args.hardware {
        Some(path) => {
            stage += 1;
            progress.emit(stage, "Loading hardware configuration");
            HardwareConfig::load(path)?
        }
        None => HardwareConfig::default(),
    };

    stage += 1;
    progress.emit(stage, "Parsing blocks");
    let file = load_blk_file(&input)?;

    stage += 1;
    let mode = args.target.mode();
    let code = match mode {
        Mode::JavaScript => {
            progress.emit(stage, "Generating JavaScript");
            generator::generate(&file, mode, &hardware, &JavaOptions::default())?
        }
        Mode::Java => {
            progress.emit(stage, "Generating Java");
            let options = JavaOptions {
                class_name: args
                    .class_name
                    .clone()
                    .unwrap_or_else(|| class_name_for(&input)),
                package: args.package.clone(),
            };
            generator::generate(&file, mode, &hardware, &options)?
        }
    };

    match &args.output {
        Some(output) => std::fs::write(output, code.as_bytes())
            .with_context(|| format!("Failed to write '{}'.", output.display()))?,
        None => print!("{}", code),
    }
    Ok(())
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

/// Class name derived from the file stem, e.g. `my drive.blk` -> `mydrive`.
pub fn class_name_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let identifier = context::make_identifier(&stem);
    if identifier.is_empty() || context::is_reserved(&identifier) {
        generator::DEFAULT_CLASS_NAME.to_string()
    } else {
        identifier
    }
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!(
            "[{}] {}... ({}/{}) {}",
            self.prefix, label, step, self.total, bar
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
