//! wiregen: compile wire-format schemas to Rust.
//!
//! Usage:
//!   wiregen [OPTIONS] <FILE.pdl>...
//!
//! Writes `<stem>.rs` per input into the output directory. A failing file
//! prints one diagnostic line and the remaining files are still processed;
//! the exit status is 1 if any file failed.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wiregen::{ConfigFile, EmitOptions};

#[derive(Parser)]
#[command(name = "wiregen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile binary wire-format schemas to Rust codecs", long_about = None)]
struct Cli {
    /// Schema files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory (overrides `output_dir` in the config file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Wrap each generated file in `pub mod <NAMESPACE>`
    #[arg(short, long)]
    namespace: Option<String>,

    /// Path to a wiregen.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Parse and resolve only; write nothing
    #[arg(long)]
    check: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "wiregen=debug" } else { "wiregen=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            error!(failed, total = cli.files.len(), "some schemas failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("wiregen: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns the number of files that failed.
fn run(cli: &Cli) -> Result<usize> {
    let config = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let mut opts = config.emit;
    if let Some(ns) = &cli.namespace {
        opts.namespace = Some(ns.clone());
    }
    opts.validate().map_err(anyhow::Error::msg)?;

    let output_dir = cli
        .output_dir
        .clone()
        .or(config.output_dir)
        .unwrap_or_else(|| PathBuf::from("generated"));
    if !cli.check {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;
    }

    let mut failed = 0;
    for path in &cli.files {
        if let Err(e) = process(path, &output_dir, &opts, cli.check) {
            eprintln!("{}: {:#}", path.display(), e);
            failed += 1;
        }
    }
    Ok(failed)
}

fn process(path: &Path, output_dir: &Path, opts: &EmitOptions, check_only: bool) -> Result<()> {
    let source = fs::read_to_string(path).context("cannot read schema")?;
    if check_only {
        let schema = wiregen::check(&source)?;
        info!(file = %path.display(), records = schema.records.len(), "ok");
        return Ok(());
    }

    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let rust = wiregen::compile(&source, &source_name, opts)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "schema".to_string());
    let out = output_dir.join(format!("{}.rs", stem));
    debug!(bytes = rust.len(), "writing");
    fs::write(&out, rust).with_context(|| format!("writing {}", out.display()))?;
    info!(file = %path.display(), output = %out.display(), "generated");
    Ok(())
}
