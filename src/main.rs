//! srcdemo CLI - Command-line tool for inspecting Source engine demos.
//!
//! This is the main entry point for the srcdemo command-line application.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use srcdemo::header::HEADER_SIZE;
use srcdemo::prelude::*;

/// srcdemo - Source engine demo inspection tool
#[derive(Parser)]
#[command(name = "srcdemo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Demo files or directories containing them
    #[arg(env = "SRCDEMO_INPUT", value_delimiter = ',', required = true)]
    paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Write one report per demo into this directory instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header of each demo
    Header {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Describe every frame and message
    Dump {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Count frames and messages by kind
    Stats {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// List each message with its encoded bits
    Messages {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Export the decoded document as JSON
    Json {
        #[command(flatten)]
        inputs: Inputs,
    },
}

#[derive(Clone, Copy)]
enum Report {
    Header,
    Dump,
    Stats,
    Messages,
    Json,
}

impl Report {
    fn extension(self) -> &'static str {
        match self {
            Report::Json => "json",
            _ => "txt",
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (report, inputs) = match cli.command {
        Commands::Header { inputs } => (Report::Header, inputs),
        Commands::Dump { inputs } => (Report::Dump, inputs),
        Commands::Stats { inputs } => (Report::Stats, inputs),
        Commands::Messages { inputs } => (Report::Messages, inputs),
        Commands::Json { inputs } => (Report::Json, inputs),
    };

    cmd_report(report, &inputs)
}

fn cmd_report(report: Report, inputs: &Inputs) -> Result<()> {
    let files = collect_demos(&inputs.paths, inputs.recursive)?;
    if files.is_empty() {
        anyhow::bail!("No demo files found");
    }
    debug!(files = files.len(), "collected inputs");

    if let Some(output) = &inputs.output {
        fs::create_dir_all(output).context("Failed to create output directory")?;
    }

    let pb = if files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let results: Vec<(PathBuf, srcdemo::Result<String>)> = files
        .par_iter()
        .map(|path| {
            let result = render(path, report);
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            (path.clone(), result)
        })
        .collect();

    if let Some(pb) = &pb {
        pb.finish_with_message("Done");
    }

    let mut rejected = 0;
    let mut failed = 0;
    let mut written = HashSet::new();
    for (path, result) in &results {
        match result {
            Ok(text) => match &inputs.output {
                Some(output) => {
                    let target = report_path(output, path, report.extension(), &mut written);
                    fs::write(&target, text)
                        .with_context(|| format!("Failed to write {}", target.display()))?;
                }
                None => {
                    if results.len() > 1 {
                        println!("== {}", path.display());
                    }
                    print!("{}", text);
                }
            },
            Err(e) if e.is_header_error() => {
                eprintln!("Not a supported demo: {}: {}", path.display(), e);
                rejected += 1;
            }
            Err(e) => {
                eprintln!("Error decoding {}: {}", path.display(), e);
                failed += 1;
            }
        }
    }

    if results.len() > 1 || inputs.output.is_some() {
        eprintln!(
            "Processed {} demos in {:?} ({} rejected, {} errors)",
            results.len() - rejected - failed,
            start.elapsed(),
            rejected,
            failed
        );
    }

    if rejected + failed == results.len() {
        anyhow::bail!("No demo could be decoded");
    }

    Ok(())
}

fn render(path: &Path, report: Report) -> srcdemo::Result<String> {
    match report {
        Report::Header => render_header(path),
        Report::Dump => Ok(DemoDocument::open(path)?.dump()),
        Report::Stats => Ok(DemoDocument::open(path)?.stats_report()),
        Report::Messages => DemoDocument::open(path)?.message_dump(),
        Report::Json => DemoDocument::open(path)?.to_json(),
    }
}

/// Header-only pass: the frame stream is never read.
fn render_header(path: &Path) -> srcdemo::Result<String> {
    use std::io::Read;

    let mut data = Vec::with_capacity(HEADER_SIZE);
    fs::File::open(path)?.take(HEADER_SIZE as u64).read_to_end(&mut data)?;

    let header = DemoHeader::parse(&data)?;
    let profile = EngineProfile::for_header(&header)?;

    let mut text = describe_standalone(&header);
    text.push_str(&format!("Profile: {}\n", profile.name));
    if let Some(rate) = header.tick_rate() {
        text.push_str(&format!("Tick rate: {:.2}\n", rate));
    }
    Ok(text)
}

fn collect_demos(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }

        let walker = WalkDir::new(path).max_depth(if recursive { usize::MAX } else { 1 });
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to read directory {}", path.display()))?;
            let is_demo = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("dem"));
            if is_demo {
                files.push(entry.into_path());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Pick a report file for `input`. Inputs sharing a file stem get `-2`,
/// `-3`, ... suffixes in the order they are written.
fn report_path(output: &Path, input: &Path, extension: &str, written: &mut HashSet<PathBuf>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "demo".to_string());

    let mut target = output.join(format!("{}.{}", stem, extension));
    let mut suffix = 2;
    while !written.insert(target.clone()) {
        target = output.join(format!("{}-{}.{}", stem, suffix, extension));
        suffix += 1;
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_path_keeps_same_stems_apart() {
        let output = Path::new("reports");
        let mut written = HashSet::new();

        let first = report_path(output, Path::new("a/run.dem"), "txt", &mut written);
        let second = report_path(output, Path::new("b/run.dem"), "txt", &mut written);
        let third = report_path(output, Path::new("c/run.dem"), "txt", &mut written);
        let other = report_path(output, Path::new("a/intro.dem"), "txt", &mut written);

        assert_eq!(first, output.join("run.txt"));
        assert_eq!(second, output.join("run-2.txt"));
        assert_eq!(third, output.join("run-3.txt"));
        assert_eq!(other, output.join("intro.txt"));
    }

    #[test]
    fn test_report_path_skips_taken_suffix() {
        let output = Path::new("reports");
        let mut written = HashSet::new();

        report_path(output, Path::new("run-2.dem"), "json", &mut written);
        report_path(output, Path::new("a/run.dem"), "json", &mut written);
        let last = report_path(output, Path::new("b/run.dem"), "json", &mut written);
        assert_eq!(last, output.join("run-3.json"));
    }
}
