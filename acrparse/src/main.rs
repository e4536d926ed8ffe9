//! acrparse: run the acr toolchain text parsers from the command line.
//!
//! - `acrparse header include/gen/algo_gen.h`: enums, structs and functions
//!   recovered from amc-generated headers
//! - `acr dmmeta.ns:% | acrparse ssim`: ssim tuples as JSON records

mod render;

use acr_syntax::{parse_header, parse_tuple_output, ParsedHeader, Record};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "acrparse", version, about = "Parse amc-generated headers and ssim tuple output")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log filter for stderr
    #[arg(long, global = true, env = "RUST_LOG", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Parse generated C++ headers
    Header {
        /// Header files, directories or glob patterns. If omitted, reads stdin.
        files: Vec<String>,

        /// Output format: json (default), summary, text
        #[arg(short = 'f', long, default_value = "json")]
        format: String,
    },
    /// Parse ssim tuple lines (acr output, .ssim files)
    Ssim {
        /// Input files or glob patterns. If omitted, reads stdin.
        files: Vec<String>,

        /// Output format: json (default), text
        #[arg(short = 'f', long, default_value = "json")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&cli.log_level))
        .with_writer(io::stderr)
        .without_time()
        .init();

    match &cli.command {
        Command::Header { files, format } => header(files, format),
        Command::Ssim { files, format } => ssim(files, format),
    }
}

fn header(files: &[String], format: &str) -> Result<()> {
    let renderer = render::header_renderer(format)?;
    let headers: Vec<ParsedHeader> = if files.is_empty() {
        vec![parse_header(&read_stdin()?, None)]
    } else {
        expand_globs(files, HEADER_EXTENSIONS)?
            .iter()
            .filter_map(|path| {
                let text = read_lossy(path)?;
                Some(parse_header(&text, Some(path.as_path())))
            })
            .collect()
    };
    print!("{}", renderer.render(&headers)?);
    Ok(())
}

fn ssim(files: &[String], format: &str) -> Result<()> {
    let renderer = render::record_renderer(format)?;
    let records: Vec<Record> = if files.is_empty() {
        parse_tuple_output(&read_stdin()?)
    } else {
        expand_globs(files, SSIM_EXTENSIONS)?
            .iter()
            .filter_map(|path| read_lossy(path))
            .flat_map(|text| parse_tuple_output(&text))
            .collect()
    };
    print!("{}", renderer.render(&records)?);
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut bytes = Vec::new();
    io::stdin()
        .read_to_end(&mut bytes)
        .context("failed to read stdin")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// File contents, or `None` with a warning when unreadable.
fn read_lossy(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
            None
        }
    }
}

const HEADER_EXTENSIONS: &[&str] = &["h"];
const SSIM_EXTENSIONS: &[&str] = &["ssim"];

/// Expand glob patterns into a list of real file paths.
/// Bare directories are scanned (non-recursively) for `extensions`.
fn expand_globs(patterns: &[String], extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            for entry in entries.flatten() {
                let p = entry.path();
                let wanted = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| extensions.contains(&ext));
                if p.is_file() && wanted {
                    files.push(p);
                }
            }
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {pattern}"))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            tracing::warn!(pattern = %pattern, "no files matched");
        }
        files.extend(matches);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_scanned_for_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_gen.h"), "").unwrap();
        fs::write(dir.path().join("a_gen.h"), "").unwrap();
        fs::write(dir.path().join("a_gen.cpp"), "").unwrap();
        fs::create_dir(dir.path().join("nested.h")).unwrap();

        let found = expand_globs(&[dir.path().display().to_string()], HEADER_EXTENSIONS).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a_gen.h", "b_gen.h"]);
    }

    #[test]
    fn globs_are_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.ssim"), "").unwrap();
        fs::write(dir.path().join("y.ssim"), "").unwrap();
        let pattern = format!("{}/*.ssim", dir.path().display());
        let explicit = dir.path().join("x.ssim").display().to_string();

        let found = expand_globs(&[pattern, explicit], SSIM_EXTENSIONS).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("x.ssim"));
    }

    #[test]
    fn unmatched_glob_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.h", dir.path().display());
        assert!(expand_globs(&[pattern], HEADER_EXTENSIONS).unwrap().is_empty());
    }
}
