//! Rendering of command results.
//!
//! Every command result renders either as colored text for a terminal or
//! as one JSON document on stdout. Status notes go to stderr so stdout stays
//! pipeable.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use strata_lib::assembly::AssemblyReport;
use strata_lib::cache::ArtifactKey;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

const BUILT: &str = "✓";
const UP_TO_DATE: &str = "•";
const FAILED: &str = "✗";
const STEP: &str = "→";

/// Outcome of `strata build`.
#[derive(Debug, Serialize)]
pub struct BuildSummary<'a> {
  pub target: &'a str,
  pub key: &'a ArtifactKey,
  #[serde(flatten)]
  pub report: &'a AssemblyReport,
  /// Size of the target's artifact archive, when it could be read.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub artifact_bytes: Option<u64>,
  pub duration_ms: u128,
}

impl<'a> BuildSummary<'a> {
  pub fn new(
    target: &'a str,
    key: &'a ArtifactKey,
    report: &'a AssemblyReport,
    artifact_bytes: Option<u64>,
    elapsed: Duration,
  ) -> Self {
    Self {
      target,
      key,
      report,
      artifact_bytes,
      duration_ms: elapsed.as_millis(),
    }
  }

  pub fn emit(&self, output: OutputFormat) -> anyhow::Result<()> {
    if output.is_json() {
      return print_json(self);
    }
    let mut stdout = io::stdout().lock();
    self.write_text(&mut stdout).context("Failed to write build summary")
  }

  fn write_text(&self, out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    if self.report.built.is_empty() {
      let mark = UP_TO_DATE.if_supports_color(Stream::Stdout, |s| s.blue());
      writeln!(out, "{} {} is up to date", mark, self.target)?;
    } else {
      let mark = BUILT.if_supports_color(Stream::Stdout, |s| s.green());
      writeln!(out, "{} Assembled {}", mark, self.target)?;
      for name in &self.report.built {
        writeln!(out, "  {} {}", STEP, name)?;
      }
    }

    write_stat(out, "Key", self.key.as_str())?;
    write_stat(
      out,
      "Components",
      &format!("{} built, {} cached", self.report.built.len(), self.report.cached.len()),
    )?;
    if let Some(bytes) = self.artifact_bytes {
      write_stat(out, "Artifact", &human_size(bytes))?;
    }
    write_stat(out, "Took", &human_duration(Duration::from_millis(self.duration_ms as u64)))
  }
}

/// Outcome of `strata key`.
#[derive(Debug, Serialize)]
pub struct CacheStatus<'a> {
  pub target: &'a str,
  pub key: &'a ArtifactKey,
  pub cached: bool,
}

impl CacheStatus<'_> {
  /// The key alone goes to stdout; the hit/miss note goes to stderr.
  pub fn emit(&self, output: OutputFormat) -> anyhow::Result<()> {
    if output.is_json() {
      return print_json(self);
    }
    println!("{}", self.key);
    if self.cached {
      eprintln!("{}", self.note().if_supports_color(Stream::Stderr, |s| s.green()));
    } else {
      eprintln!("{}", self.note().if_supports_color(Stream::Stderr, |s| s.yellow()));
    }
    Ok(())
  }

  fn note(&self) -> &'static str {
    if self.cached { "cached" } else { "not cached" }
  }
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    FAILED.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_heading(title: &str) {
  println!("{}:", title.if_supports_color(Stream::Stdout, |s| s.bold()));
}

pub fn print_stat(label: &str, value: &str) {
  // stdout is line buffered; a failed write here is a closed pipe.
  let _ = write_stat(&mut io::stdout().lock(), label, value);
}

fn write_stat(out: &mut impl Write, label: &str, value: &str) -> io::Result<()> {
  writeln!(
    out,
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  )
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Artifact archives are rarely under a kibibyte, so bytes print exactly
/// and everything larger with one decimal in binary units.
fn human_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = 0;
  while value >= 1024.0 && unit + 1 < UNITS.len() {
    value /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", value, UNITS[unit])
}

/// Whole builds run for minutes or hours; sub-second precision only matters
/// for cache hits.
fn human_duration(elapsed: Duration) -> String {
  let secs = elapsed.as_secs();
  match secs {
    0 => format!("{}ms", elapsed.subsec_millis()),
    1..60 => format!("{:.1}s", elapsed.as_secs_f64()),
    60..3600 => format!("{}m {:02}s", secs / 60, secs % 60),
    _ => format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60),
  }
}
