//! Terminal output for nestack commands.
//!
//! Results go to stdout, problems to stderr. Colors are applied only when the
//! target stream supports them, so piped output stays plain.

use std::time::{Duration, UNIX_EPOCH};

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use nestack_lib::util::hash::ContentHash;

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

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
  pub const ADD: &str = "+";
}

/// Digest prefix shown in status output.
pub const DIGEST_DISPLAY_LEN: usize = 12;

#[derive(Debug, Clone, Copy)]
enum Tone {
  Success,
  Error,
  Warning,
  Info,
}

impl Tone {
  fn symbol(self) -> &'static str {
    match self {
      Tone::Success => symbols::SUCCESS,
      Tone::Error => symbols::ERROR,
      Tone::Warning => symbols::WARNING,
      Tone::Info => symbols::INFO,
    }
  }

  fn stream(self) -> Stream {
    match self {
      Tone::Success | Tone::Info => Stream::Stdout,
      Tone::Error | Tone::Warning => Stream::Stderr,
    }
  }

  /// Errors and warnings color the whole line, the rest only the symbol.
  fn line(self, message: &str) -> String {
    let stream = self.stream();
    let symbol = self.symbol();
    match self {
      Tone::Success => format!("{} {}", symbol.if_supports_color(stream, |s| s.green()), message),
      Tone::Info => format!("{} {}", symbol.if_supports_color(stream, |s| s.blue()), message),
      Tone::Error => format!(
        "{} {}",
        symbol.if_supports_color(stream, |s| s.red()),
        message.if_supports_color(stream, |s| s.red())
      ),
      Tone::Warning => format!(
        "{} {}",
        symbol.if_supports_color(stream, |s| s.yellow()),
        message.if_supports_color(stream, |s| s.yellow())
      ),
    }
  }

  fn print(self, message: &str) {
    let line = self.line(message);
    match self.stream() {
      Stream::Stdout => println!("{}", line),
      _ => eprintln!("{}", line),
    }
  }
}

pub fn print_success(message: &str) {
  Tone::Success.print(message);
}

pub fn print_error(message: &str) {
  Tone::Error.print(message);
}

pub fn print_warning(message: &str) {
  Tone::Warning.print(message);
}

pub fn print_info(message: &str) {
  Tone::Info.print(message);
}

/// An indented `label: value` line under a status message.
pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()), value);
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

pub fn short_digest(digest: &ContentHash) -> &str {
  digest.short(DIGEST_DISPLAY_LEN)
}

/// Rendered template size, in binary units.
pub fn format_size(len: usize) -> String {
  const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];

  if len < 1024 {
    return format!("{} B", len);
  }
  let mut value = len as f64 / 1024.0;
  let mut unit = UNITS[0];
  for next in &UNITS[1..] {
    if value < 1024.0 {
      break;
    }
    value /= 1024.0;
    unit = next;
  }
  format!("{:.1} {}", value, unit)
}

/// Elapsed time at millisecond precision, e.g. `1m 5s 20ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
  humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string()
}

/// Seconds since the epoch as an RFC 3339 UTC timestamp.
pub fn format_timestamp(unix_secs: u64) -> String {
  humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_secs(unix_secs)).to_string()
}
