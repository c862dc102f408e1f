//! Extraction and fetch progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts. Human mode is the default on a TTY; `off` otherwise.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Extraction: n documents written so far for this layer.
    Extracting { layer: String, written: u64 },
    /// Bulk fetch: one page completed, with the running record count.
    Fetching {
        layer: String,
        page: u64,
        total: u64,
    },
}

/// Reports pipeline progress. Implementations write to stderr.
pub trait ProgressReporter {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress: `extract kr_hff  3,000 documents written`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Extracting { layer, written } => {
                format!(
                    "extract {}  {} documents written\n",
                    layer,
                    format_number(*written)
                )
            }
            ProgressEvent::Fetching { layer, page, total } => {
                format!(
                    "fetch {}  page {}  {} records\n",
                    layer,
                    page,
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Extracting { layer, written } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "layer": layer,
                "written": written
            }),
            ProgressEvent::Fetching { layer, page, total } => serde_json::json!({
                "event": "progress",
                "phase": "fetching",
                "layer": layer,
                "page": page,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
