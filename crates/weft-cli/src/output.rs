//! Outcome rendering shared by every command.
//!
//! Every command prints exactly one [`Outcome`]. JSON mode serializes it
//! as-is to stdout. Text mode prints the payload through a per-command
//! closure, then any warnings; failures go to stderr.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json`
//! 2. `WEFT_FORMAT` env var → `"text"` | `"json"`
//! 3. Default: [`OutputMode::Text`]

use serde::Serialize;
use std::io::{self, Write};
use weft_core::Outcome;

/// Shared width for text separators.
pub const RULE_WIDTH: usize = 60;

/// Write a section heading followed by a separator.
pub fn section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    writeln!(w, "{:-<width$}", "", width = RULE_WIDTH)
}

/// Render a left-aligned key/value line.
pub fn kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Short plain text for terminals and pipes.
    Text,
    /// The outcome envelope as pretty JSON.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

fn resolve_output_mode_inner(json_flag: bool, format_env: Option<&str>) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    match format_env.map(str::to_lowercase).as_deref() {
        Some("json") => OutputMode::Json,
        _ => OutputMode::Text,
    }
}

/// Resolve the output mode from the `--json` flag and `WEFT_FORMAT`.
pub fn resolve_output_mode(json_flag: bool) -> OutputMode {
    let env_val = std::env::var("WEFT_FORMAT").ok();
    resolve_output_mode_inner(json_flag, env_val.as_deref())
}

/// Write `outcome` in the requested mode. Returns whether it succeeded.
pub fn render_outcome<T: Serialize>(
    mode: OutputMode,
    outcome: &Outcome<T>,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<bool> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, outcome)?;
            writeln!(out)?;
        }
        OutputMode::Text => {
            if let Some(data) = &outcome.data {
                text_fn(data, &mut out)?;
            }
            for warning in &outcome.warnings {
                writeln!(out, "warning: {warning}")?;
            }
            if let Some(error) = &outcome.error {
                let stderr = io::stderr();
                let mut err = stderr.lock();
                writeln!(
                    err,
                    "error[{}] {}: {}",
                    error.error_code, error.code, error.message
                )?;
                if let Some(hint) = error.hint {
                    writeln!(err, "  hint: {hint}")?;
                }
            }
        }
    }
    Ok(outcome.success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_wins_over_env() {
        assert_eq!(resolve_output_mode_inner(true, Some("text")), OutputMode::Json);
    }

    #[test]
    fn env_selects_json_case_insensitively() {
        assert_eq!(resolve_output_mode_inner(false, Some("JSON")), OutputMode::Json);
    }

    #[test]
    fn unknown_env_falls_back_to_text() {
        assert_eq!(resolve_output_mode_inner(false, Some("fancy")), OutputMode::Text);
        assert_eq!(resolve_output_mode_inner(false, None), OutputMode::Text);
    }

    #[test]
    fn kv_pads_key_column() {
        let mut buf = Vec::new();
        kv(&mut buf, "id", "note-1a2b3c4d").expect("write");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "id:          note-1a2b3c4d\n");
    }

    #[test]
    fn render_reports_failure() {
        let outcome: Outcome<()> = Outcome::failed("undo", &weft_core::WeftError::NoHistory);
        let ok = render_outcome(OutputMode::Json, &outcome, |(), _| Ok(())).expect("render");
        assert!(!ok);
    }
}
