//! Result and error rendering shared by every subcommand.
//!
//! A command builds one serializable report and passes it to [`render_mode`]
//! together with a `key=value` renderer and a human renderer. JSON needs no
//! renderer of its own.
//!
//! The mode comes from `--format` (or the hidden `--json`), then the
//! `MPSIM_FORMAT` variable, then whether stdout is a terminal. Reports go to
//! stdout and errors to stderr, both in the chosen mode.

use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use mpsim_core::{ErrorCode, SimError};

/// Width of the rule under pretty section headings.
pub const RULE_WIDTH: usize = 72;

pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}", "-".repeat(RULE_WIDTH))
}

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// One `Key:   value` line with the key padded to a fixed column.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Sections and aligned key/value lines for terminals.
    Pretty,
    /// One `key=value` record per line for pipes and scripts.
    Text,
    /// A single JSON document.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

fn pick_mode(flag: Option<OutputMode>, json: bool, env: Option<&str>, tty: bool) -> OutputMode {
    flag.or_else(|| json.then_some(OutputMode::Json))
        .or_else(|| env.and_then(|v| OutputMode::from_str(v.trim(), true).ok()))
        .unwrap_or(if tty {
            OutputMode::Pretty
        } else {
            OutputMode::Text
        })
}

/// Resolve the output mode for this process.
pub fn resolve_output_mode(flag: Option<OutputMode>, json: bool) -> OutputMode {
    let env = std::env::var("MPSIM_FORMAT").ok();
    pick_mode(flag, json, env.as_deref(), io::stdout().is_terminal())
}

/// Write `value` to stdout in `mode`.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text(value, &mut out)?,
        OutputMode::Pretty => pretty(value, &mut out)?,
    }
    out.flush()?;
    Ok(())
}

/// Failure report shown to the user.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// `E####` code of the underlying [`SimError`], if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Flatten `err` and attach the code and hint of the outermost
    /// [`SimError`] in its chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|e| e.downcast_ref::<SimError>())
            .map(SimError::code);
        Self {
            message: format!("{err:#}"),
            hint: code.and_then(ErrorCode::hint).map(str::to_string),
            error_code: code.map(|c| c.code().to_string()),
        }
    }

    fn write_to(&self, mode: OutputMode, w: &mut dyn Write) -> io::Result<()> {
        if mode.is_json() {
            serde_json::to_writer_pretty(&mut *w, &serde_json::json!({ "error": self }))?;
            return writeln!(w);
        }
        match &self.error_code {
            Some(code) => writeln!(w, "error[{code}]: {}", self.message)?,
            None => writeln!(w, "error: {}", self.message)?,
        }
        if let Some(hint) = &self.hint {
            writeln!(w, "hint: {hint}")?;
        }
        Ok(())
    }
}

/// Write `error` to stderr in `mode`.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    error.write_to(mode, &mut io::stderr().lock())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_beats_everything() {
        let mode = pick_mode(Some(OutputMode::Text), true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn json_flag_beats_env() {
        assert_eq!(pick_mode(None, true, Some("text"), true), OutputMode::Json);
    }

    #[test]
    fn env_is_case_insensitive() {
        assert_eq!(pick_mode(None, false, Some("JSON"), true), OutputMode::Json);
        assert_eq!(pick_mode(None, false, Some(" Text "), true), OutputMode::Text);
    }

    #[test]
    fn unknown_env_falls_back_to_terminal_check() {
        assert_eq!(pick_mode(None, false, Some("yaml"), true), OutputMode::Pretty);
        assert_eq!(pick_mode(None, false, None, false), OutputMode::Text);
    }

    #[test]
    fn sim_errors_carry_code_and_hint() {
        let err = anyhow::Error::new(SimError::StateNotFound("[9, 1]".into()))
            .context("fixation run failed");
        let cli = CliError::from_anyhow(&err);
        assert_eq!(cli.error_code.as_deref(), Some("E2001"));
        assert!(cli.hint.is_some());
        assert!(cli.message.starts_with("fixation run failed: "));
        assert!(cli.message.contains("[9, 1]"));
    }

    #[test]
    fn plain_errors_have_no_code() {
        let cli = CliError::from_anyhow(&anyhow::anyhow!("disk full"));
        assert_eq!(cli.error_code, None);
        assert_eq!(cli.hint, None);
        assert_eq!(cli.message, "disk full");
    }

    #[test]
    fn text_error_layout() {
        let cli = CliError {
            message: "boom".into(),
            hint: Some("try again".into()),
            error_code: Some("E4001".into()),
        };
        let mut buf = Vec::new();
        cli.write_to(OutputMode::Text, &mut buf).expect("write");
        let text = String::from_utf8(buf).expect("utf-8");
        assert_eq!(text, "error[E4001]: boom\nhint: try again\n");
    }

    #[test]
    fn json_error_is_wrapped() {
        let cli = CliError::from_anyhow(&anyhow::anyhow!("disk full"));
        let mut buf = Vec::new();
        cli.write_to(OutputMode::Json, &mut buf).expect("write");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["error"]["message"], "disk full");
        assert!(value["error"].get("hint").is_none());
    }
}
