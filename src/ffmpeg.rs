use std::ffi::OsString;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, error};

/// How many trailing stderr lines are kept in error messages.
const STDERR_TAIL_LINES: usize = 12;

#[derive(Error, Debug)]
pub enum FfmpegError {
    #[error("failed to spawn {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{bin} exited with {status}: {stderr}")]
    Failed {
        bin: String,
        status: String,
        stderr: String,
    },
}

/// Run a tool to completion, capturing stderr for error reporting.
///
/// `Command::output` waits on the child, so the process is reaped on every path.
pub fn run(bin: &str, args: &[OsString]) -> Result<Vec<u8>, FfmpegError> {
    debug!(
        "Running {} {}",
        bin,
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );
    let output = Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| FfmpegError::Spawn {
            bin: bin.to_string(),
            source,
        })?;

    if !output.status.success() {
        let stderr = stderr_tail(&output.stderr);
        error!("{} failed ({}): {}", bin, output.status, stderr);
        return Err(FfmpegError::Failed {
            bin: bin.to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }
    Ok(output.stdout)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

/// Format seconds for filter expressions and `-t` arguments.
pub fn secs(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Escape an unquoted filter option value (file path, font name) for use inside
/// `-filter_complex`: once for the option parser, once for the graph parser.
pub fn escape_filter_value(s: &str) -> String {
    let mut option_level = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option_level.push('\\');
        }
        option_level.push(c);
    }
    let mut graph_level = String::with_capacity(option_level.len());
    for c in option_level.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph_level.push('\\');
        }
        graph_level.push(c);
    }
    graph_level
}

/// `enable=` expression active on the half-open window `[start, end)`.
pub fn window_expr(start: f64, end: f64) -> String {
    format!("gte(t\\,{})*lt(t\\,{})", secs(start), secs(end))
}
