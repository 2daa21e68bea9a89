//! User-facing console messages.
//! Logs go through tracing on stderr; this module prints the few lines meant
//! for the person (or script) running the binary. Colours only on a TTY.

use owo_colors::OwoColorize;
use serde::Serialize;

use crate::fs_ops::format_bytes;
use crate::orchestrator::RunSummary;

#[derive(Clone, Copy)]
enum Label {
    Info,
    Warn,
    Error,
    Ok,
}

fn is_tty(stderr: bool) -> bool {
    if stderr {
        atty::is(atty::Stream::Stderr)
    } else {
        atty::is(atty::Stream::Stdout)
    }
}

fn emit(label: Label, msg: &str) {
    let to_stderr = matches!(label, Label::Warn | Label::Error);
    let prefix = match label {
        Label::Info => "info:",
        Label::Warn => "warn:",
        Label::Error => "error:",
        Label::Ok => "ok:",
    };
    let line = if is_tty(to_stderr) {
        let colored = match label {
            Label::Info => prefix.cyan().bold().to_string(),
            Label::Warn => prefix.yellow().bold().to_string(),
            Label::Error => prefix.red().bold().to_string(),
            Label::Ok => prefix.green().bold().to_string(),
        };
        format!("{colored} {msg}")
    } else {
        format!("{prefix} {msg}")
    };
    if to_stderr {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

pub fn print_info(msg: &str) {
    emit(Label::Info, msg);
}

pub fn print_warn(msg: &str) {
    emit(Label::Warn, msg);
}

pub fn print_error(msg: &str) {
    emit(Label::Error, msg);
}

pub fn print_success(msg: &str) {
    emit(Label::Ok, msg);
}

/// One human line describing a finished run.
pub fn summary_line(summary: &RunSummary, dry_run: bool) -> String {
    let verb = if dry_run { "Would move" } else { "Moved" };
    format!(
        "{verb} {} entries ({}) in {:.1}s at {}/s; {} failed",
        summary.moved_count,
        format_bytes(summary.total_bytes),
        summary.elapsed_secs,
        format_bytes(summary.avg_throughput as u64),
        summary.failed_count
    )
}

pub fn print_summary(summary: &RunSummary, dry_run: bool) {
    let line = summary_line(summary, dry_run);
    if summary.failed_count > 0 {
        print_warn(&line);
    } else {
        print_success(&line);
    }
}

/// Compact JSON on stdout, for notification tooling.
pub fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_mentions_counts() {
        let s = RunSummary {
            moved_count: 4,
            failed_count: 1,
            total_bytes: 2048,
            elapsed_secs: 2.0,
            avg_throughput: 1024.0,
        };
        let line = summary_line(&s, false);
        assert!(line.starts_with("Moved 4 entries (2.00 KiB)"), "{line}");
        assert!(line.contains("1.00 KiB/s"));
        assert!(line.ends_with("1 failed"));
        assert!(summary_line(&s, true).starts_with("Would move"));
    }
}
