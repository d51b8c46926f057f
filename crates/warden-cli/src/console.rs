//! CLI console utilities

use colored::*;
use std::io::Write;
use warden_core::{LogEvent, LogKind, OutputChunk, OutputStream};

/// Formatted status output; command output itself goes to stdout untouched
pub struct CliConsole {
    verbose: bool,
}

impl CliConsole {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.verbose {
            eprintln!("{} {}", "ℹ".blue().bold(), message);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green().bold(), message.green());
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }

    /// Print a header
    pub fn print_header(&self, title: &str) {
        println!();
        println!("{}", title.bold().underline());
        println!("{}", "=".repeat(title.len()).dimmed());
    }

    /// Render an engine log event
    pub fn event(&self, event: &LogEvent) {
        let time = event.timestamp.format("%H:%M:%S").to_string();
        let tag = format!("[{}]", event.kind).bold();
        let tag = match event.kind {
            LogKind::Info | LogKind::Command if !self.verbose => return,
            LogKind::Info => tag.blue(),
            LogKind::Command => tag.dimmed(),
            LogKind::Success => tag.green(),
            LogKind::Warning => tag.yellow(),
            LogKind::Error => tag.red(),
            LogKind::Security => tag.magenta(),
            LogKind::Server => tag.cyan(),
        };
        eprintln!("{} {} {}", time.dimmed(), tag, event.message);
    }
}

/// Forward live output to our own stdout/stderr
pub fn print_chunk(chunk: &OutputChunk) {
    match chunk.stream {
        OutputStream::Stdout => {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(chunk.text.as_bytes());
            let _ = out.flush();
        }
        OutputStream::Stderr => {
            let mut err = std::io::stderr().lock();
            let _ = err.write_all(chunk.text.as_bytes());
            let _ = err.flush();
        }
    }
}
