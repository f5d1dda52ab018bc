//! Log formatting and console output with ANSI colors
//!
//! Handles:
//! - Colorized console output with tag and level formatting
//! - Broken pipe handling for piped commands
//! - Records from other crates (their target becomes the tag)

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stderr, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 10;
const LOG_TYPE_WIDTH: usize = 8;

/// Console backend installed behind the `log` facade
pub struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        // Filtering already happened in core::should_log for our own tags
        true
    }

    fn log(&self, record: &log::Record) {
        let tag = LogTag::from_target(record.target());
        let level = LogLevel::from_log_level(record.level());
        format_and_log(&tag, level, &record.args().to_string());
    }

    fn flush(&self) {
        let _ = stderr().flush();
    }
}

/// Install the console logger as the global `log` backend
///
/// Returns false when another backend was installed first.
pub fn install() -> bool {
    match log::set_boxed_logger(Box::new(ConsoleLogger)) {
        Ok(()) => {
            log::set_max_level(log::LevelFilter::Trace);
            true
        }
        Err(_) => false,
    }
}

/// Format and output a log line
pub fn format_and_log(tag: &LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        format_tag(tag),
        format_log_type(level),
        message
    );
    print_stderr_safe(&line);
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Cache => label.bright_cyan().bold(),
        LogTag::Metadata => label.bright_blue().bold(),
        LogTag::Settings => label.bright_magenta().bold(),
        LogTag::Chain => label.bright_green().bold(),
        LogTag::Address => label.bright_purple().bold(),
        LogTag::Balances => label.bright_green().bold(),
        LogTag::Other(_) => label.white().bold(),
    }
}

/// Format log type with appropriate color
fn format_log_type(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LOG_TYPE_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug | LogLevel::Verbose => label.dimmed(),
    }
}

/// Print to stderr but ignore broken pipe errors
fn print_stderr_safe(message: &str) {
    if let Err(e) = writeln!(stderr(), "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}
