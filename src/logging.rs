// Logging module for gitpress
// Provides structured logging with timestamp formatting and multiple output formats
//
// - Output formats: Text and JSON lines
// - Destinations: Console, File, or Both
// - Independent log levels for console and file output
// - Timestamps formatted as YYYY-MM-DD HH:mm:ss
// - Lines emitted by plugin scripts carry their log target in the JSON detail field
//
// Example usage:
// ```
// let config = LogConfig {
//     console_level: LevelFilter::Info,
//     file_level: Some(LevelFilter::Debug),
//     format: LogFormat::Json,
//     destination: LogDestination::Both(PathBuf::from("gitpress.log")),
//     enable_colours: false,
// };
// init_logger(config)?;
// log::info!("Application started");
// ```

use log::{Level, LevelFilter};
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use anyhow::{Context, Result};
use crate::plugin::engine::SCRIPT_LOG_TARGET;

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}. Valid options: text, json", s)),
        }
    }
}

/// Log destination options
#[derive(Debug, Clone, PartialEq)]
pub enum LogDestination {
    Console,
    File(PathBuf),
    Both(PathBuf),
}

/// JSON log entry structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLogEntry {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_level: LevelFilter,
    pub file_level: Option<LevelFilter>,
    pub format: LogFormat,
    pub destination: LogDestination,
    /// Colour the level tag of console text lines
    pub enable_colours: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Info,
            file_level: None,
            format: LogFormat::Text,
            destination: LogDestination::Console,
            enable_colours: false,
        }
    }
}

/// Custom logger implementation
pub struct GitpressLogger {
    config: LogConfig,
}

impl GitpressLogger {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    fn format_timestamp() -> String {
        let now: DateTime<Local> = Local::now();
        now.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn level_tag(&self, level: Level, coloured: bool) -> String {
        let tag = level.to_string().to_uppercase();
        if !coloured {
            return tag;
        }
        match level {
            Level::Error => tag.red().bold().to_string(),
            Level::Warn => tag.yellow().to_string(),
            Level::Info => tag.green().to_string(),
            Level::Debug => tag.blue().to_string(),
            Level::Trace => tag.dimmed().to_string(),
        }
    }

    fn format_text_message(&self, level: Level, target: &str, message: &str, coloured: bool) -> String {
        let timestamp = Self::format_timestamp();
        let tag = self.level_tag(level, coloured);
        if target == SCRIPT_LOG_TARGET {
            format!("{} [{}] script: {}", timestamp, tag, message)
        } else {
            format!("{} [{}] {}", timestamp, tag, message)
        }
    }

    fn format_json_message(&self, level: Level, target: &str, message: &str) -> Result<String> {
        let detail = (target == SCRIPT_LOG_TARGET).then(|| serde_json::json!({ "target": target }));
        let entry = JsonLogEntry {
            timestamp: Self::format_timestamp(),
            level: level.to_string().to_uppercase(),
            message: message.to_string(),
            detail,
        };

        serde_json::to_string(&entry)
            .context("Failed to serialize log entry to JSON")
    }

    fn format_message(&self, record: &log::Record, coloured: bool) -> String {
        let message = record.args().to_string();
        let level = record.level();
        let target = record.target();

        match self.config.format {
            LogFormat::Text => self.format_text_message(level, target, &message, coloured),
            LogFormat::Json => match self.format_json_message(level, target, &message) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("JSON formatting error: {}. Falling back to text format.", e);
                    self.format_text_message(level, target, &message, false)
                }
            },
        }
    }

    fn should_log_to_console(&self, level: Level) -> bool {
        level <= self.config.console_level
    }

    fn should_log_to_file(&self, level: Level) -> bool {
        if let Some(file_level) = self.config.file_level {
            level <= file_level
        } else {
            false
        }
    }

    fn write_to_console(&self, formatted_message: &str) -> Result<()> {
        writeln!(io::stderr(), "{}", formatted_message)
            .context("Failed to write to console")
    }

    fn write_to_file(&self, formatted_message: &str, file_path: &PathBuf) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .with_context(|| format!("Failed to open log file: {}", file_path.display()))?;

        writeln!(file, "{}", formatted_message)
            .context("Failed to write to log file")
    }

    fn console(&self, record: &log::Record) {
        if self.should_log_to_console(record.level()) {
            let line = self.format_message(record, self.config.enable_colours);
            if let Err(e) = self.write_to_console(&line) {
                eprintln!("Console logging error: {}", e);
            }
        }
    }
}

impl log::Log for GitpressLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.should_log_to_console(metadata.level()) ||
        self.should_log_to_file(metadata.level())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match &self.config.destination {
            LogDestination::Console => self.console(record),
            LogDestination::File(path) => {
                if self.should_log_to_file(record.level()) {
                    let line = self.format_message(record, false);
                    if let Err(e) = self.write_to_file(&line, path) {
                        eprintln!("File logging error: {}. Falling back to console.", e);
                        if let Err(console_err) = self.write_to_console(&line) {
                            eprintln!("Console fallback error: {}", console_err);
                        }
                    }
                }
            }
            LogDestination::Both(path) => {
                self.console(record);
                if self.should_log_to_file(record.level()) {
                    let line = self.format_message(record, false);
                    if let Err(e) = self.write_to_file(&line, path) {
                        eprintln!("File logging error: {}", e);
                    }
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logger(config: LogConfig) -> Result<()> {
    let max_level = match config.file_level {
        Some(file_level) => file_level.max(config.console_level),
        None => config.console_level,
    };

    log::set_boxed_logger(Box::new(GitpressLogger::new(config)))
        .context("Failed to set global logger")?;

    log::set_max_level(max_level);

    Ok(())
}

/// Convert string to LevelFilter
pub fn parse_log_level(level_str: &str) -> Result<LevelFilter> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        "off" => Ok(LevelFilter::Off),
        _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels: error, warn, info, debug, trace, off", level_str)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("invalid".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("error").unwrap(), LevelFilter::Error);
        assert_eq!(parse_log_level("warn").unwrap(), LevelFilter::Warn);
        assert_eq!(parse_log_level("info").unwrap(), LevelFilter::Info);
        assert_eq!(parse_log_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_log_level("trace").unwrap(), LevelFilter::Trace);
        assert_eq!(parse_log_level("ERROR").unwrap(), LevelFilter::Error);
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_timestamp_format() {
        let timestamp = GitpressLogger::format_timestamp();
        // YYYY-MM-DD HH:MM:SS
        assert!(timestamp.len() >= 19);
        assert!(timestamp.chars().nth(4) == Some('-'));
        assert!(timestamp.chars().nth(7) == Some('-'));
        assert!(timestamp.chars().nth(10) == Some(' '));
        assert!(timestamp.chars().nth(13) == Some(':'));
        assert!(timestamp.chars().nth(16) == Some(':'));
    }

    #[test]
    fn test_json_log_entry_serialization() {
        let entry = JsonLogEntry {
            timestamp: "2026-10-18 14:30:45".to_string(),
            level: "INFO".to_string(),
            message: "Test message".to_string(),
            detail: None,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""timestamp":"2026-10-18 14:30:45""#));
        assert!(json.contains(r#""level":"INFO""#));
        assert!(json.contains(r#""message":"Test message""#));
        assert!(!json.contains(r#""detail""#));
    }

    #[test]
    fn test_text_message_formatting() {
        let logger = GitpressLogger::new(LogConfig::default());

        let formatted = logger.format_text_message(Level::Info, "gitpress::app", "Test message", false);
        assert!(formatted.contains("[INFO] Test message"));

        let formatted = logger.format_text_message(Level::Info, SCRIPT_LOG_TARGET, "hello", false);
        assert!(formatted.contains("[INFO] script: hello"));
    }

    #[test]
    fn test_json_message_formatting() {
        let logger = GitpressLogger::new(LogConfig::default());

        let formatted = logger.format_json_message(Level::Info, "gitpress", "Test message").unwrap();
        assert!(formatted.contains(r#""level":"INFO""#));
        assert!(formatted.contains(r#""message":"Test message""#));
        assert!(!formatted.contains("detail"));

        let formatted = logger.format_json_message(Level::Debug, SCRIPT_LOG_TARGET, "from script").unwrap();
        assert!(formatted.contains(r#""detail":{"target":"gitpress::script"}"#));
    }
}
