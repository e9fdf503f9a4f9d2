//! Custom logging setup for teannot

use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Logger that writes colored messages to the console and, optionally,
/// plain messages to a log file
pub struct TeAnnotLogger {
    console_level: LevelFilter,
    file_writer: Option<Mutex<Box<dyn Write + Send>>>,
}

impl TeAnnotLogger {
    pub fn new(verbose: bool, log_file: Option<&Path>) -> Result<Self, std::io::Error> {
        let console_level = if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };

        let file_writer = if let Some(log_path) = log_file {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(log_path)?;
            Some(Mutex::new(Box::new(file) as Box<dyn Write + Send>))
        } else {
            None
        };

        Ok(TeAnnotLogger {
            console_level,
            file_writer,
        })
    }
}

impl log::Log for TeAnnotLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.file_writer.is_some() || metadata.level() <= self.console_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let level = record.level();
        let target = record.target();
        let message = record.args();

        let colored_level = match level {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN".yellow().bold(),
            Level::Info => "INFO".green().bold(),
            Level::Debug => "DEBUG".blue().bold(),
            Level::Trace => "TRACE".purple().bold(),
        };

        let colored_message = format!(
            "[{} {} {}] {}",
            timestamp.to_string().dimmed(),
            colored_level,
            target.cyan(),
            message
        );

        let plain_message = format!("[{} {} {}] {}", timestamp, level, target, message);

        if level == Level::Error {
            eprintln!("{}", colored_message);
        } else if level <= self.console_level {
            // converters stream records to stdout, so diagnostics go to stderr
            eprintln!("{}", colored_message);
        }

        if let Some(ref file_writer) = self.file_writer {
            if let Ok(mut writer) = file_writer.lock() {
                let _ = writeln!(writer, "{}", plain_message);
                let _ = writer.flush();
            }
        }
    }

    fn flush(&self) {
        if let Some(ref file_writer) = self.file_writer {
            if let Ok(mut writer) = file_writer.lock() {
                let _ = writer.flush();
            }
        }
    }
}

/// Initialize the custom logger
pub fn init_logger(verbose: bool, log_file: Option<&Path>) -> Result<(), anyhow::Error> {
    let logger = TeAnnotLogger::new(verbose, log_file)
        .map_err(|e| anyhow::anyhow!("Failed to create logger: {}", e))?;

    log::set_boxed_logger(Box::new(logger))
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;
    log::set_max_level(LevelFilter::Debug);

    Ok(())
}
