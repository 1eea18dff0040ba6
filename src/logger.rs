//! Diagnostics logger behind the `log` facade. Writes one line per record
//! to stderr with a fixed level prefix, keeping stdout for the trace and
//! the report.

use std::io::Write;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

const P_ERROR: &str = "[ERROR]";
const P_WARN: &str = "[WARN ]";
const P_INFO: &str = "[INFO ]";
const P_DEBUG: &str = "[DEBUG]";
const P_TRACE: &str = "[TRACE]";

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

fn prefix(level: Level) -> &'static str {
    match level {
        Level::Error => P_ERROR,
        Level::Warn => P_WARN,
        Level::Info => P_INFO,
        Level::Debug => P_DEBUG,
        Level::Trace => P_TRACE,
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        let _ = writeln!(
            std::io::stderr().lock(),
            "{} {} ({}): {}",
            prefix(record.level()),
            record.target(),
            thread.name().unwrap_or("?"),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs the logger. Fails if another logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_level_has_an_aligned_prefix() {
        let levels = [Level::Error, Level::Warn, Level::Info, Level::Debug, Level::Trace];
        assert!(levels.iter().all(|&l| prefix(l).len() == 7));
    }
}
