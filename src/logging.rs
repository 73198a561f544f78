/**
 * Log sink setup
 *
 * Entries are rendered `[<timestamp>] <message>` and written whole, so
 * concurrent workers never interleave inside an entry.
 */

use anyhow::{Context, Result};
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Configure `env_logger` from the `-v` count; `RUST_LOG` still applies on top.
///
/// With `log_file` set, entries are appended to that file instead of stderr.
pub fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let line = log_line(buf.timestamp_millis(), record.args());
            writeln!(buf, "{}", line)
        });

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init().context("Failed to initialize logger")?;
    Ok(())
}

fn log_line(timestamp: impl Display, message: impl Display) -> String {
    format!("[{}] {}", timestamp, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_format() {
        assert_eq!(
            log_line("2021-03-09T10:15:00.000Z", "Renamed \"a\" -> \"b\""),
            "[2021-03-09T10:15:00.000Z] Renamed \"a\" -> \"b\""
        );
    }
}
