//! Stderr logger for the `log` facade.
//!
//! Lines look like `12:04:31.207  INFO lifecycle: R101_MARKER_DETECTED ...`:
//! wall-clock time, level, and the module path with the crate prefix
//! stripped. Records from other crates are capped at `Warn` so a verbose
//! level only opens up markerlock's own diagnostics.
//!
//! The library never installs a logger; binaries call [`init_with_level`]
//! or [`init_from_env`] once at startup.

use std::io::Write;
use std::sync::OnceLock;

use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable read by [`init_from_env`]
pub const LOG_ENV: &str = "MARKERLOCK_LOG";

const CRATE_PREFIX: &str = "markerlock";

struct MarkerLogger {
    level: LevelFilter,
}

impl MarkerLogger {
    fn max_level_for(&self, target: &str) -> LevelFilter {
        if is_own_target(target) {
            self.level
        } else {
            self.level.min(LevelFilter::Warn)
        }
    }
}

impl Log for MarkerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} {:>5} {}: {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            short_target(record.target()),
            record.args()
        );
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<MarkerLogger> = OnceLock::new();

/// Install the logger at `level`; later calls keep the first level
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| MarkerLogger { level });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install the logger at the level named by `MARKERLOCK_LOG`, else `default`
pub fn init_from_env(default: LevelFilter) -> Result<(), log::SetLoggerError> {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|name| parse_level(&name))
        .unwrap_or(default);
    init_with_level(level)
}

/// Parse a level name (`off`, `error`, `warn`, `info`, `debug`, `trace`)
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn is_own_target(target: &str) -> bool {
    target == CRATE_PREFIX || target.starts_with("markerlock::")
}

/// `markerlock::core::lifecycle` → `lifecycle`; foreign targets unchanged
fn short_target(target: &str) -> &str {
    if !is_own_target(target) {
        return target;
    }
    target.rsplit("::").next().unwrap_or(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" WARNING "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_short_target() {
        assert_eq!(short_target("markerlock::core::lifecycle"), "lifecycle");
        assert_eq!(short_target("markerlock"), "markerlock");
        assert_eq!(short_target("hyper::proto"), "hyper::proto");
    }

    #[test]
    fn test_foreign_targets_capped_at_warn() {
        let logger = MarkerLogger {
            level: LevelFilter::Debug,
        };
        assert_eq!(logger.max_level_for("markerlock::core::trust"), LevelFilter::Debug);
        assert_eq!(logger.max_level_for("axum::serve"), LevelFilter::Warn);

        let quiet = MarkerLogger {
            level: LevelFilter::Error,
        };
        assert_eq!(quiet.max_level_for("axum::serve"), LevelFilter::Error);
    }
}
