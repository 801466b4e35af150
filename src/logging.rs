use colored::{Color, Colorize};
use log::{Level, LevelFilter, Metadata, Record};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Crate targets are logged at every level, dependencies only at warn and above
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Colored, timestamped stderr logger; stdout stays free for hook results
struct HookLogger;

impl log::Log for HookLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
            && (metadata.target().starts_with(CRATE_TARGET) || metadata.level() <= Level::Warn)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let start = START_TIME.get_or_init(Instant::now);
        let ts_compact = format_elapsed(start.elapsed());

        let (color, level_char) = match record.level() {
            Level::Error => (Color::BrightRed, 'E'),
            Level::Warn => (Color::BrightYellow, 'W'),
            Level::Info => (Color::BrightGreen, 'I'),
            Level::Debug => (Color::BrightBlue, 'D'),
            Level::Trace => (Color::BrightBlack, 'T'),
        };
        let module = record
            .module_path()
            .unwrap_or("unknown")
            .split("::")
            .last()
            .unwrap_or("unknown");
        let module_display = if module.len() > 12 { &module[..12] } else { module };

        let line = format!(
            "{} [{}] {:>12} | {}",
            ts_compact,
            level_char,
            module_display,
            record.args()
        );
        eprintln!("{}", line.as_str().color(color));
    }

    fn flush(&self) {}
}

static LOGGER: HookLogger = HookLogger;

/// Compact time since start: `  1.234s`, ` 2m05s`, ` 1h02m`
fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    if seconds < 60 {
        format!("{:>3}.{:03}s", seconds, millis)
    } else if seconds < 3600 {
        format!("{:>2}m{:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{:>2}h{:02}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// Install the logger at `level`
pub fn init_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let _ = START_TIME.set(Instant::now());
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Level from `-v`/`-q` counts: info by default, debug with `-v`, trace beyond
pub fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Parse a level name such as `PIO_OTA_LOG=debug`
pub fn level_from_str(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}
