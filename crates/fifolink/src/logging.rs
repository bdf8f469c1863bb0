use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Per-target filter directives that override `--log-level`,
/// e.g. `FIFOLINK_LOG=fifolink_frame=debug,warn`.
pub const LOG_FILTER_ENV: &str = "FIFOLINK_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Filter from `directives` when they parse, else a plain `level` filter.
fn build_filter(level: LogLevel, directives: Option<&str>) -> EnvFilter {
    let fallback = || EnvFilter::default().add_directive(level.as_filter().into());

    match directives.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives).unwrap_or_else(|err| {
            eprintln!("warning: ignoring {LOG_FILTER_ENV}: {err}");
            fallback()
        }),
        None => fallback(),
    }
}

/// Install the stderr subscriber. stdout is reserved for received messages.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(LOG_FILTER_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, directives.as_deref()))
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(LogLevel::Error.as_filter(), LevelFilter::ERROR);
        assert_eq!(LogLevel::Trace.as_filter(), LevelFilter::TRACE);
        assert!(LogLevel::Warn.as_filter() < LogLevel::Debug.as_filter());
    }

    #[test]
    fn level_applies_without_directives() {
        let filter = build_filter(LogLevel::Warn, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));

        let blank = build_filter(LogLevel::Error, Some("  "));
        assert_eq!(blank.max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn directives_override_level() {
        let filter = build_filter(LogLevel::Error, Some("fifolink_frame=debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
        assert!(filter.to_string().contains("fifolink_frame=debug"));
    }
}
