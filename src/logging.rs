//! Process-wide logging setup

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE_NAME: &str = "orbit_engine.log";

/// Where log lines go (`--log=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTarget {
    #[default]
    Console,
    File,
    Both,
}

impl LogTarget {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "console" => Some(LogTarget::Console),
            "file" => Some(LogTarget::File),
            "both" => Some(LogTarget::Both),
            _ => None,
        }
    }

    fn console(self) -> bool {
        matches!(self, LogTarget::Console | LogTarget::Both)
    }

    fn file(self) -> bool {
        matches!(self, LogTarget::File | LogTarget::Both)
    }
}

/// Minimum level (`--log-level=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Initialize logging for the engine. `RUST_LOG` overrides `level`.
/// Returns false if a subscriber was already installed.
pub fn init(target: LogTarget, level: LogLevel) -> bool {
    init_in(target, level, Path::new("."))
}

/// Same as [`init`] with the log file placed in `dir`
pub fn init_in(target: LogTarget, level: LogLevel, dir: &Path) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.as_filter().into());

    let console_layer = target
        .console()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    let file_layer = if target.file() {
        match File::create(dir.join(LOG_FILE_NAME)) {
            Ok(file) => Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            Err(e) => {
                eprintln!("Failed to open {}: {}", LOG_FILE_NAME, e);
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
}
