//! Pipeline logging.
//!
//! Compact timestamped output with per-target level configuration.
//! `RUST_LOG` overrides whatever the settings file says.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "info"
//!
//! [logging.modules]
//! "labelwatch::pipeline" = "debug"
//! ```
//!
//! # Environment Variable
//!
//! ```bash
//! RUST_LOG=debug labelwatch watch
//! RUST_LOG=labelwatch::pipeline::lock=trace labelwatch watch
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the `EnvFilter` directive string for a logging config.
pub fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.default.clone();
    for (target, level) in &config.modules {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Initialize logging with configuration.
///
/// Only the first call takes effect. A `verbose` flag raises the default
/// level to `info` so pipeline transitions show up without editing config.
pub fn init_with_config(config: &LoggingConfig, verbose: bool) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if verbose && config.default == "warn" {
            let mut raised = config.clone();
            raised.default = "info".to_string();
            EnvFilter::new(filter_directives(&raised))
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_timer(CompactTime)
            .with_level(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Log a pipeline event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("pipeline", "processed", "{}", path.display());
/// log_event!("watcher", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("lock", "released", "{}", marker.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_appends_modules() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("labelwatch::pipeline".to_string(), "debug".to_string());
        config
            .modules
            .insert("notify".to_string(), "error".to_string());

        // BTreeMap keeps targets ordered
        assert_eq!(
            filter_directives(&config),
            "warn,labelwatch::pipeline=debug,notify=error"
        );
    }

    #[test]
    fn test_filter_directives_default_only() {
        assert_eq!(filter_directives(&LoggingConfig::default()), "warn");
    }
}
