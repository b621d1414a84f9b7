//! # Batch Logging
//!
//! Installs the process-wide `tracing` subscriber used by mirror runs.
//!
//! ## Layers
//!
//! ```text
//! registry
//!   ├── EnvFilter          workspace crates at the configured level, deps at warn
//!   ├── HostForwardLayer   copies surviving events to a LoggerSink (optional)
//!   └── console layer      pretty | compact | json on stdout
//! ```
//!
//! Events forwarded to the host pass through [`redact_if_sensitive`] unless
//! redaction is switched off, so WooCommerce consumer keys and `Basic`
//! authorization values never leave the process in clear text.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::logging::{ConsoleLogger, LogLevel};
//! use std::sync::Arc;
//!
//! let config = LoggingConfig::default()
//!     .with_format(LogFormat::Compact)
//!     .with_level(LogLevel::Debug)
//!     .with_logger_sink(Arc::new(ConsoleLogger::default()));
//! init_logging(config)?;
//! ```

use crate::error::{Error, Result};

use bridge_traits::logging::{LogEntry, LogLevel, LoggerSink};

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Crates that follow [`LoggingConfig::level`] when no custom filter is set.
const WORKSPACE_TARGETS: &[&str] = &[
    "catalog_mirror_workspace",
    "core_runtime",
    "core_sync",
    "provider_woocommerce",
    "bridge_desktop",
];

/// Transport and database crates pinned to `warn` by the default filter.
const QUIET_DEPENDENCIES: &[&str] = &["h2", "hyper", "reqwest", "rustls", "sqlx"];

/// Field-name fragments whose values are replaced before forwarding.
const CREDENTIAL_MARKERS: &[&str] = &[
    "consumer_key",
    "consumer_secret",
    "secret",
    "password",
    "token",
    "api_key",
    "authorization",
    "credential",
];

/// Value prefixes that identify an HTTP authorization header.
const AUTH_SCHEMES: &[&str] = &["basic ", "bearer "];

const REDACTED: &str = "[REDACTED]";

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
    /// One line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Settings for [`init_logging`].
#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Overrides the generated directives entirely, e.g. `"core_sync=debug,sqlx=warn"`
    pub filter: Option<String>,
    /// Redact credential-like fields on events forwarded to the host sink
    pub redact_credentials: bool,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span open/close, useful to follow one item through a worker
    pub span_events: bool,
    pub show_target: bool,
    pub show_threads: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            redact_credentials: true,
            logger_sink: None,
            span_events: false,
            show_target: true,
            show_threads: false,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("redact_credentials", &self.redact_credentials)
            .field("logger_sink", &self.logger_sink.is_some())
            .field("span_events", &self.span_events)
            .field("show_target", &self.show_target)
            .field("show_threads", &self.show_threads)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_redaction(mut self, enabled: bool) -> Self {
        self.redact_credentials = enabled;
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn with_thread_info(mut self, show: bool) -> Self {
        self.show_threads = show;
        self
    }

    /// Directive string handed to [`EnvFilter`].
    fn directives(&self) -> String {
        if let Some(custom) = &self.filter {
            return custom.clone();
        }

        let level = self.level.as_str();
        let mut directives = vec!["warn".to_string()];
        directives.extend(WORKSPACE_TARGETS.iter().map(|t| format!("{t}={level}")));
        directives.extend(QUIET_DEPENDENCIES.iter().map(|t| format!("{t}=warn")));
        directives.join(",")
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// [`Error::Config`] when the filter does not parse or a global subscriber
/// is already set; only the first call in a process can succeed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let forward = HostForwardLayer {
        sink: config.logger_sink.clone(),
        redact: config.redact_credentials,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(forward)
        .with(console_layer(&config))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(config.directives())
        .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))
}

fn console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let spans = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(config.show_target)
        .with_thread_ids(config.show_threads)
        .with_thread_names(config.show_threads)
        .with_span_events(spans);

    match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(config.span_events)
            .boxed(),
    }
}

// ============================================================================
// Host forwarding
// ============================================================================

/// Copies events that pass the filter into the configured [`LoggerSink`].
struct HostForwardLayer {
    sink: Option<Arc<dyn LoggerSink>>,
    redact: bool,
}

impl<S> Layer<S> for HostForwardLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let metadata = event.metadata();
        let level = sink_level(metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut collector = FieldCollector::new(self.redact);
        event.record(&mut collector);

        let message = collector
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(level, metadata.target(), message);
        entry.fields.extend(collector.fields);
        if let Some(span) = ctx.lookup_current() {
            entry.fields.insert("span".to_string(), span.name().to_string());
        }

        deliver(Arc::clone(sink), entry);
    }
}

/// Hands the entry to the sink on the current runtime, or inline when the
/// event was emitted outside one.
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(e) = sink.log(entry).await {
                    eprintln!("logger sink rejected entry: {e}");
                }
            });
        }
        Err(_) => {
            if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                eprintln!("logger sink rejected entry: {e}");
            }
        }
    }
}

/// Flattens event fields into strings. Numbers and booleans reach
/// `record_debug` through the default [`Visit`] methods.
struct FieldCollector {
    redact: bool,
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldCollector {
    fn new(redact: bool) -> Self {
        Self {
            redact,
            message: None,
            fields: Vec::new(),
        }
    }

    fn push(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = Some(value);
            return;
        }

        let value = if self.redact {
            redact_if_sensitive(name, &value)
        } else {
            value
        };
        self.fields.push((name.to_string(), value));
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_owned());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

fn sink_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        Level::DEBUG => LogLevel::Debug,
        Level::TRACE => LogLevel::Trace,
    }
}

/// Returns `"[REDACTED]"` when the field name looks like a credential or the
/// value looks like an authorization header, otherwise the value unchanged.
///
/// ```ignore
/// debug!(consumer_key = %redact_if_sensitive("consumer_key", &key), "Site configured");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let name = field_name.to_ascii_lowercase();
    let value_head = value.trim_start().to_ascii_lowercase();

    let is_credential = CREDENTIAL_MARKERS.iter().any(|m| name.contains(m))
        || AUTH_SCHEMES.iter().any(|s| value_head.starts_with(s));

    if is_credential {
        REDACTED.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    #[async_trait]
    impl LoggerSink for CapturingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            LogLevel::Debug
        }
    }

    fn forward_layer(sink: &Arc<CapturingSink>, redact: bool) -> HostForwardLayer {
        let sink: Arc<dyn LoggerSink> = sink.clone();
        HostForwardLayer {
            sink: Some(sink),
            redact,
        }
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_redaction(false)
            .with_filter("core_sync=trace")
            .with_span_events(true)
            .with_target(false)
            .with_thread_info(true);

        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.redact_credentials);
        assert_eq!(config.filter.as_deref(), Some("core_sync=trace"));
        assert!(config.span_events);
        assert!(!config.show_target);
        assert!(config.show_threads);
    }

    #[test]
    fn test_default_directives() {
        let directives = LoggingConfig::default()
            .with_level(LogLevel::Debug)
            .directives();

        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("core_sync=debug"));
        assert!(directives.contains("provider_woocommerce=debug"));
        assert!(directives.contains("sqlx=warn"));
    }

    #[test]
    fn test_custom_filter_replaces_directives() {
        let config = LoggingConfig::default().with_filter("core_sync=trace,bridge_desktop=debug");
        assert_eq!(config.directives(), "core_sync=trace,bridge_desktop=debug");
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let config = LoggingConfig::default().with_filter("core_sync=[");
        assert!(matches!(build_filter(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_redact_if_sensitive() {
        assert_eq!(redact_if_sensitive("consumer_secret", "cs_123"), REDACTED);
        assert_eq!(redact_if_sensitive("Authorization", "anything"), REDACTED);
        assert_eq!(redact_if_sensitive("header", "  Basic Y2s6Y3M="), REDACTED);

        assert_eq!(redact_if_sensitive("local_index", "4"), "4");
        assert_eq!(redact_if_sensitive("name", "Basketball Shoes"), "Basketball Shoes");
    }

    #[test]
    fn test_forwarded_event_is_redacted() {
        let sink = Arc::new(CapturingSink::default());
        let subscriber = tracing_subscriber::registry().with(forward_layer(&sink, true));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::warn!(
            target: "core_sync::tracker",
            local_index = 4,
            consumer_secret = "cs_live",
            "write failed"
        );

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.target, "core_sync::tracker");
        assert_eq!(entry.message, "write failed");
        assert_eq!(entry.fields["local_index"], "4");
        assert_eq!(entry.fields["consumer_secret"], REDACTED);
    }

    #[test]
    fn test_forwarded_event_keeps_values_without_redaction() {
        let sink = Arc::new(CapturingSink::default());
        let subscriber = tracing_subscriber::registry().with(forward_layer(&sink, false));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!(consumer_key = "ck_test", "configured");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries[0].fields["consumer_key"], "ck_test");
    }

    #[test]
    fn test_events_below_sink_level_are_dropped() {
        let sink = Arc::new(CapturingSink::default());
        let subscriber = tracing_subscriber::registry().with(forward_layer(&sink, false));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::trace!("dropped");
        tracing::info!("kept");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
    }
}
