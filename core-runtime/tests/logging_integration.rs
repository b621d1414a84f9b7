//! Integration tests for logging system

use bridge_traits::logging::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_init_logging_only_once() {
    // A global subscriber can be installed once per process
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    init_logging(config.clone()).expect("first initialization succeeds");
    tracing::warn!(target: "core_sync", batch = "smoke", "logging initialized");

    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("consumer_key", "ck_live_123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("consumer_secret", "cs_live_456"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("db_password", "hunter2"), "[REDACTED]");
    assert_eq!(
        redact_if_sensitive("request_header", "Bearer abc.def"),
        "[REDACTED]"
    );
}

#[test]
fn test_catalog_values_pass_through() {
    assert_eq!(redact_if_sensitive("remote_id", "42"), "42");
    assert_eq!(redact_if_sensitive("slug", "winter-boots"), "winter-boots");
    assert_eq!(redact_if_sensitive("message", "Created Shoes"), "Created Shoes");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Error)
        .with_filter("core_sync=debug,provider_woocommerce=trace")
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Error);
    assert_eq!(
        config.filter.as_deref(),
        Some("core_sync=debug,provider_woocommerce=trace")
    );
    assert!(config.show_threads);
    assert!(config.redact_credentials);
}
