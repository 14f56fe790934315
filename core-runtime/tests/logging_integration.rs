//! Integration tests for the logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, redact_url, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// Only one global subscriber per process, so everything touching
// init_logging lives in this single test.
#[test]
fn test_global_logging_forwards_to_sink() {
    let sink = Arc::new(CollectingSink::default());

    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).expect("first initialization succeeds");
    assert!(init_logging(config).is_err(), "second initialization must fail");

    tracing::debug!(target: "core_playback::coordinator", episode_id = "ep-1", "switching mode");
    tracing::trace!(target: "core_playback::coordinator", "below sink level");
    tracing::info!(target: "hyper", "filtered dependency noise");

    let entries = sink.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "switching mode");
    assert_eq!(entries[0].level, LogLevel::Debug);
}

#[test]
fn test_credential_fields_are_redacted() {
    assert_eq!(redact_if_sensitive("refresh_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("url_signature", "deadbeef"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("title", "Episode 12"), "Episode 12");
}

#[test]
fn test_signed_media_urls_are_redacted() {
    let signed = "https://media.example.org/feeds/42/ep12.m4a?Expires=1700000000&Signature=abc";
    let redacted = redact_url(signed);

    assert_eq!(redacted, "https://media.example.org/feeds/42/ep12.m4a?[REDACTED]");
    assert!(!redacted.contains("Signature"));
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
