//! Reporting of backup results to a log sink.
//!
//! Monitoring of the backups relies on these records alone: every phase
//! produces exactly one record, [Info](Level::Info) on success and
//! [Error](Level::Error) on failure.

use std::time::Duration;

use chrono::Local;
use log::Level;
use serde::Serialize;

use crate::backends::PhaseOutcome;

/// Log channel the backup records are filed under.
pub const CHANNEL: &str = "backup_logger";

const LOGGLY_ENDPOINT: &str = "https://logs-01.loggly.com/inputs";
const LOGGLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination of backup records.
pub trait LogSink {
    fn record(&self, level: Level, message: &str);
}

/// Writes records to the local [log] facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSink;

impl LogSink for LocalSink {
    fn record(&self, level: Level, message: &str) {
        log::log!(target: CHANNEL, level, "{message}");
    }
}

/// Sends records to a [Loggly] HTTP input in addition to logging them locally.
///
/// Delivery failures are only logged locally.
///
/// [Loggly]: https://documentation.solarwinds.com/en/success_center/loggly/content/admin/http-endpoint.htm
pub struct LogglySink {
    client: reqwest::blocking::Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct LogglyEvent<'a> {
    message: &'a str,
    level: u16,
    level_name: &'static str,
    channel: &'static str,
    timestamp: String,
}

impl<'a> LogglyEvent<'a> {
    fn new(level: Level, message: &'a str) -> Self {
        let (level, level_name) = match level {
            Level::Error => (400, "ERROR"),
            Level::Warn => (300, "WARNING"),
            Level::Info => (200, "INFO"),
            Level::Debug | Level::Trace => (100, "DEBUG"),
        };

        Self {
            message,
            level,
            level_name,
            channel: CHANNEL,
            timestamp: Local::now().to_rfc3339(),
        }
    }
}

impl LogglySink {
    pub fn new(token: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(LOGGLY_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: loggly_url(token),
        })
    }

    fn send(&self, event: &LogglyEvent<'_>) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.url)
            .json(event)
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

impl LogSink for LogglySink {
    fn record(&self, level: Level, message: &str) {
        LocalSink.record(level, message);

        if let Err(e) = self.send(&LogglyEvent::new(level, message)) {
            log::warn!(target: "report::loggly", "Sending record to Loggly failed: {e}");
        }
    }
}

fn loggly_url(token: &str) -> String {
    format!("{LOGGLY_ENDPOINT}/{token}/tag/{CHANNEL}/")
}

/// Turns phase outcomes into log records.
pub struct Reporter<'a> {
    sink: &'a dyn LogSink,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn LogSink) -> Self {
        Self { sink }
    }

    pub fn report(&self, outcome: &PhaseOutcome) {
        let level = if outcome.success {
            Level::Info
        } else {
            Level::Error
        };
        self.sink.record(level, &outcome.detail);
    }
}
