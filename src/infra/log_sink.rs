//! Remote log shipping.
//!
//! [`LogSinkLayer`] turns tracing events into [`LogEntry`] documents and queues them without
//! blocking; [`LogShipper`] drains the queue and POSTs each document to the log index. Shipping
//! problems go to stderr so they never re-enter the tracing pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use reqwest::Client;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use url::Url;

use crate::config::LogSinkSettings;

use super::error::InfraError;

const QUEUE_CAPACITY: usize = 1024;
const SHIP_TIMEOUT: Duration = Duration::from_secs(3);
const METRIC_DROPPED: &str = "trendcache_log_sink_dropped_total";

/// Targets whose events are never shipped; the sink's own HTTP traffic would otherwise recurse.
const EXCLUDED_TARGETS: [&str; 5] = [
    "trendcache::infra::log_sink",
    "reqwest",
    "hyper",
    "h2",
    "rustls",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub log_level: String,
    pub message: String,
    pub target: String,
    pub service: String,
    pub hostname: String,
}

pub struct LogSinkLayer {
    sender: mpsc::Sender<LogEntry>,
    service: Arc<str>,
    hostname: Arc<str>,
}

pub struct LogShipper {
    client: Client,
    endpoint: Url,
    receiver: mpsc::Receiver<LogEntry>,
}

/// Build a connected layer and shipper for `settings`.
pub fn channel(settings: &LogSinkSettings) -> Result<(LogSinkLayer, LogShipper), InfraError> {
    with_capacity(settings, QUEUE_CAPACITY)
}

fn with_capacity(
    settings: &LogSinkSettings,
    capacity: usize,
) -> Result<(LogSinkLayer, LogShipper), InfraError> {
    let mut endpoint = settings.url.clone();
    endpoint
        .path_segments_mut()
        .map_err(|_| {
            InfraError::configuration(format!("log sink url `{}` cannot carry a path", settings.url))
        })?
        .pop_if_empty()
        .extend([settings.index.as_str(), "_doc"]);

    let client = Client::builder()
        .timeout(SHIP_TIMEOUT)
        .build()
        .map_err(|err| InfraError::telemetry(format!("failed to build log sink client: {err}")))?;

    let (sender, receiver) = mpsc::channel(capacity);
    let layer = LogSinkLayer {
        sender,
        service: Arc::from(settings.service_name.as_str()),
        hostname: Arc::from(hostname().as_str()),
    };
    let shipper = LogShipper {
        client,
        endpoint,
        receiver,
    };
    Ok((layer, shipper))
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn is_excluded(target: &str) -> bool {
    EXCLUDED_TARGETS
        .iter()
        .any(|prefix| target.starts_with(prefix))
}

impl<S> Layer<S> for LogSinkLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_excluded(metadata.target()) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry {
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
            log_level: metadata.level().as_str().to_string(),
            message: visitor.finish(),
            target: metadata.target().to_string(),
            service: self.service.to_string(),
            hostname: self.hostname.to_string(),
        };

        if self.sender.try_send(entry).is_err() {
            counter!(METRIC_DROPPED).increment(1);
        }
    }
}

impl LogShipper {
    /// Ship entries until every [`LogSinkLayer`] has been dropped.
    pub async fn run(mut self) {
        while let Some(entry) = self.receiver.recv().await {
            if let Err(err) = self.ship(&entry).await {
                eprintln!("log sink: failed to ship entry to {}: {err}", self.endpoint);
            }
        }
    }

    async fn ship(&self, entry: &LogEntry) -> Result<(), reqwest::Error> {
        self.client
            .post(self.endpoint.clone())
            .json(entry)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.join(" ")
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
