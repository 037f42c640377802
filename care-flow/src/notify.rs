use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::locale::Localizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Destructive,
}

/// A notification before localization: catalog keys plus interpolation arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: &'static str,
    pub description: &'static str,
    pub args: Vec<(&'static str, String)>,
    pub severity: Severity,
}

impl Notice {
    pub fn new(title: &'static str, description: &'static str, severity: Severity) -> Self {
        Self {
            title,
            description,
            args: Vec::new(),
            severity,
        }
    }

    pub fn with_arg(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.args.push((name, value.into()));
        self
    }
}

/// A user-visible message after localization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

/// Fire-and-forget receiver of user-visible messages. Must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that writes every notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Destructive => warn!(
                title = %notification.title,
                description = %notification.description,
                "notification"
            ),
            _ => info!(
                title = %notification.title,
                description = %notification.description,
                severity = ?notification.severity,
                "notification"
            ),
        }
    }
}

/// Sink that keeps every notification in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.delivered().into_iter().map(|n| n.title).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notification);
    }
}

/// Localizes notices and forwards them to a sink.
#[derive(Clone)]
pub struct Notifier {
    localizer: Arc<dyn Localizer>,
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(localizer: Arc<dyn Localizer>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { localizer, sink }
    }

    pub fn send(&self, notice: Notice) {
        let notification = Notification {
            title: self.localizer.t_with(notice.title, &notice.args),
            description: self.localizer.t_with(notice.description, &notice.args),
            severity: notice.severity,
        };
        self.sink.notify(notification);
    }
}
