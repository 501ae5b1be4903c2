// Système de notifications - user-facing messages for soft failures
// (capacity limits, stale references, recording problems, persistence hiccups)

use crate::messaging::channels::NotificationProducer;
use ringbuf::traits::Producer;
use std::time::{SystemTime, UNIX_EPOCH};

/// Niveau de sévérité d'une notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Subsystem a notification comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Transport,
    Loop,
    Recording,
    Persistence,
}

/// Notification avec timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub message: String,
    pub timestamp: u64, // Unix timestamp en millisecondes
}

impl Notification {
    pub fn new(level: NotificationLevel, category: NotificationCategory, message: String) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            level,
            category,
            message,
            timestamp,
        }
    }

    pub fn info(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Info, category, message)
    }

    pub fn warning(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Warning, category, message)
    }

    pub fn error(category: NotificationCategory, message: String) -> Self {
        Self::new(NotificationLevel::Error, category, message)
    }
}

/// Logs every message and forwards it to the UI queue when one is attached
pub struct Notifier {
    producer: Option<NotificationProducer>,
}

impl Notifier {
    pub fn new(producer: NotificationProducer) -> Self {
        Self {
            producer: Some(producer),
        }
    }

    /// Log-only notifier (headless use)
    pub fn detached() -> Self {
        Self { producer: None }
    }

    pub fn info(&mut self, category: NotificationCategory, message: impl Into<String>) {
        let message = message.into();
        log::info!("[{:?}] {}", category, message);
        self.push(Notification::info(category, message));
    }

    pub fn warning(&mut self, category: NotificationCategory, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[{:?}] {}", category, message);
        self.push(Notification::warning(category, message));
    }

    pub fn error(&mut self, category: NotificationCategory, message: impl Into<String>) {
        let message = message.into();
        log::error!("[{:?}] {}", category, message);
        self.push(Notification::error(category, message));
    }

    fn push(&mut self, notification: Notification) {
        if let Some(producer) = self.producer.as_mut()
            && producer.try_push(notification).is_err()
        {
            log::debug!("Notification queue full, message only logged");
        }
    }
}
