// Messaging - event queue between backends and the engine, notifications to the UI

pub mod channels;
pub mod event;
pub mod notification;

pub use channels::{
    EventConsumer, EventProducer, EventSender, NotificationConsumer, NotificationProducer,
    SeekEpoch, create_event_channel, create_notification_channel,
};
pub use event::{AdapterEventKind, CaptureEvent, EngineEvent};
pub use notification::{Notification, NotificationCategory, NotificationLevel, Notifier};
