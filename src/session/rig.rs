// Test fixture: a session over simulated backends and an in-memory store

use super::{PracticeSession, SessionParts};
use crate::config::EngineConfig;
use crate::messaging::{Notification, NotificationConsumer, Notifier, create_notification_channel};
use crate::project::MemoryProjectStore;
use crate::recording::{SimulatedCapture, SimulatedCaptureHandle};
use crate::track::TrackId;
use crate::transport::SimulatedBackend;
use ringbuf::traits::Consumer;

pub struct Rig {
    pub session: PracticeSession,
    pub backend: SimulatedBackend,
    pub store: MemoryProjectStore,
    pub capture: SimulatedCaptureHandle,
    notifications: NotificationConsumer,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_capture(SimulatedCapture::with_take(Vec::new(), None))
    }

    pub fn with_capture(capture: SimulatedCapture) -> Self {
        Self::with_config(EngineConfig::default(), capture)
    }

    pub fn with_config(config: EngineConfig, capture: SimulatedCapture) -> Self {
        let backend = SimulatedBackend::new(10.0);
        let store = MemoryProjectStore::new();
        let (producer, notifications) = create_notification_channel(64);
        let handle = capture.handle();
        let parts = SessionParts {
            store: Box::new(store.clone()),
            playback: Box::new(backend.clone()),
            capture: Box::new(capture),
            notifier: Notifier::new(producer),
        };
        Self {
            session: PracticeSession::create(config, "Practice", parts),
            backend,
            store,
            capture: handle,
            notifications,
        }
    }

    /// Import a track whose simulated audio lasts `duration` seconds
    pub fn import(&mut self, name: &str, duration: f64) -> TrackId {
        self.backend.set_duration(name, duration);
        let id = self
            .session
            .import_track(name, b"RIFF")
            .expect("import failed");
        self.session.dispatch_events();
        id
    }

    /// Move every simulated adapter forward and process what they reported
    pub fn advance(&mut self, dt: f64) {
        self.backend.advance_all(dt);
        self.session.dispatch_events();
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Some(n) = self.notifications.try_pop() {
            out.push(n);
        }
        out
    }
}
