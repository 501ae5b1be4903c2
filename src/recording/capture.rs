// Capture device seam - microphone / line input for recorded takes
//
// The device reports back through the engine event queue: `Started` once audio
// truly flows, `Completed` with the encoded take after `stop`, `Failed` if the
// device dies mid-take.

use crate::messaging::{CaptureEvent, EventSender};
use std::sync::{Arc, Mutex, MutexGuard};

/// Capture device failures, classified for the user
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Microphone access denied")]
    PermissionDenied,

    #[error("No capture device found")]
    DeviceNotFound,

    #[error("Capture device is busy")]
    DeviceBusy,

    #[error("Capture device error: {0}")]
    Device(String),
}

impl CaptureError {
    /// Permission problem (as opposed to a hardware one)
    pub fn is_permission(&self) -> bool {
        matches!(self, CaptureError::PermissionDenied)
    }

    /// Human-readable explanation with a hint of what to do
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::PermissionDenied => {
                "Microphone access was denied. Allow microphone access and arm the track again."
                    .to_string()
            }
            CaptureError::DeviceNotFound => {
                "No microphone was found. Connect an input device and try again.".to_string()
            }
            CaptureError::DeviceBusy => {
                "The microphone is used by another application. Close it and try again."
                    .to_string()
            }
            CaptureError::Device(detail) => format!("The recording device failed: {}", detail),
        }
    }
}

pub trait CaptureDevice: Send {
    /// Begin capturing. `Started` is sent once audio actually flows.
    fn start(&mut self, events: EventSender) -> Result<(), CaptureError>;

    /// Stop and deliver the take as `Completed`
    fn stop(&mut self);

    /// Stop and throw the captured audio away
    fn discard(&mut self);
}

#[derive(Debug, Default)]
struct CaptureShared {
    events: Option<EventSender>,
    capturing: bool,
    started_signalled: bool,
    starts: usize,
    discards: usize,
}

/// Test-side control of a `SimulatedCapture`
#[derive(Debug, Clone, Default)]
pub struct SimulatedCaptureHandle {
    shared: Arc<Mutex<CaptureShared>>,
}

impl SimulatedCaptureHandle {
    fn lock(&self) -> MutexGuard<'_, CaptureShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver a deferred `Started`
    pub fn signal_started(&self) -> bool {
        let mut shared = self.lock();
        if !shared.capturing || shared.started_signalled {
            return false;
        }
        shared.started_signalled = true;
        shared
            .events
            .as_ref()
            .is_some_and(|e| e.send_capture(CaptureEvent::Started))
    }

    /// Simulate the device dying mid-take
    pub fn fail(&self, error: CaptureError) -> bool {
        let mut shared = self.lock();
        shared.capturing = false;
        shared
            .events
            .as_ref()
            .is_some_and(|e| e.send_capture(CaptureEvent::Failed(error)))
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().capturing
    }

    pub fn start_count(&self) -> usize {
        self.lock().starts
    }

    pub fn discard_count(&self) -> usize {
        self.lock().discards
    }
}

/// Capture device replaying a prepared take
pub struct SimulatedCapture {
    take: Vec<u8>,
    format_hint: Option<String>,
    start_error: Option<CaptureError>,
    deferred_start: bool,
    handle: SimulatedCaptureHandle,
}

impl SimulatedCapture {
    /// Device that produces `bytes` on every stop
    pub fn with_take(bytes: Vec<u8>, format_hint: Option<&str>) -> Self {
        Self {
            take: bytes,
            format_hint: format_hint.map(str::to_string),
            start_error: None,
            deferred_start: false,
            handle: SimulatedCaptureHandle::default(),
        }
    }

    /// Device that refuses to start
    pub fn failing(error: CaptureError) -> Self {
        Self {
            start_error: Some(error),
            ..Self::with_take(Vec::new(), None)
        }
    }

    /// `Started` is only sent when the handle says so
    pub fn deferred(mut self) -> Self {
        self.deferred_start = true;
        self
    }

    pub fn handle(&self) -> SimulatedCaptureHandle {
        self.handle.clone()
    }
}

impl CaptureDevice for SimulatedCapture {
    fn start(&mut self, events: EventSender) -> Result<(), CaptureError> {
        if let Some(error) = &self.start_error {
            return Err(error.clone());
        }
        let mut shared = self.handle.lock();
        shared.starts += 1;
        shared.capturing = true;
        shared.started_signalled = !self.deferred_start;
        if !self.deferred_start {
            events.send_capture(CaptureEvent::Started);
        }
        shared.events = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        let mut shared = self.handle.lock();
        if !shared.capturing {
            return;
        }
        shared.capturing = false;
        if let Some(events) = shared.events.as_ref() {
            events.send_capture(CaptureEvent::Completed {
                bytes: self.take.clone(),
                format_hint: self.format_hint.clone(),
            });
        }
    }

    fn discard(&mut self) {
        let mut shared = self.handle.lock();
        shared.capturing = false;
        shared.discards += 1;
    }
}
