// Communication channels lock-free

use crate::messaging::event::{AdapterEventKind, CaptureEvent, EngineEvent};
use crate::messaging::notification::Notification;
use crate::track::TrackId;
use ringbuf::{
    HeapRb,
    traits::{Producer, Split},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub type EventProducer = ringbuf::HeapProd<EngineEvent>;
pub type EventConsumer = ringbuf::HeapCons<EngineEvent>;

pub fn create_event_channel(capacity: usize) -> (EventProducer, EventConsumer) {
    let rb = HeapRb::<EngineEvent>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

/// Monotonic seek counter shared between the transport and every event sender
///
/// Adapter events are stamped with the epoch current at emission, so the
/// transport can tell events produced before a seek from events produced after it.
#[derive(Debug, Clone, Default)]
pub struct SeekEpoch {
    inner: Arc<AtomicU64>,
}

impl SeekEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Acquire)
    }

    /// Start a new epoch, returns its number
    pub fn advance(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Cloneable handle backends use to push events into the engine queue
#[derive(Clone)]
pub struct EventSender {
    producer: Arc<Mutex<EventProducer>>,
    epoch: SeekEpoch,
}

impl EventSender {
    pub fn new(producer: EventProducer, epoch: SeekEpoch) -> Self {
        Self {
            producer: Arc::new(Mutex::new(producer)),
            epoch,
        }
    }

    pub fn epoch(&self) -> &SeekEpoch {
        &self.epoch
    }

    /// Push an adapter event stamped with the current seek epoch
    ///
    /// Returns false if the queue is full (event dropped).
    pub fn send_adapter(&self, track_id: TrackId, kind: AdapterEventKind) -> bool {
        self.push(EngineEvent::Adapter {
            track_id,
            epoch: self.epoch.current(),
            kind,
        })
    }

    /// Push a capture device event
    pub fn send_capture(&self, event: CaptureEvent) -> bool {
        self.push(EngineEvent::Capture(event))
    }

    fn push(&self, event: EngineEvent) -> bool {
        let Ok(mut producer) = self.producer.lock() else {
            log::error!("Event queue lock poisoned, dropping event");
            return false;
        };
        match producer.try_push(event) {
            Ok(()) => true,
            Err(dropped) => {
                log::warn!("Event queue full, dropping {:?}", dropped);
                false
            }
        }
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("epoch", &self.epoch.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Consumer;

    #[test]
    fn test_events_are_stamped_with_epoch() {
        let (producer, mut consumer) = create_event_channel(8);
        let epoch = SeekEpoch::new();
        let sender = EventSender::new(producer, epoch.clone());
        let track = TrackId::new();

        sender.send_adapter(track, AdapterEventKind::TimeUpdate { seconds: 1.0 });
        epoch.advance();
        sender.send_adapter(track, AdapterEventKind::Finished);

        match consumer.try_pop() {
            Some(EngineEvent::Adapter { epoch, .. }) => assert_eq!(epoch, 0),
            other => panic!("unexpected {:?}", other),
        }
        match consumer.try_pop() {
            Some(EngineEvent::Adapter { epoch, kind, .. }) => {
                assert_eq!(epoch, 1);
                assert_eq!(kind, AdapterEventKind::Finished);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_full_queue_drops() {
        let (producer, _consumer) = create_event_channel(1);
        let sender = EventSender::new(producer, SeekEpoch::new());
        assert!(sender.send_capture(CaptureEvent::Started));
        assert!(!sender.send_capture(CaptureEvent::Started));
    }

    #[test]
    fn test_clones_share_queue() {
        let (producer, mut consumer) = create_event_channel(4);
        let sender = EventSender::new(producer, SeekEpoch::new());
        let other = sender.clone();
        sender.send_capture(CaptureEvent::Started);
        other.send_capture(CaptureEvent::Started);
        assert!(consumer.try_pop().is_some());
        assert!(consumer.try_pop().is_some());
        assert!(consumer.try_pop().is_none());
    }
}
