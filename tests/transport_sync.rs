// Integration test: one transport over several simulated adapters
//
// Drives the controller the way the session does: commands in, adapter events
// out through the queue, each event handed back to the controller.

use ringbuf::traits::Consumer;
use stemloop::config::TransportConfig;
use stemloop::messaging::{EngineEvent, EventConsumer, EventSender, SeekEpoch, create_event_channel};
use stemloop::track::{Track, TrackList, TrackSource, muted_track_ids};
use stemloop::transport::{
    SeekOrigin, SimulatedAdapter, SimulatedHandle, TransportController, TransportSignal,
    UpdateOrigin,
};
use stemloop::TrackId;

struct Harness {
    transport: TransportController,
    events: EventConsumer,
    sender: EventSender,
    handles: Vec<(TrackId, SimulatedHandle)>,
}

impl Harness {
    fn new(durations: &[f64]) -> Self {
        let (producer, events) = create_event_channel(1024);
        let epoch = SeekEpoch::new();
        let sender = EventSender::new(producer, epoch.clone());
        let mut harness = Self {
            transport: TransportController::new(TransportConfig::default(), epoch),
            events,
            sender,
            handles: Vec::new(),
        };
        for &duration in durations {
            harness.add(duration);
        }
        harness.pump();
        harness
    }

    fn add(&mut self, duration: f64) -> TrackId {
        let id = TrackId::new();
        let (adapter, handle) = SimulatedAdapter::new(id, duration, self.sender.clone());
        self.transport.register_adapter(id, Box::new(adapter));
        self.handles.push((id, handle));
        id
    }

    fn handle(&self, index: usize) -> &SimulatedHandle {
        &self.handles[index].1
    }

    fn pump(&mut self) -> Vec<TransportSignal> {
        let mut signals = Vec::new();
        while let Some(event) = self.events.try_pop() {
            if let EngineEvent::Adapter {
                track_id,
                epoch,
                kind,
            } = event
            {
                signals.push(self.transport.handle_adapter_event(track_id, epoch, kind));
            }
        }
        signals
    }

    fn advance(&mut self, dt: f64) -> Vec<TransportSignal> {
        for (_, handle) in &self.handles {
            handle.advance(dt);
        }
        self.pump()
    }
}

#[test]
fn test_seek_reaches_every_adapter_before_returning() {
    let mut h = Harness::new(&[30.0, 30.0, 30.0]);
    h.transport.play();

    let applied = h.transport.seek(12.5, SeekOrigin::User);
    assert_eq!(applied, 12.5);
    for (_, handle) in &h.handles {
        assert_eq!(handle.position(), 12.5);
    }
    assert_eq!(h.transport.state().current_time, 12.5);
}

#[test]
fn test_seek_is_clamped_to_duration() {
    let mut h = Harness::new(&[10.0, 20.0]);
    assert_eq!(h.transport.seek(99.0, SeekOrigin::User), 20.0);
    assert_eq!(h.transport.seek(-3.0, SeekOrigin::User), 0.0);
    assert_eq!(h.transport.seek(f64::NAN, SeekOrigin::User), 0.0);
}

#[test]
fn test_seek_echo_is_not_playback() {
    let mut h = Harness::new(&[30.0, 30.0]);
    h.transport.play();
    h.transport.seek(8.0, SeekOrigin::User);

    let signals = h.pump();
    assert_eq!(signals.len(), 2);
    for signal in signals {
        assert!(matches!(
            signal,
            TransportSignal::TimeUpdate {
                origin: UpdateOrigin::Echo,
                ..
            }
        ));
    }

    let signals = h.advance(0.5);
    assert!(signals.iter().all(|s| matches!(
        s,
        TransportSignal::TimeUpdate {
            origin: UpdateOrigin::Playback,
            ..
        }
    )));
}

#[test]
fn test_updates_from_before_a_seek_are_dropped() {
    let mut h = Harness::new(&[30.0]);
    h.transport.play();
    h.pump();

    // A backend lagging behind reports an old position, then the user seeks
    h.handle(0).report(3.0);
    h.transport.seek(20.0, SeekOrigin::User);
    let signals = h.pump();

    assert_eq!(signals[0], TransportSignal::Ignored);
    assert_eq!(h.transport.clock().seconds(), 20.0);
}

#[test]
fn test_play_skips_adapters_at_their_end() {
    let mut h = Harness::new(&[10.0, 30.0]);
    h.handle(0).place(10.0);
    let short = h.handles[0].0;

    let report = h.transport.play();
    assert_eq!(report.finished, vec![short]);
    assert_eq!(report.started.len(), 1);
    assert_eq!(h.handle(0).play_calls(), 0);
    assert!(h.transport.finished_tracks().contains(&short));
}

#[test]
fn test_seek_back_resumes_finished_adapter() {
    let mut h = Harness::new(&[5.0, 30.0]);
    h.transport.play();
    h.pump();
    h.advance(5.5);
    assert!(!h.handle(0).is_playing());

    h.transport.seek(2.0, SeekOrigin::User);
    assert!(h.handle(0).is_playing());
    assert!(h.transport.finished_tracks().is_empty());
}

#[test]
fn test_all_finished_pauses_and_rewinds() {
    let mut h = Harness::new(&[2.0, 3.0]);
    h.transport.play();
    h.pump();

    let signals = h.advance(2.0);
    assert!(signals.contains(&TransportSignal::TrackFinished(h.handles[0].0)));
    let signals = h.advance(1.0);
    assert!(signals.contains(&TransportSignal::AllFinished));

    let state = h.transport.state();
    assert!(!state.is_playing);
    assert_eq!(state.current_time, 0.0);
    assert_eq!(h.handle(1).position(), 0.0);
}

#[test]
fn test_rejected_play_does_not_stop_others() {
    let mut h = Harness::new(&[30.0, 30.0, 30.0]);
    h.handle(1).set_reject_play(true);

    let report = h.transport.play();
    assert_eq!(report.started.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert!(h.transport.state().is_playing);
    assert!(h.handle(0).is_playing());
    assert!(h.handle(2).is_playing());
}

#[test]
fn test_rate_applies_to_all_with_pitch_preserved() {
    let mut h = Harness::new(&[30.0, 30.0]);
    assert_eq!(h.transport.set_playback_rate(0.5), 0.5);
    for (_, handle) in &h.handles {
        assert_eq!(handle.rate(), 0.5);
        assert!(handle.preserves_pitch());
    }
    // Clamped to the configured range
    assert_eq!(h.transport.set_playback_rate(10.0), 4.0);

    // Late adapters pick the rate up on register
    let id = h.add(30.0);
    let late = &h.handles.iter().find(|(t, _)| *t == id).unwrap().1;
    assert_eq!(late.rate(), 4.0);
}

#[test]
fn test_solo_mute_resolution() {
    let mut a = Track::imported("A", TrackSource("tracks/a.wav".into()));
    a.soloed = true;
    let b = Track::imported("B", TrackSource("tracks/b.wav".into()));
    let mut c = Track::imported("C", TrackSource("tracks/c.wav".into()));
    c.muted = true;
    let (a_id, b_id, c_id) = (a.id, b.id, c.id);
    let tracks = TrackList::from_tracks(vec![a, b, c]);

    let mut muted = muted_track_ids(&tracks);
    muted.sort();
    let mut expected = vec![b_id, c_id];
    expected.sort();
    assert_eq!(muted, expected);

    let mut h = Harness::new(&[]);
    for id in [a_id, b_id, c_id] {
        let (adapter, handle) = SimulatedAdapter::new(id, 10.0, h.sender.clone());
        h.transport.register_adapter(id, Box::new(adapter));
        h.handles.push((id, handle));
    }
    h.transport.set_master_volume(0.5);
    h.transport.apply_mix(&tracks);
    assert!(!h.handle(0).is_muted());
    assert!(h.handle(1).is_muted());
    assert!(h.handle(2).is_muted());
    assert_eq!(h.handle(0).volume(), 0.5);
}

#[test]
fn test_clock_follows_updates_with_low_churn_state() {
    let mut h = Harness::new(&[30.0]);
    h.transport.play();
    h.pump();

    h.advance(0.1);
    assert!((h.transport.clock().seconds() - 0.1).abs() < 1e-9);
    // Below the commit interval the authoritative time does not move
    assert_eq!(h.transport.state().current_time, 0.0);

    h.advance(0.2);
    assert!((h.transport.state().current_time - 0.3).abs() < 1e-9);
}

#[test]
fn test_seek_while_finish_is_in_flight() {
    let mut h = Harness::new(&[5.0, 30.0]);
    h.transport.play();
    h.pump();

    // Both adapters move, the queue is not drained before the user seeks
    for (_, handle) in &h.handles {
        handle.advance(6.0);
    }
    h.transport.seek(2.0, SeekOrigin::User);
    let signals = h.pump();

    assert!(signals.iter().all(|s| !matches!(s, TransportSignal::TrackFinished(_))));
    assert!(h.transport.finished_tracks().is_empty());
    assert!(h.handle(0).is_playing());
    assert!(h.handle(1).is_playing());

    // The short track then finishes again on its own
    let signals = h.advance(3.5);
    assert!(signals.contains(&TransportSignal::TrackFinished(h.handles[0].0)));
    assert!(h.transport.state().is_playing);
}

#[test]
fn test_play_at_the_end_rewinds_instead_of_hanging() {
    let mut h = Harness::new(&[10.0]);
    h.transport.seek(10.0, SeekOrigin::User);
    h.pump();

    let report = h.transport.play();
    assert!(report.rewound);
    assert_eq!(report.finished.len(), 1);
    h.advance(0.5);
    h.advance(0.5);

    let state = h.transport.state();
    assert!(!state.is_playing);
    assert_eq!(state.current_time, 0.0);
    assert_eq!(h.handle(0).position(), 0.0);
}
