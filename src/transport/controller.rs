// Transport controller - drives every track adapter as one logical transport
//
// Owns the PlaybackState and the per-track adapter handles. Every transport
// command fans out to all adapters in one synchronous pass; adapter failures are
// logged per track and never abort the pass.
//
// Time updates come back through the event queue. Each one is classified by origin:
// - Stale: emitted before the latest seek (older seek epoch), dropped
// - Echo: first report of a track after a seek, landing on the seek target
// - Playback: regular playhead movement
// Only Playback updates are meant for the loop boundary check.

use crate::config::TransportConfig;
use crate::messaging::{AdapterEventKind, SeekEpoch};
use crate::track::{TrackId, TrackList, effective_gain, is_effectively_muted};
use crate::transport::adapter::{AdapterError, PlaybackAdapter};
use crate::transport::state::{PlaybackState, SharedClock};

/// Distance (seconds) under which a post-seek report counts as the seek's echo
const ECHO_TOLERANCE: f64 = 1e-3;

/// Why a seek happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// Scrub / click from the user
    User,
    /// Jump into a loop that is being activated
    LoopJump,
    /// Auto-repeat of the active loop
    LoopRepeat,
    /// Rewind after every track finished
    Rewind,
    /// Reposition while restoring a project or adding a track
    Restore,
}

impl SeekOrigin {
    /// Seeks that must not disarm the active loop
    pub fn preserves_loop(&self) -> bool {
        matches!(
            self,
            SeekOrigin::LoopJump | SeekOrigin::LoopRepeat | SeekOrigin::Restore
        )
    }
}

/// Origin of an accepted time update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    Playback,
    Echo,
}

/// What the controller made of an adapter event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportSignal {
    /// Unknown track, stale epoch or throttled
    Ignored,
    DurationChanged(f64),
    TimeUpdate {
        track_id: TrackId,
        time: f64,
        origin: UpdateOrigin,
    },
    TrackFinished(TrackId),
    /// Every adapter finished: transport paused and rewound to 0
    AllFinished,
}

/// Outcome of `play()` per track
#[derive(Debug, Default)]
pub struct PlayReport {
    pub started: Vec<TrackId>,
    /// Already at their end, not restarted
    pub finished: Vec<TrackId>,
    pub rejected: Vec<(TrackId, AdapterError)>,
    /// Every track was already at its end: the transport paused and went back to 0
    pub rewound: bool,
}

struct Channel {
    track_id: TrackId,
    adapter: Box<dyn PlaybackAdapter>,
    finished: bool,
    awaiting_echo: bool,
    last_update: Option<f64>,
}

impl Channel {
    /// The adapter itself reports a position at or past its end
    fn at_end(&self) -> bool {
        let own_duration = self.adapter.duration();
        own_duration > 0.0 && self.adapter.current_time() >= own_duration
    }
}

pub struct TransportController {
    channels: Vec<Channel>,
    state: PlaybackState,
    master_volume: f32,
    clock: SharedClock,
    epoch: SeekEpoch,
    seek_target: f64,
    config: TransportConfig,
}

impl TransportController {
    pub fn new(config: TransportConfig, epoch: SeekEpoch) -> Self {
        Self {
            channels: Vec::new(),
            state: PlaybackState::default(),
            master_volume: 1.0,
            clock: SharedClock::new(),
            epoch,
            seek_target: 0.0,
            config,
        }
    }

    /// Snapshot of the transport state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// UI playhead handle
    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.channels.iter().map(|c| c.track_id).collect()
    }

    pub fn has_adapter(&self, track_id: TrackId) -> bool {
        self.channel_index(track_id).is_some()
    }

    /// Tracks that reported their end since the last `play()`
    pub fn finished_tracks(&self) -> Vec<TrackId> {
        self.channels
            .iter()
            .filter(|c| c.finished)
            .map(|c| c.track_id)
            .collect()
    }

    /// Attach an adapter, aligning it with the running transport
    ///
    /// Replaces any adapter already registered for this track.
    pub fn register_adapter(&mut self, track_id: TrackId, mut adapter: Box<dyn PlaybackAdapter>) {
        adapter.set_playback_rate(self.state.playback_rate, true);
        let own_duration = adapter.duration();
        let position = if own_duration > 0.0 {
            self.state.current_time.min(own_duration)
        } else {
            self.state.current_time
        };
        adapter.set_time(position);

        let mut channel = Channel {
            track_id,
            adapter,
            finished: own_duration > 0.0 && self.state.current_time >= own_duration,
            awaiting_echo: true,
            last_update: None,
        };

        if self.state.is_playing
            && !channel.finished
            && let Err(e) = channel.adapter.play()
        {
            log::warn!("Track {} rejected play on register: {}", track_id, e);
        }

        match self.channel_index(track_id) {
            Some(index) => {
                let mut old = std::mem::replace(&mut self.channels[index], channel);
                old.adapter.pause();
            }
            None => self.channels.push(channel),
        }

        self.recompute_duration();
        log::debug!(
            "Registered adapter for track {} ({} channels)",
            track_id,
            self.channels.len()
        );
    }

    /// Detach and return a track's adapter (paused)
    pub fn unregister_adapter(&mut self, track_id: TrackId) -> Option<Box<dyn PlaybackAdapter>> {
        let index = self.channel_index(track_id)?;
        let mut channel = self.channels.remove(index);
        channel.adapter.pause();
        self.recompute_duration();
        Some(channel.adapter)
    }

    /// Start every adapter
    ///
    /// Tracks already at their end are flagged finished instead of restarted.
    /// `is_playing` flips as soon as the commands are issued.
    pub fn play(&mut self) -> PlayReport {
        let mut report = PlayReport::default();

        for channel in &mut self.channels {
            channel.finished = false;

            if channel.at_end() {
                channel.finished = true;
                report.finished.push(channel.track_id);
                continue;
            }

            match channel.adapter.play() {
                Ok(()) => report.started.push(channel.track_id),
                Err(e) => {
                    log::warn!("Track {} rejected play: {}", channel.track_id, e);
                    report.rejected.push((channel.track_id, e));
                }
            }
        }

        self.state.is_playing = true;
        log::debug!(
            "Play: {} started, {} finished, {} rejected",
            report.started.len(),
            report.finished.len(),
            report.rejected.len()
        );

        // Nothing left to play and nothing will report an end
        if !self.channels.is_empty() && self.all_finished() {
            log::info!("Play pressed with every track at its end, rewinding");
            self.rewind();
            report.rewound = true;
        }
        report
    }

    /// Pause every adapter and commit the sample-accurate position
    pub fn pause(&mut self) {
        for channel in &mut self.channels {
            channel.adapter.pause();
        }

        let position = self.live_time().unwrap_or_else(|| self.clock.seconds());
        self.state.current_time = self.state.clamp_time(position);
        self.clock.set(self.state.current_time);
        self.state.is_playing = false;
    }

    /// Move every adapter to `time` (clamped to the duration) before returning
    ///
    /// Starts a new seek epoch so that reports emitted before this call are
    /// recognised as stale. Returns the clamped time.
    pub fn seek(&mut self, time: f64, origin: SeekOrigin) -> f64 {
        let target = self.state.clamp_time(time);
        self.epoch.advance();
        self.seek_target = target;
        self.state.current_time = target;
        self.clock.set(target);

        let playing = self.state.is_playing;
        for channel in &mut self.channels {
            let own_duration = channel.adapter.duration();
            // Its Finished report may still be queued under the old epoch
            let was_at_end = channel.finished || channel.at_end();
            let reaches_end = own_duration > 0.0 && target >= own_duration;
            channel
                .adapter
                .set_time(if reaches_end { own_duration } else { target });
            channel.awaiting_echo = true;
            channel.last_update = None;

            if reaches_end {
                channel.finished = true;
            } else if was_at_end {
                channel.finished = false;
                if playing && let Err(e) = channel.adapter.play() {
                    log::warn!("Track {} rejected resume after seek: {}", channel.track_id, e);
                }
            }
        }

        log::debug!("Seek to {:.3}s ({:?})", target, origin);
        target
    }

    /// Apply a playback rate to every adapter, pitch preserved
    ///
    /// The rate is clamped to the configured range. Returns the applied rate.
    pub fn set_playback_rate(&mut self, rate: f64) -> f64 {
        if !rate.is_finite() {
            log::warn!("Ignoring non-finite playback rate");
            return self.state.playback_rate;
        }
        let rate = rate.clamp(self.config.min_playback_rate, self.config.max_playback_rate);
        for channel in &mut self.channels {
            channel.adapter.set_playback_rate(rate, true);
        }
        self.state.playback_rate = rate;
        rate
    }

    /// Store the master volume; call `apply_mix` to push it to the adapters
    pub fn set_master_volume(&mut self, volume: f32) -> f32 {
        self.master_volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            self.master_volume
        };
        self.master_volume
    }

    /// Push gains and solo/mute resolution to every adapter
    pub fn apply_mix(&mut self, tracks: &TrackList) {
        let any_solo = tracks.any_solo();
        for channel in &mut self.channels {
            let Some(track) = tracks.get(channel.track_id) else {
                continue;
            };
            channel
                .adapter
                .set_volume(effective_gain(track, self.master_volume));
            channel
                .adapter
                .set_muted(is_effectively_muted(track, any_solo));
        }
    }

    pub fn set_zoom(&mut self, level: f32) {
        for channel in &mut self.channels {
            channel.adapter.zoom(level);
        }
    }

    /// Sample-accurate position read from the first adapter still playing its audio
    pub fn live_time(&self) -> Option<f64> {
        self.channels
            .iter()
            .find(|c| !c.finished)
            .map(|c| c.adapter.current_time())
    }

    /// Classify and apply one adapter event
    pub fn handle_adapter_event(
        &mut self,
        track_id: TrackId,
        epoch: u64,
        kind: AdapterEventKind,
    ) -> TransportSignal {
        let Some(index) = self.channel_index(track_id) else {
            log::debug!("Event for unregistered track {}", track_id);
            return TransportSignal::Ignored;
        };

        match kind {
            AdapterEventKind::Ready { duration } => {
                log::debug!("Track {} ready ({:.2}s)", track_id, duration);
                self.recompute_duration();
                TransportSignal::DurationChanged(self.state.duration)
            }
            AdapterEventKind::TimeUpdate { seconds } => {
                if epoch < self.epoch.current() {
                    log::trace!("Dropping stale time update from track {}", track_id);
                    return TransportSignal::Ignored;
                }
                self.handle_time_update(index, seconds)
            }
            AdapterEventKind::Finished => {
                // An older finish still counts while the adapter sits at its end
                if epoch < self.epoch.current() && !self.channels[index].at_end() {
                    log::debug!("Dropping stale finish from track {}", track_id);
                    return TransportSignal::Ignored;
                }
                self.channels[index].finished = true;

                if self.all_finished() {
                    log::info!("All tracks finished, rewinding");
                    self.rewind();
                    TransportSignal::AllFinished
                } else {
                    TransportSignal::TrackFinished(track_id)
                }
            }
        }
    }

    fn handle_time_update(&mut self, index: usize, seconds: f64) -> TransportSignal {
        let interval = self.config.time_update_interval();
        let commit_interval = self.config.clock_commit_interval;
        let seek_target = self.seek_target;
        let channel = &mut self.channels[index];
        let track_id = channel.track_id;

        let origin = if channel.awaiting_echo {
            channel.awaiting_echo = false;
            if (seconds - seek_target).abs() <= ECHO_TOLERANCE {
                UpdateOrigin::Echo
            } else {
                UpdateOrigin::Playback
            }
        } else {
            if let Some(last) = channel.last_update
                && seconds >= last
                && seconds - last < interval
            {
                return TransportSignal::Ignored;
            }
            UpdateOrigin::Playback
        };
        channel.last_update = Some(seconds);

        self.clock.set(seconds);
        if (seconds - self.state.current_time).abs() >= commit_interval {
            self.state.current_time = self.state.clamp_time(seconds);
        }

        TransportSignal::TimeUpdate {
            track_id,
            time: seconds,
            origin,
        }
    }

    fn all_finished(&self) -> bool {
        self.channels.iter().all(|c| c.finished)
    }

    /// Pause, then seek to 0
    fn rewind(&mut self) {
        self.pause();
        self.seek(0.0, SeekOrigin::Rewind);
    }

    fn recompute_duration(&mut self) {
        self.state.duration = self
            .channels
            .iter()
            .map(|c| c.adapter.duration())
            .fold(0.0, f64::max);
    }

    fn channel_index(&self, track_id: TrackId) -> Option<usize> {
        self.channels.iter().position(|c| c.track_id == track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{EngineEvent, EventSender, create_event_channel};
    use crate::transport::simulated::{SimulatedAdapter, SimulatedHandle};
    use ringbuf::traits::Consumer;

    struct Rig {
        transport: TransportController,
        sender: EventSender,
        consumer: crate::messaging::EventConsumer,
        handles: Vec<(TrackId, SimulatedHandle)>,
    }

    impl Rig {
        fn new(durations: &[f64]) -> Self {
            let (producer, consumer) = create_event_channel(256);
            let epoch = SeekEpoch::new();
            let sender = EventSender::new(producer, epoch.clone());
            let mut transport = TransportController::new(TransportConfig::default(), epoch);
            let mut handles = Vec::new();
            for duration in durations {
                let track_id = TrackId::new();
                let (adapter, handle) = SimulatedAdapter::new(track_id, *duration, sender.clone());
                transport.register_adapter(track_id, Box::new(adapter));
                handles.push((track_id, handle));
            }
            Self {
                transport,
                sender,
                consumer,
                handles,
            }
        }

        fn drain(&mut self) -> Vec<TransportSignal> {
            let mut signals = Vec::new();
            while let Some(event) = self.consumer.try_pop() {
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
    }

    #[test]
    fn test_duration_is_longest_track() {
        let rig = Rig::new(&[30.0, 45.0, 12.0]);
        assert_eq!(rig.transport.state().duration, 45.0);
    }

    #[test]
    fn test_play_skips_finished_adapter() {
        let mut rig = Rig::new(&[10.0, 20.0]);
        let (short_id, short) = rig.handles[0].clone();
        short.place(10.0);

        let report = rig.transport.play();
        assert_eq!(report.finished, vec![short_id]);
        assert_eq!(report.started, vec![rig.handles[1].0]);
        assert_eq!(short.play_calls(), 0);
        assert!(rig.transport.finished_tracks().contains(&short_id));
        assert!(rig.transport.state().is_playing);
    }

    #[test]
    fn test_rejected_play_does_not_stop_others() {
        let mut rig = Rig::new(&[10.0, 10.0]);
        rig.handles[0].1.set_reject_play(true);

        let report = rig.transport.play();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.started, vec![rig.handles[1].0]);
        assert!(rig.handles[1].1.is_playing());
        assert!(rig.transport.state().is_playing);
    }

    #[test]
    fn test_seek_moves_every_adapter() {
        let mut rig = Rig::new(&[30.0, 30.0, 8.0]);
        let applied = rig.transport.seek(12.0, SeekOrigin::User);
        assert_eq!(applied, 12.0);
        assert_eq!(rig.handles[0].1.position(), 12.0);
        assert_eq!(rig.handles[1].1.position(), 12.0);
        // The short track parks at its end and counts as finished
        assert_eq!(rig.handles[2].1.position(), 8.0);
        assert_eq!(rig.transport.finished_tracks(), vec![rig.handles[2].0]);
    }

    #[test]
    fn test_seek_clamps() {
        let mut rig = Rig::new(&[30.0]);
        assert_eq!(rig.transport.seek(-5.0, SeekOrigin::User), 0.0);
        assert_eq!(rig.transport.seek(100.0, SeekOrigin::User), 30.0);
    }

    #[test]
    fn test_seek_twice_is_idempotent() {
        let mut rig = Rig::new(&[30.0]);
        rig.transport.seek(7.5, SeekOrigin::User);
        rig.transport.seek(7.5, SeekOrigin::User);
        assert_eq!(rig.transport.state().current_time, 7.5);
        assert_eq!(rig.handles[0].1.position(), 7.5);
    }

    #[test]
    fn test_seek_back_resumes_finished_track() {
        let mut rig = Rig::new(&[10.0, 30.0]);
        rig.transport.play();
        rig.handles[0].1.advance(10.0);
        rig.handles[1].1.advance(10.0);
        rig.drain();
        assert_eq!(rig.transport.finished_tracks(), vec![rig.handles[0].0]);

        let calls_before = rig.handles[0].1.play_calls();
        rig.transport.seek(4.0, SeekOrigin::User);
        assert!(rig.transport.finished_tracks().is_empty());
        assert_eq!(rig.handles[0].1.play_calls(), calls_before + 1);
        assert!(rig.handles[0].1.is_playing());
    }

    #[test]
    fn test_seek_before_finish_is_handled_resumes_track() {
        let mut rig = Rig::new(&[10.0, 30.0]);
        rig.transport.play();
        rig.drain();
        // Finished is queued but not handled yet when the seek arrives
        rig.handles[0].1.advance(10.0);
        assert!(!rig.handles[0].1.is_playing());

        rig.transport.seek(4.0, SeekOrigin::User);
        assert!(rig.handles[0].1.is_playing());

        let signals = rig.drain();
        assert!(!signals.contains(&TransportSignal::TrackFinished(rig.handles[0].0)));
        assert!(rig.transport.finished_tracks().is_empty());
        assert!(rig.handles[0].1.is_playing());
    }

    #[test]
    fn test_stale_finish_counts_when_track_is_at_its_end() {
        let mut rig = Rig::new(&[10.0, 30.0]);
        rig.transport.play();
        rig.drain();
        rig.handles[0].1.advance(10.0);
        // Seek past the short track: it stays parked at its end
        rig.transport.seek(15.0, SeekOrigin::User);

        rig.drain();
        assert_eq!(rig.transport.finished_tracks(), vec![rig.handles[0].0]);
        assert!(rig.transport.state().is_playing);
    }

    #[test]
    fn test_play_with_every_track_at_end_rewinds() {
        let mut rig = Rig::new(&[10.0, 6.0]);
        assert_eq!(rig.transport.seek(10.0, SeekOrigin::User), 10.0);

        let report = rig.transport.play();
        assert!(report.rewound);
        assert!(report.started.is_empty());
        let state = rig.transport.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 0.0);
        for (_, handle) in &rig.handles {
            assert_eq!(handle.position(), 0.0);
            assert!(!handle.is_playing());
        }

        // From the start it plays normally
        let report = rig.transport.play();
        assert!(!report.rewound);
        assert_eq!(report.started.len(), 2);
    }

    #[test]
    fn test_stale_updates_are_dropped() {
        let mut rig = Rig::new(&[30.0]);
        let track_id = rig.handles[0].0;
        rig.transport.play();
        rig.drain();
        rig.sender
            .send_adapter(track_id, AdapterEventKind::TimeUpdate { seconds: 9.0 });
        rig.transport.seek(2.0, SeekOrigin::User);

        let signals = rig.drain();
        // Stale 9.0 dropped, then the seek echo at 2.0
        assert_eq!(signals[0], TransportSignal::Ignored);
        assert_eq!(
            signals[1],
            TransportSignal::TimeUpdate {
                track_id,
                time: 2.0,
                origin: UpdateOrigin::Echo
            }
        );
    }

    #[test]
    fn test_updates_are_throttled() {
        let mut rig = Rig::new(&[30.0]);
        rig.transport.play();
        rig.drain();
        let handle = rig.handles[0].1.clone();
        handle.advance(0.5);
        handle.advance(0.005);
        handle.advance(0.005);
        handle.advance(0.02);

        let accepted = rig
            .drain()
            .into_iter()
            .filter(|s| matches!(s, TransportSignal::TimeUpdate { .. }))
            .count();
        assert_eq!(accepted, 2);
    }

    #[test]
    fn test_all_finished_rewinds() {
        let mut rig = Rig::new(&[5.0, 6.0]);
        rig.transport.play();
        for (_, handle) in &rig.handles {
            handle.advance(6.0);
        }
        let signals = rig.drain();
        assert!(signals.contains(&TransportSignal::AllFinished));
        let state = rig.transport.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(rig.handles[0].1.position(), 0.0);
    }

    #[test]
    fn test_playback_rate_is_clamped_and_applied() {
        let mut rig = Rig::new(&[30.0, 30.0]);
        assert_eq!(rig.transport.set_playback_rate(8.0), 4.0);
        assert_eq!(rig.transport.set_playback_rate(0.1), 0.25);
        assert_eq!(rig.transport.set_playback_rate(0.75), 0.75);
        for (_, handle) in &rig.handles {
            assert_eq!(handle.rate(), 0.75);
            assert!(handle.preserves_pitch());
        }
        assert_eq!(rig.transport.state().playback_rate, 0.75);
    }

    #[test]
    fn test_pause_commits_live_position() {
        let mut rig = Rig::new(&[30.0]);
        rig.transport.play();
        rig.handles[0].1.advance(3.2);
        rig.transport.pause();
        let state = rig.transport.state();
        assert!(!state.is_playing);
        assert!((state.current_time - 3.2).abs() < 1e-9);
    }
}
