// Simulated playback backend - deterministic adapters driven by a virtual clock
//
// Used by the headless demo, the tests and the benches. Nothing plays: the
// playhead only moves when `advance` is called on the handle.

use crate::messaging::{AdapterEventKind, EventSender};
use crate::track::{Track, TrackId, TrackSource};
use crate::transport::adapter::{AdapterError, AdapterFactory, PlaybackAdapter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct SimState {
    track_id: TrackId,
    duration: f64,
    position: f64,
    playing: bool,
    rate: f64,
    preserve_pitch: bool,
    volume: f32,
    muted: bool,
    zoom: f32,
    play_calls: usize,
    reject_play: bool,
    loaded: Option<TrackSource>,
    events: EventSender,
}

impl SimState {
    fn emit(&self, kind: AdapterEventKind) {
        self.events.send_adapter(self.track_id, kind);
    }
}

/// Test-side view of a simulated adapter
#[derive(Debug, Clone)]
pub struct SimulatedHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move the playhead forward by `dt` seconds of wall time
    ///
    /// Emits a time update, plus `Finished` when the end is reached.
    pub fn advance(&self, dt: f64) {
        let mut state = self.lock();
        if !state.playing {
            return;
        }
        let next = state.position + dt * state.rate;
        if next >= state.duration {
            state.position = state.duration;
            state.playing = false;
            let end = state.duration;
            state.emit(AdapterEventKind::TimeUpdate { seconds: end });
            state.emit(AdapterEventKind::Finished);
        } else {
            state.position = next;
            state.emit(AdapterEventKind::TimeUpdate { seconds: next });
        }
    }

    /// Set the playhead without emitting anything
    pub fn place(&self, seconds: f64) {
        let mut state = self.lock();
        state.position = seconds.clamp(0.0, state.duration);
    }

    /// Emit an arbitrary time report, as a backend lagging behind might
    pub fn report(&self, seconds: f64) {
        self.lock()
            .emit(AdapterEventKind::TimeUpdate { seconds });
    }

    pub fn set_reject_play(&self, reject: bool) {
        self.lock().reject_play = reject;
    }

    pub fn position(&self) -> f64 {
        self.lock().position
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn play_calls(&self) -> usize {
        self.lock().play_calls
    }

    pub fn rate(&self) -> f64 {
        self.lock().rate
    }

    pub fn preserves_pitch(&self) -> bool {
        self.lock().preserve_pitch
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.lock().muted
    }

    pub fn zoom(&self) -> f32 {
        self.lock().zoom
    }

    pub fn loaded_source(&self) -> Option<TrackSource> {
        self.lock().loaded.clone()
    }
}

pub struct SimulatedAdapter {
    handle: SimulatedHandle,
}

impl SimulatedAdapter {
    pub fn new(track_id: TrackId, duration: f64, events: EventSender) -> (Self, SimulatedHandle) {
        let handle = SimulatedHandle {
            state: Arc::new(Mutex::new(SimState {
                track_id,
                duration: duration.max(0.0),
                position: 0.0,
                playing: false,
                rate: 1.0,
                preserve_pitch: true,
                volume: 1.0,
                muted: false,
                zoom: 1.0,
                play_calls: 0,
                reject_play: false,
                loaded: None,
                events,
            })),
        };
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl PlaybackAdapter for SimulatedAdapter {
    fn load(&mut self, source: &TrackSource) -> Result<(), AdapterError> {
        let mut state = self.handle.lock();
        state.loaded = Some(source.clone());
        let duration = state.duration;
        state.emit(AdapterEventKind::Ready { duration });
        Ok(())
    }

    fn play(&mut self) -> Result<(), AdapterError> {
        let mut state = self.handle.lock();
        state.play_calls += 1;
        if state.reject_play {
            return Err(AdapterError::PlayRejected("simulated rejection".to_string()));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.handle.lock().playing = false;
    }

    fn set_time(&mut self, seconds: f64) {
        let mut state = self.handle.lock();
        let position = seconds.clamp(0.0, state.duration);
        state.position = position;
        state.emit(AdapterEventKind::TimeUpdate { seconds: position });
        if state.playing && position >= state.duration {
            state.playing = false;
            state.emit(AdapterEventKind::Finished);
        }
    }

    fn current_time(&self) -> f64 {
        self.handle.lock().position
    }

    fn duration(&self) -> f64 {
        self.handle.lock().duration
    }

    fn set_playback_rate(&mut self, rate: f64, preserve_pitch: bool) {
        let mut state = self.handle.lock();
        state.rate = rate;
        state.preserve_pitch = preserve_pitch;
    }

    fn set_volume(&mut self, volume: f32) {
        self.handle.lock().volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.handle.lock().muted = muted;
    }

    fn zoom(&mut self, level: f32) {
        self.handle.lock().zoom = level;
    }
}

#[derive(Debug, Default)]
struct BackendInner {
    handles: Vec<(TrackId, SimulatedHandle)>,
    durations: HashMap<String, f64>,
    default_duration: f64,
    fail_names: Vec<String>,
}

/// Adapter factory producing simulated adapters
///
/// Clones share the same registry, so a test can keep one clone while the
/// session owns the other.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    inner: Arc<Mutex<BackendInner>>,
}

impl SimulatedBackend {
    pub fn new(default_duration: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BackendInner {
                default_duration,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Duration given to adapters of tracks named `name`
    pub fn with_duration(self, name: impl Into<String>, duration: f64) -> Self {
        self.lock().durations.insert(name.into(), duration);
        self
    }

    /// Make adapter creation fail for tracks named `name`
    pub fn failing_for(self, name: impl Into<String>) -> Self {
        self.lock().fail_names.push(name.into());
        self
    }

    pub fn set_duration(&self, name: impl Into<String>, duration: f64) {
        self.lock().durations.insert(name.into(), duration);
    }

    /// Most recent adapter created for a track
    pub fn handle(&self, track_id: TrackId) -> Option<SimulatedHandle> {
        self.lock()
            .handles
            .iter()
            .rev()
            .find(|(id, _)| *id == track_id)
            .map(|(_, handle)| handle.clone())
    }

    /// Handles in creation order
    pub fn handles(&self) -> Vec<(TrackId, SimulatedHandle)> {
        self.lock().handles.clone()
    }

    /// Advance every adapter by `dt` seconds
    pub fn advance_all(&self, dt: f64) {
        for (_, handle) in self.handles() {
            handle.advance(dt);
        }
    }
}

impl AdapterFactory for SimulatedBackend {
    fn create(
        &mut self,
        track: &Track,
        events: EventSender,
    ) -> Result<Box<dyn PlaybackAdapter>, AdapterError> {
        let mut inner = self.lock();
        if inner.fail_names.iter().any(|n| *n == track.name) {
            return Err(AdapterError::Unavailable(format!(
                "no simulated output for {}",
                track.name
            )));
        }
        let duration = inner
            .durations
            .get(&track.name)
            .copied()
            .unwrap_or(inner.default_duration);
        let (adapter, handle) = SimulatedAdapter::new(track.id, duration, events);
        inner.handles.push((track.id, handle));
        Ok(Box::new(adapter))
    }
}
