// Practice session - the command surface the UI talks to
//
// Owns the track list, the transport, the loop engine, the recorder and the
// store, and drains the engine event queue on the caller's thread. Every
// mutating call persists the session snapshot afterwards; persistence errors
// only produce a warning.

mod editing;
mod recording;

#[cfg(test)]
mod rig;

use crate::command::CommandManager;
use crate::config::EngineConfig;
use crate::markers::{LoopState, MarkerLoopEngine};
use crate::messaging::{
    AdapterEventKind, EngineEvent, EventConsumer, EventSender, NotificationCategory, Notifier,
    SeekEpoch, create_event_channel,
};
use crate::project::{
    ProjectError, ProjectId, ProjectSettings, ProjectStore, validate_project_settings,
};
use crate::recording::{CaptureDevice, RecordingProcessor};
use crate::track::{Track, TrackError, TrackId, TrackList};
use crate::transport::{
    AdapterFactory, PlayReport, PlaybackState, SeekOrigin, SharedClock, TransportController,
    TransportSignal, UpdateOrigin,
};
use ringbuf::traits::Consumer;

/// External collaborators of a session
pub struct SessionParts {
    pub store: Box<dyn ProjectStore>,
    pub playback: Box<dyn AdapterFactory>,
    pub capture: Box<dyn CaptureDevice>,
    pub notifier: Notifier,
}

pub struct PracticeSession {
    config: EngineConfig,
    project_id: ProjectId,
    name: String,
    tracks: TrackList,
    transport: TransportController,
    loops: MarkerLoopEngine,
    recorder: RecordingProcessor,
    history: CommandManager,
    store: Box<dyn ProjectStore>,
    playback: Box<dyn AdapterFactory>,
    notifier: Notifier,
    events: EventConsumer,
    sender: EventSender,
}

impl PracticeSession {
    /// Start a new, empty project and save it
    pub fn create(config: EngineConfig, name: impl Into<String>, parts: SessionParts) -> Self {
        let mut session = Self::assemble(config, ProjectId::new(), name.into(), parts);
        log::info!(
            "Created project \"{}\" ({})",
            session.name,
            session.project_id
        );
        session.persist();
        session
    }

    /// Rebuild a session from a stored project
    ///
    /// Tracks whose adapter cannot be created stay in the list, silent.
    pub fn open(
        config: EngineConfig,
        project_id: ProjectId,
        parts: SessionParts,
    ) -> Result<Self, ProjectError> {
        let mut settings = parts.store.load_settings(project_id)?;
        let fixes = settings.loop_state.repair();
        if fixes > 0 {
            log::warn!(
                "Repaired {} inconsistency(ies) in the loops of project {}",
                fixes,
                project_id
            );
        }
        validate_project_settings(&settings, &config)?;

        let ProjectSettings {
            name,
            track_settings,
            loop_state,
            playback_rate,
            master_volume,
            ..
        } = settings;

        let mut session = Self::assemble(config, project_id, name, parts);
        session.tracks = TrackList::from_tracks(track_settings);
        session.loops.replace_state(loop_state);
        session.transport.set_playback_rate(playback_rate);
        session.transport.set_master_volume(master_volume);

        let with_audio: Vec<TrackId> = session
            .tracks
            .iter()
            .filter(|t| t.source.is_some())
            .map(|t| t.id)
            .collect();
        let mut attached = 0;
        for id in with_audio {
            if session.attach_adapter(id) {
                attached += 1;
            }
        }
        session.transport.apply_mix(&session.tracks);
        session.dispatch_events();

        log::info!(
            "Opened project \"{}\": {} tracks, {} playing, {} markers, {} loops",
            session.name,
            session.tracks.len(),
            attached,
            session.loops.state().markers().len(),
            session.loops.state().loops().len()
        );
        Ok(session)
    }

    fn assemble(
        config: EngineConfig,
        project_id: ProjectId,
        name: String,
        parts: SessionParts,
    ) -> Self {
        let (producer, events) = create_event_channel(config.queues.event_capacity);
        let epoch = SeekEpoch::new();
        let sender = EventSender::new(producer, epoch.clone());

        Self {
            transport: TransportController::new(config.transport.clone(), epoch),
            loops: MarkerLoopEngine::new(config.loops.clone()),
            recorder: RecordingProcessor::new(config.recording.clone(), parts.capture),
            history: CommandManager::with_capacity(config.queues.undo_depth),
            tracks: TrackList::new(),
            store: parts.store,
            playback: parts.playback,
            notifier: parts.notifier,
            config,
            project_id,
            name,
            events,
            sender,
        }
    }

    // Snapshots

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.transport.state()
    }

    pub fn loop_state(&self) -> &LoopState {
        self.loops.state()
    }

    pub fn tracks(&self) -> &TrackList {
        &self.tracks
    }

    pub fn master_volume(&self) -> f32 {
        self.transport.master_volume()
    }

    /// Playhead handle for a render loop
    pub fn clock(&self) -> SharedClock {
        self.transport.clock()
    }

    /// Handle for backends created outside the session
    pub fn event_sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Snapshot in the persisted form
    pub fn settings(&self) -> ProjectSettings {
        ProjectSettings::snapshot(
            &self.name,
            &self.tracks,
            self.loops.state(),
            self.transport.state().playback_rate,
            self.transport.master_volume(),
        )
    }

    // Transport

    /// Start playback, starting the armed recording first if there is one
    pub fn play(&mut self) -> PlayReport {
        if self.recorder.is_armed() {
            self.begin_recording();
        }

        let report = self.transport.play();
        for (track_id, error) in &report.rejected {
            let name = self.track_name(*track_id);
            self.notifier.warning(
                NotificationCategory::Transport,
                format!("\"{}\" could not start: {}", name, error),
            );
        }
        if report.rewound {
            self.on_all_finished();
        }
        report
    }

    /// Pause playback, ending any recording cycle in progress
    pub fn pause(&mut self) {
        if self.recorder.is_recording() {
            self.stop_recording();
        } else if self.recorder.is_armed() {
            self.disarm_track();
        }
        self.transport.pause();
    }

    pub fn toggle_play(&mut self) {
        if self.transport.state().is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// User seek; leaves the active loop unless the target is inside it
    pub fn seek(&mut self, time: f64) -> f64 {
        self.seek_with(time, SeekOrigin::User)
    }

    pub(crate) fn seek_with(&mut self, time: f64, origin: SeekOrigin) -> f64 {
        let target = self.transport.state().clamp_time(time);
        let disabled = self.loops.on_seek(target, origin.preserves_loop());
        let applied = self.transport.seek(target, origin);
        if disabled.is_some() {
            self.persist();
        }
        applied
    }

    pub fn set_playback_rate(&mut self, rate: f64) -> f64 {
        let applied = self.transport.set_playback_rate(rate);
        self.persist();
        applied
    }

    pub fn set_master_volume(&mut self, volume: f32) -> f32 {
        let applied = self.transport.set_master_volume(volume);
        self.transport.apply_mix(&self.tracks);
        self.persist();
        applied
    }

    /// Waveform zoom; view state only, not persisted
    pub fn set_zoom(&mut self, level: f32) {
        self.transport.set_zoom(level);
    }

    // Tracks

    /// Store imported audio and start playing it along with the others
    pub fn import_track(&mut self, name: impl Into<String>, bytes: &[u8]) -> Option<TrackId> {
        let limit = self.config.transport.max_tracks;
        if self.tracks.len() >= limit {
            self.reject_track_edit(TrackError::TrackLimitReached { limit });
            return None;
        }

        let name = name.into();
        let id = TrackId::new();
        let source = match self.store.save_track_file(self.project_id, id, bytes) {
            Ok(source) => source,
            Err(e) => {
                self.notifier.error(
                    NotificationCategory::Persistence,
                    format!("Could not store \"{}\": {}", name, e),
                );
                return None;
            }
        };

        let id = self
            .tracks
            .add(Track::imported_as(id, name, source), limit)
            .ok()?;
        self.attach_adapter(id);
        self.persist();
        Some(id)
    }

    /// Empty track waiting for a recording
    pub fn add_recordable_track(&mut self, name: impl Into<String>) -> Option<TrackId> {
        let track = Track::recordable(name);
        let added = self.tracks.add(track, self.config.transport.max_tracks);
        self.track_edit(added)
    }

    /// Remove a track, its adapter and its stored audio
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        if self.recorder.track_id() == Some(id) {
            self.clear_recording();
        }

        let track = match self.tracks.remove(id) {
            Ok(track) => track,
            Err(e) => {
                self.reject_track_edit(e);
                return false;
            }
        };
        self.transport.unregister_adapter(id);
        if let Some(source) = &track.source
            && let Err(e) = self.store.delete_track_file(self.project_id, source)
        {
            log::warn!("Could not delete audio of track {}: {}", id, e);
        }

        self.transport.apply_mix(&self.tracks);
        self.persist();
        log::info!("Removed track \"{}\"", track.name);
        true
    }

    pub fn rename_track(&mut self, id: TrackId, name: impl Into<String>) -> bool {
        let renamed = self.tracks.rename(id, name);
        self.track_edit(renamed).is_some()
    }

    pub fn set_track_volume(&mut self, id: TrackId, volume: f32) -> bool {
        let set = self.tracks.set_volume(id, volume);
        self.track_edit(set).is_some()
    }

    pub fn toggle_mute(&mut self, id: TrackId) -> Option<bool> {
        let toggled = self.tracks.toggle_mute(id);
        self.track_edit(toggled)
    }

    pub fn toggle_solo(&mut self, id: TrackId) -> Option<bool> {
        let toggled = self.tracks.toggle_solo(id);
        self.track_edit(toggled)
    }

    /// Solo one track, unsolo and unmute every other one
    pub fn exclusive_solo(&mut self, id: TrackId) -> bool {
        let soloed = self.tracks.exclusive_solo(id);
        self.track_edit(soloed).is_some()
    }

    pub fn unmute_all(&mut self) {
        self.tracks.unmute_all();
        self.transport.apply_mix(&self.tracks);
        self.persist();
    }

    // Event dispatch

    /// Process every queued backend event, returns how many were handled
    pub fn dispatch_events(&mut self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.events.try_pop() {
            processed += 1;
            match event {
                EngineEvent::Adapter {
                    track_id,
                    epoch,
                    kind,
                } => self.on_adapter_event(track_id, epoch, kind),
                EngineEvent::Capture(event) => self.on_capture_event(event),
            }
        }
        processed
    }

    fn on_adapter_event(&mut self, track_id: TrackId, epoch: u64, kind: AdapterEventKind) {
        match self.transport.handle_adapter_event(track_id, epoch, kind) {
            TransportSignal::TimeUpdate {
                time,
                origin: UpdateOrigin::Playback,
                ..
            } => {
                if self.transport.state().is_playing
                    && let Some(start) = self.loops.check_boundary(time)
                {
                    log::debug!("Loop end reached at {:.3}s, back to {:.3}s", time, start);
                    self.seek_with(start, SeekOrigin::LoopRepeat);
                }
            }
            TransportSignal::AllFinished => self.on_all_finished(),
            _ => {}
        }
    }

    /// Transport already paused and rewound
    fn on_all_finished(&mut self) {
        let disabled = self.loops.on_seek(0.0, false);
        if self.recorder.is_recording() {
            self.stop_recording();
        } else if self.recorder.is_armed() {
            self.disarm_track();
        }
        if disabled.is_some() {
            self.persist();
        }
    }

    // Helpers

    /// Create, load and register the adapter of a track with audio
    fn attach_adapter(&mut self, id: TrackId) -> bool {
        let Some(track) = self.tracks.get(id) else {
            return false;
        };
        let Some(source) = track.source.clone() else {
            return false;
        };
        let name = track.name.clone();

        let created = self.playback.create(track, self.sender.clone());
        let loaded = created.and_then(|mut adapter| {
            adapter.load(&source)?;
            Ok(adapter)
        });
        match loaded {
            Ok(adapter) => {
                self.transport.register_adapter(id, adapter);
                self.transport.apply_mix(&self.tracks);
                true
            }
            Err(e) => {
                self.notifier.warning(
                    NotificationCategory::Transport,
                    format!("\"{}\" cannot be played: {}", name, e),
                );
                false
            }
        }
    }

    fn track_edit<T>(&mut self, result: Result<T, TrackError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.transport.apply_mix(&self.tracks);
                self.persist();
                Some(value)
            }
            Err(e) => {
                self.reject_track_edit(e);
                None
            }
        }
    }

    fn reject_track_edit(&mut self, error: TrackError) {
        self.notifier
            .warning(NotificationCategory::Transport, error.to_string());
    }

    fn track_name(&self, id: TrackId) -> String {
        self.tracks
            .get(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Save the session snapshot; failures are reported, never returned
    fn persist(&mut self) {
        let settings = self.settings();
        if let Err(e) = self.store.save_settings(self.project_id, &settings) {
            self.notifier.warning(
                NotificationCategory::Persistence,
                format!("Could not save project: {}", e),
            );
        }
    }
}
