// Recording on the session - arm / capture / store one take
//
// The recorder measures and processes; this side moves the track's record
// state, puts the loop back when the cycle ends and turns the take into a
// regular track with its own adapter.

use super::PracticeSession;
use crate::messaging::{CaptureEvent, NotificationCategory};
use crate::recording::{CaptureError, LoopBackup, RecordedTake, Release};
use crate::track::{RecordState, TrackId};

impl PracticeSession {
    pub fn recording_phase(&self) -> RecordState {
        self.recorder.phase()
    }

    pub fn recording_track(&self) -> Option<TrackId> {
        self.recorder.track_id()
    }

    /// Prepare a recordable track; capture starts on the next `play`
    ///
    /// The active loop is switched off until the cycle ends.
    pub fn arm_track(&mut self, id: TrackId) -> bool {
        let Some(track) = self.tracks.get(id) else {
            self.notifier
                .warning(NotificationCategory::Recording, format!("Unknown track {}", id));
            return false;
        };
        if !track.recordable {
            let message = format!("\"{}\" already has audio and cannot record", track.name);
            self.notifier
                .warning(NotificationCategory::Recording, message);
            return false;
        }

        let backup = LoopBackup {
            active_loop: self.loops.state().active_loop_id(),
        };
        let now = self.transport.clock().seconds();
        if let Err(e) = self.recorder.arm(id, now, backup) {
            self.notifier
                .warning(NotificationCategory::Recording, e.user_message());
            return false;
        }

        self.loops.disable_active_loop();
        self.set_record_state(id, RecordState::Armed);
        self.persist();
        true
    }

    /// Leave the armed state without recording
    pub fn disarm_track(&mut self) -> bool {
        match self.recorder.disarm() {
            Ok(release) => {
                self.release(release);
                true
            }
            Err(e) => {
                log::debug!("Disarm ignored: {}", e);
                false
            }
        }
    }

    /// Throw away whatever the current cycle captured
    pub fn clear_recording(&mut self) -> bool {
        match self.recorder.clear() {
            Some(release) => {
                log::info!("Recording on track {} cleared", release.track_id);
                self.release(release);
                true
            }
            None => false,
        }
    }

    /// Called by `play` when a track is armed
    pub(super) fn begin_recording(&mut self) {
        let now = self.transport.clock().seconds();
        match self.recorder.begin(now, self.sender.clone()) {
            Ok(()) => {
                if let Some(id) = self.recorder.track_id() {
                    self.set_record_state(id, RecordState::Recording);
                }
            }
            Err(e) => {
                self.notifier
                    .error(NotificationCategory::Recording, e.user_message());
                if let Some(release) = self.recorder.finish() {
                    self.release(release);
                }
            }
        }
    }

    /// Called by `pause` and at the end of playback
    pub(super) fn stop_recording(&mut self) {
        match self.recorder.stop() {
            Ok(()) => {
                if let Some(id) = self.recorder.track_id() {
                    self.set_record_state(id, RecordState::Stopped);
                }
            }
            Err(e) => log::warn!("Stop ignored: {}", e),
        }
    }

    pub(super) fn on_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Started => {
                let actual = self
                    .transport
                    .live_time()
                    .unwrap_or_else(|| self.transport.clock().seconds());
                self.recorder.on_capture_started(actual);
            }
            CaptureEvent::Completed { bytes, format_hint } => {
                let result = self.recorder.complete(&bytes, format_hint.as_deref());
                let release = self.recorder.finish();
                match result {
                    Ok(take) => self.store_take(take),
                    Err(e) => self
                        .notifier
                        .error(NotificationCategory::Recording, e.user_message()),
                }
                if let Some(release) = release {
                    self.release(release);
                }
            }
            CaptureEvent::Failed(error) => self.on_capture_failed(&error),
        }
    }

    fn on_capture_failed(&mut self, error: &CaptureError) {
        let Some(release) = self.recorder.fail(error) else {
            log::debug!("Capture failure outside a recording: {}", error);
            return;
        };
        let category = NotificationCategory::Recording;
        if error.is_permission() {
            self.notifier.error(category, error.user_message());
        } else {
            self.notifier
                .error(category, format!("Recording stopped. {}", error.user_message()));
        }
        self.release(release);
    }

    /// Save the take and make the track play it from now on
    fn store_take(&mut self, take: RecordedTake) {
        let id = take.track_id;
        let source = match self.store.save_track_file(self.project_id, id, &take.wav) {
            Ok(source) => source,
            Err(e) => {
                self.notifier.error(
                    NotificationCategory::Persistence,
                    format!("Could not store the recording: {}", e),
                );
                return;
            }
        };

        let Some(track) = self.tracks.get_mut(id) else {
            log::warn!("Track {} disappeared before its take was stored", id);
            return;
        };
        track.source = Some(source);
        track.recordable = false;
        let name = track.name.clone();

        self.attach_adapter(id);
        self.notifier.info(
            NotificationCategory::Recording,
            format!(
                "Recorded {:.1}s on \"{}\" (latency {:.0} ms)",
                take.duration,
                name,
                take.measurement.latency() * 1000.0
            ),
        );
    }

    /// End of a cycle: track back to idle, loop back on
    fn release(&mut self, release: Release) {
        self.set_record_state(release.track_id, RecordState::Idle);
        if self.loops.restore_active_loop(release.backup.active_loop) {
            log::debug!("Loop restored after recording");
        }
        self.persist();
    }

    fn set_record_state(&mut self, id: TrackId, state: RecordState) {
        if let Some(track) = self.tracks.get_mut(id) {
            track.record_state = state;
        }
    }
}
