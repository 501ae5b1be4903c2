// Recording processor - arm / record / stop state machine for one take at a time
//
// idle → armed → recording → stopped → idle
//
// The processor owns the capture device and the loop backup taken on arm. It
// never touches the transport: callers pass the transport times in.

use crate::config::RecordingConfig;
use crate::markers::LoopId;
use crate::messaging::EventSender;
use crate::recording::alignment::LatencyMeasurement;
use crate::recording::capture::{CaptureDevice, CaptureError};
use crate::recording::processing::{ProcessingError, process_take};
use crate::recording::wav::encode_take;
use crate::track::{RecordState, TrackId};

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("A recording is already in progress")]
    AlreadyActive,

    #[error("Nothing is armed")]
    NotArmed,

    #[error("Recording is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: RecordState,
        actual: RecordState,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Failed to process take: {0}")]
    Processing(#[from] ProcessingError),
}

impl RecordingError {
    /// Message suitable for the user
    pub fn user_message(&self) -> String {
        match self {
            RecordingError::Capture(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Loop state saved on arm, restored when the take ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopBackup {
    pub active_loop: Option<LoopId>,
}

/// Ephemeral data of the take in progress
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    pub track_id: TrackId,
    /// Transport time when capture was requested
    ///
    /// Set at arm and refreshed from the clock at begin. Both readings match
    /// unless the playhead moved while the track was armed.
    pub expected_start_offset: f64,
    /// Transport time observed when capture truly began
    pub actual_start_offset: Option<f64>,
    /// Encoded result, once processed
    pub buffer: Option<Vec<u8>>,
}

impl RecordingSession {
    fn measurement(&self) -> LatencyMeasurement {
        LatencyMeasurement::new(
            self.expected_start_offset,
            self.actual_start_offset
                .unwrap_or(self.expected_start_offset),
        )
    }
}

/// A processed take, ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTake {
    pub track_id: TrackId,
    /// 16-bit stereo WAV bytes
    pub wav: Vec<u8>,
    pub measurement: LatencyMeasurement,
    /// Offset the audio starts at on the timeline
    pub offset: f64,
    pub padding_frames: usize,
    /// Duration including the leading silence
    pub duration: f64,
    pub gain: f32,
}

/// End of an arm/disarm cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Release {
    pub track_id: TrackId,
    pub backup: LoopBackup,
}

pub struct RecordingProcessor {
    config: RecordingConfig,
    device: Box<dyn CaptureDevice>,
    phase: RecordState,
    session: Option<RecordingSession>,
    backup: LoopBackup,
}

impl RecordingProcessor {
    pub fn new(config: RecordingConfig, device: Box<dyn CaptureDevice>) -> Self {
        Self {
            config,
            device,
            phase: RecordState::Idle,
            session: None,
            backup: LoopBackup::default(),
        }
    }

    pub fn phase(&self) -> RecordState {
        self.phase
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn track_id(&self) -> Option<TrackId> {
        self.session.as_ref().map(|s| s.track_id)
    }

    pub fn is_armed(&self) -> bool {
        self.phase == RecordState::Armed
    }

    pub fn is_recording(&self) -> bool {
        self.phase == RecordState::Recording
    }

    /// Prepare `track_id` to record on the next play
    pub fn arm(
        &mut self,
        track_id: TrackId,
        transport_time: f64,
        backup: LoopBackup,
    ) -> Result<(), RecordingError> {
        if self.phase != RecordState::Idle {
            return Err(RecordingError::AlreadyActive);
        }
        self.session = Some(RecordingSession {
            track_id,
            expected_start_offset: transport_time,
            actual_start_offset: None,
            buffer: None,
        });
        self.backup = backup;
        self.phase = RecordState::Armed;
        log::info!("Track {} armed at {:.3}s", track_id, transport_time);
        Ok(())
    }

    /// Start capturing; `transport_time` becomes the expected start offset
    pub fn begin(&mut self, transport_time: f64, events: EventSender) -> Result<(), RecordingError> {
        self.expect(RecordState::Armed)?;
        self.device.start(events)?;
        if let Some(session) = self.session.as_mut() {
            session.expected_start_offset = transport_time;
        }
        self.phase = RecordState::Recording;
        log::info!("Recording started at {:.3}s", transport_time);
        Ok(())
    }

    /// Capture truly began: record the sample-accurate transport time
    pub fn on_capture_started(&mut self, live_time: f64) -> Option<LatencyMeasurement> {
        if self.phase != RecordState::Recording {
            log::debug!("Capture start signal while {:?}, ignored", self.phase);
            return None;
        }
        let session = self.session.as_mut()?;
        session.actual_start_offset = Some(live_time);
        let m = session.measurement();
        log::info!(
            "Capture latency {:.1} ms, take aligned at {:.4}s",
            m.latency() * 1000.0,
            m.compensated_offset()
        );
        Some(m)
    }

    /// Stop capturing; the device will deliver the take
    pub fn stop(&mut self) -> Result<(), RecordingError> {
        self.expect(RecordState::Recording)?;
        self.device.stop();
        self.phase = RecordState::Stopped;
        log::info!("Recording stopped");
        Ok(())
    }

    /// Leave the armed state without recording
    pub fn disarm(&mut self) -> Result<Release, RecordingError> {
        self.expect(RecordState::Armed)?;
        log::info!("Track disarmed");
        self.finish().ok_or(RecordingError::NotArmed)
    }

    /// Turn the captured bytes into an aligned take
    ///
    /// The cycle ends either way; call `finish` for the loop backup.
    pub fn complete(
        &mut self,
        bytes: &[u8],
        format_hint: Option<&str>,
    ) -> Result<RecordedTake, RecordingError> {
        if !matches!(self.phase, RecordState::Recording | RecordState::Stopped) {
            return Err(RecordingError::InvalidState {
                expected: RecordState::Stopped,
                actual: self.phase,
            });
        }
        self.phase = RecordState::Stopped;
        let session = self.session.as_mut().ok_or(RecordingError::NotArmed)?;
        if session.actual_start_offset.is_none() {
            log::warn!("Take completed without a start signal, assuming no latency");
        }

        let measurement = session.measurement();
        let offset = measurement.compensated_offset();
        let processed = process_take(bytes, format_hint, offset, &self.config)?;
        let wav = encode_take(&processed)?;
        session.buffer = Some(wav.clone());

        log::info!(
            "Take processed: {:.2}s, {} padding frames, gain {:.2}",
            processed.duration(),
            processed.padding_frames,
            processed.gain
        );
        Ok(RecordedTake {
            track_id: session.track_id,
            wav,
            measurement,
            offset,
            padding_frames: processed.padding_frames,
            duration: processed.duration(),
            gain: processed.gain,
        })
    }

    /// Device failure: roll back to idle
    pub fn fail(&mut self, error: &CaptureError) -> Option<Release> {
        if self.phase == RecordState::Idle {
            return None;
        }
        log::warn!("Recording failed in {:?}: {}", self.phase, error);
        self.device.discard();
        self.finish()
    }

    /// Throw the take away and return to idle
    pub fn clear(&mut self) -> Option<Release> {
        if self.phase == RecordState::Idle {
            return None;
        }
        self.device.discard();
        self.finish()
    }

    /// End the cycle, handing back the loop backup
    pub fn finish(&mut self) -> Option<Release> {
        self.phase = RecordState::Idle;
        let backup = std::mem::take(&mut self.backup);
        self.session.take().map(|s| Release {
            track_id: s.track_id,
            backup,
        })
    }

    fn expect(&self, expected: RecordState) -> Result<(), RecordingError> {
        if self.phase == expected {
            Ok(())
        } else if expected == RecordState::Armed && self.phase == RecordState::Idle {
            Err(RecordingError::NotArmed)
        } else {
            Err(RecordingError::InvalidState {
                expected,
                actual: self.phase,
            })
        }
    }
}
