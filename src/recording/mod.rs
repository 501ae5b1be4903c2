// Recording - capture a new take aligned to the shared timeline

pub mod alignment;
pub mod capture;
pub mod processing;
pub mod session;
pub mod wav;

pub use alignment::{LatencyMeasurement, compensated_offset, padding_frames};
pub use capture::{CaptureDevice, CaptureError, SimulatedCapture, SimulatedCaptureHandle};
pub use processing::{DecodedAudio, ProcessedTake, ProcessingError, process_take};
pub use session::{
    LoopBackup, RecordedTake, RecordingError, RecordingProcessor, RecordingSession, Release,
};
pub use wav::{WAV_HEADER_LEN, encode_stereo_pcm16};
