// Stemloop - multi-stem practice player: synchronized transport, loops, aligned recording

pub mod command;
pub mod config;
pub mod markers;
pub mod messaging;
pub mod project;
pub mod recording;
pub mod session;
pub mod track;
pub mod transport;

// Re-export commonly used types for convenience
pub use command::{CommandManager, UndoableCommand};
pub use config::EngineConfig;
pub use markers::{GestureOutcome, LoopId, LoopState, MarkerId, MarkerLoopEngine};
pub use messaging::{
    Notification, NotificationCategory, NotificationLevel, Notifier, create_notification_channel,
};
pub use project::{FileProjectStore, MemoryProjectStore, ProjectId, ProjectSettings, ProjectStore};
pub use recording::{CaptureDevice, CaptureError, RecordingProcessor, SimulatedCapture};
pub use session::{PracticeSession, SessionParts};
pub use track::{Track, TrackId, TrackList};
pub use transport::{
    AdapterFactory, PlaybackAdapter, PlaybackState, SeekOrigin, SimulatedBackend,
    TransportController,
};
