// Transport - one logical clock over every track's playback adapter

pub mod adapter;
pub mod controller;
pub mod simulated;
pub mod state;

pub use adapter::{AdapterError, AdapterFactory, PlaybackAdapter};
pub use controller::{
    PlayReport, SeekOrigin, TransportController, TransportSignal, UpdateOrigin,
};
pub use simulated::{SimulatedAdapter, SimulatedBackend, SimulatedHandle};
pub use state::{PlaybackState, SharedClock};
