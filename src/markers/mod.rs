// Markers and loops - practice regions on the shared timeline

pub mod engine;
pub mod gesture;
pub mod loop_region;
pub mod marker;
pub mod state;

pub use engine::{GestureOutcome, MarkerLoopEngine};
pub use gesture::Gesture;
pub use loop_region::{Loop, LoopId, LoopSpan};
pub use marker::{Marker, MarkerId};
pub use state::{LoopCreation, LoopError, LoopLimits, LoopState, MarkerRemoval};
