// Event Trace Module
// Structured, replayable records of detector steps

pub mod event;
pub mod log;
mod recorder;

pub use event::*;
pub use log::*;
pub(crate) use recorder::TraceRecorder;
