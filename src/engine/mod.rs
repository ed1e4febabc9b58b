//! Engines: drive compiled units block by block over a shared arena.
//!
//! `MonoEngine` runs one instance. `PolyEngine` runs a fixed pool of voice
//! instances mixed into one output, optionally followed by a global effect.

pub mod base;
pub mod mono;
pub mod pool;
pub mod poly;
pub mod voice;

pub use base::{
    BlockOutcome, ComputeHandler, DspEngine, EngineCore, OutputParamHandler, PlotHandler,
    report_param,
};
pub use mono::MonoEngine;
pub use pool::VoicePool;
pub use poly::PolyEngine;
pub use voice::{Voice, VoiceNote};
