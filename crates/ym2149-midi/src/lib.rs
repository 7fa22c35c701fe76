//! MIDI voice driver for a real YM2149 / AY-3-8910 PSG
//!
//! Drives a physical YM2149 over its BDIR/BC1 control lines and 8-bit data bus,
//! and maps a stream of note-on/note-off events onto the chip's three tone
//! channels with a shared hardware envelope.
//!
//! # Components
//! - [`bus`] - timed register-write protocol (declarative bus program, FIFO sequencer)
//! - [`pitch`] - note/frequency to 12-bit tone period conversion
//! - [`scheduler`] - per-channel cancellable release timers
//! - [`voice`] - the voice allocator state machine
//! - [`dispatch`] - translation of decoded source events into allocator calls
//! - [`engine`] - single-writer thread owning the dispatcher and its timers
//! - [`setup`] - chip startup sequence
//! - [`playback`] - fixed-tune playback and mixer test setups
//! - [`snapshot`] - decoding a register bank back into channel state
//!
//! # Quick start
//! ```
//! use std::time::Instant;
//! use ym2149_midi::bus::RecordingBus;
//! use ym2149_midi::{DriverConfig, EventDispatcher, NoteEvent};
//!
//! let config = DriverConfig::default();
//! let mut dispatcher = EventDispatcher::new(RecordingBus::new(), &config);
//! dispatcher.startup().unwrap();
//!
//! let now = Instant::now();
//! dispatcher.dispatch(NoteEvent::note_on(1, 60, 100), now).unwrap();
//! dispatcher.dispatch(NoteEvent::note_off(1, 60, 0), now).unwrap();
//!
//! let regs = dispatcher.allocator().bus().registers();
//! assert_eq!(regs[8], 0x10);
//! ```

#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod pitch;
pub mod playback;
pub mod registers;
pub mod scheduler;
pub mod setup;
pub mod snapshot;
pub mod voice;

/// Error types for driver operations
///
/// Logical event problems (out-of-range channels, unknown notes) are never
/// reported here; they are clamped or ignored by the allocator.
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    /// The bus transport failed while a write was in flight
    #[error("Bus fault: {0}")]
    BusFault(String),

    /// A previous fault halted the bus; no further writes are accepted
    #[error("Bus halted after an earlier fault")]
    BusHalted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The engine thread is no longer accepting events
    #[error("Engine stopped")]
    EngineStopped,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for DriverError {
    /// Converts a String into `DriverError::Other`.
    ///
    /// Prefer the specific variants (`BusFault`, `ConfigError`) where the
    /// failure class is known.
    fn from(msg: String) -> Self {
        DriverError::Other(msg)
    }
}

impl From<&str> for DriverError {
    fn from(msg: &str) -> Self {
        DriverError::Other(msg.to_string())
    }
}

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

// Public API exports
pub use bus::{RegisterBus, SequencedBus};
pub use config::DriverConfig;
pub use dispatch::{EventDispatcher, NoteEvent};
pub use engine::{Engine, EngineHandle};
pub use pitch::ToneValue;
pub use registers::{Channel, Register, RegisterBank};
pub use scheduler::EnvelopeScheduler;
pub use snapshot::ChannelStates;
pub use voice::VoiceAllocator;
