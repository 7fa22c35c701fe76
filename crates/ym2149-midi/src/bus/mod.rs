//! Register bus abstraction
//!
//! Everything above this module talks to the chip through [`RegisterBus`];
//! only the implementations here know about control lines and timing.

pub mod program;
pub mod recording;
pub mod sequencer;

use crate::pitch::ToneValue;
use crate::registers::{Channel, Register};
use crate::Result;

pub use program::{BusProgram, BusStep, ControlLines, DataSource};
pub use recording::{RecordingBus, ShadowBus};
pub use sequencer::{CommandFifo, LineEvent, PinDriver, PinTrace, SequencedBus, SoftSequencer};

/// Write-only access to the chip's 16 registers.
///
/// A write is synchronous: it returns once the chip has latched the value.
/// Errors are hardware faults and are never retried by callers.
///
/// # Example
///
/// ```
/// use ym2149_midi::bus::{RecordingBus, RegisterBus};
/// use ym2149_midi::{Channel, ToneValue};
///
/// let mut bus = RecordingBus::new();
/// bus.write_tone(Channel::B, ToneValue::from_raw(0x1EE)).unwrap();
/// assert_eq!(bus.writes(), &[(2, 0xEE), (3, 0x01)]);
/// ```
pub trait RegisterBus: Send {
    /// Write `value` to register `addr`.
    ///
    /// Only the low four bits of `addr` select a register.
    fn write(&mut self, addr: u8, value: u8) -> Result<()>;

    /// Write a named register.
    fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        self.write(reg.addr(), value)
    }

    /// Write a channel's tone period: low byte, then high byte.
    fn write_tone(&mut self, channel: Channel, tone: ToneValue) -> Result<()> {
        let (lo, hi) = channel.tone_registers();
        self.write_register(lo, tone.lo())?;
        self.write_register(hi, tone.hi())
    }

    /// Write a channel's level register.
    fn write_level(&mut self, channel: Channel, level: u8) -> Result<()> {
        self.write_register(channel.level_register(), level)
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn write(&mut self, addr: u8, value: u8) -> Result<()> {
        (**self).write(addr, value)
    }
}
