//! YM2149 register map and channel addressing
//!
//! The chip exposes 16 registers (R0-R13 sound, R14-R15 I/O ports). The
//! driver only ever writes the sound registers, but startup clears all 16.

use std::fmt;

/// Number of addressable registers on the chip.
pub const REGISTER_COUNT: usize = 16;

/// Number of tone channels on the chip.
pub const CHANNEL_COUNT: usize = 3;

/// Level register bits 0-3: fixed amplitude.
pub const LEVEL_MASK: u8 = 0x0F;

/// Level register bit 4: channel follows the envelope generator.
pub const USE_ENVELOPE: u8 = 0x10;

/// Mixer value with tone enabled and noise disabled on all three channels.
pub const MIXER_TONES_ONLY: u8 = 0x38;

/// Envelope shape written to R13 while any note is held (attack, then hold high).
pub const ENVELOPE_ON: u8 = 0x0D;

/// R13 value while no note is held.
pub const ENVELOPE_OFF: u8 = 0x00;

/// YM2149 Register Address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Channel A tone period (low byte) - R0
    ToneALo = 0x00,
    /// Channel A tone period (high nibble) - R1
    ToneAHi = 0x01,
    /// Channel B tone period (low byte) - R2
    ToneBLo = 0x02,
    /// Channel B tone period (high nibble) - R3
    ToneBHi = 0x03,
    /// Channel C tone period (low byte) - R4
    ToneCLo = 0x04,
    /// Channel C tone period (high nibble) - R5
    ToneCHi = 0x05,
    /// Noise period - R6
    NoisePeriod = 0x06,
    /// Mixer (tone/noise enables, active low) - R7
    Mixer = 0x07,
    /// Channel A level - R8
    LevelA = 0x08,
    /// Channel B level - R9
    LevelB = 0x09,
    /// Channel C level - R10
    LevelC = 0x0A,
    /// Envelope period (low byte) - R11
    EnvelopePeriodLo = 0x0B,
    /// Envelope period (high byte) - R12
    EnvelopePeriodHi = 0x0C,
    /// Envelope shape / enable - R13
    EnvelopeShape = 0x0D,
    /// I/O Port A - R14
    PortA = 0x0E,
    /// I/O Port B - R15
    PortB = 0x0F,
}

impl Register {
    /// All registers in address order.
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::ToneALo,
        Register::ToneAHi,
        Register::ToneBLo,
        Register::ToneBHi,
        Register::ToneCLo,
        Register::ToneCHi,
        Register::NoisePeriod,
        Register::Mixer,
        Register::LevelA,
        Register::LevelB,
        Register::LevelC,
        Register::EnvelopePeriodLo,
        Register::EnvelopePeriodHi,
        Register::EnvelopeShape,
        Register::PortA,
        Register::PortB,
    ];

    /// Convert a raw register number to a Register; only the low nibble is decoded.
    pub fn from_addr(addr: u8) -> Self {
        Self::ALL[(addr & 0x0F) as usize]
    }

    /// Get the register address value
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::ToneALo => "Tone A Low",
            Register::ToneAHi => "Tone A High",
            Register::ToneBLo => "Tone B Low",
            Register::ToneBHi => "Tone B High",
            Register::ToneCLo => "Tone C Low",
            Register::ToneCHi => "Tone C High",
            Register::NoisePeriod => "Noise Period",
            Register::Mixer => "Mixer",
            Register::LevelA => "Level A",
            Register::LevelB => "Level B",
            Register::LevelC => "Level C",
            Register::EnvelopePeriodLo => "Envelope Period Low",
            Register::EnvelopePeriodHi => "Envelope Period High",
            Register::EnvelopeShape => "Envelope Shape",
            Register::PortA => "I/O Port A",
            Register::PortB => "I/O Port B",
        };
        write!(f, "R{} ({})", self.addr(), name)
    }
}

/// One of the three hardware tone channels (A=0, B=1, C=2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    /// Channel A
    pub const A: Channel = Channel(0);
    /// Channel B
    pub const B: Channel = Channel(1);
    /// Channel C
    pub const C: Channel = Channel(2);

    /// All channels in register order.
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel::A, Channel::B, Channel::C];

    /// Zero-based channel index; anything past the last channel folds onto C.
    pub fn clamped(index: usize) -> Self {
        Channel(index.min(CHANNEL_COUNT - 1) as u8)
    }

    /// Zero-based index for per-channel arrays.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Tone period register pair (low, high).
    pub fn tone_registers(self) -> (Register, Register) {
        let lo = self.0 * 2;
        (Register::from_addr(lo), Register::from_addr(lo + 1))
    }

    /// Level/amplitude register for this channel.
    pub fn level_register(self) -> Register {
        Register::from_addr(Register::LevelA.addr() + self.0)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ['A', 'B', 'C'][self.index()];
        write!(f, "{name}")
    }
}

/// Level register value for a note velocity with the envelope flag set.
///
/// Velocity is divided by 8 and masked to four bits, so values above 127
/// wrap rather than fault.
#[inline]
pub fn level_for_velocity(velocity: u8) -> u8 {
    ((velocity / 8) & LEVEL_MASK) | USE_ENVELOPE
}

/// Shadow copy of the 16 chip registers.
///
/// The chip is write-only from the driver's point of view; this bank mirrors
/// what has been sent so observers can inspect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterBank {
    /// Register values R0-R15
    pub registers: [u8; REGISTER_COUNT],
}

impl RegisterBank {
    /// Create a new register bank with all values set to 0
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; REGISTER_COUNT],
        }
    }

    /// Read a register value
    pub fn read(&self, addr: u8) -> u8 {
        self.registers[(addr & 0x0F) as usize]
    }

    /// Write a register value
    pub fn write(&mut self, addr: u8, value: u8) {
        self.registers[(addr & 0x0F) as usize] = value;
    }

    /// Get all registers as an array reference
    pub fn as_array(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}
