//! Declarative bus-timing program.
//!
//! A register write on the YM2149 is two latch phases on the shared data bus:
//! the address is latched with BDIR+BC1 high, then the value is written with
//! BDIR high alone. Each phase must be held for a minimum settle time and is
//! followed by an inactive gap. The program below describes that sequence as
//! data so a sequencer (hardware state machine or software loop) can execute
//! it without any timing knowledge of its own.

use std::time::Duration;

use bitflags::bitflags;

/// Default sequencer clock: 5 MHz, 200 ns per cycle.
pub const DEFAULT_SEQUENCER_HZ: u32 = 5_000_000;

/// Cycles each latch phase is held (including the FIFO pull / output cycles).
pub const LATCH_HOLD_CYCLES: u32 = 21;

/// Cycles of the inactive gap after each latch phase.
pub const INACTIVE_HOLD_CYCLES: u32 = 4;

bitflags! {
    /// Bus control lines (BC2 is strapped high on the board).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlLines: u8 {
        /// BC1 - bus control 1
        const BC1 = 0b01;
        /// BDIR - bus direction
        const BDIR = 0b10;
    }
}

impl ControlLines {
    /// Inactive: the chip ignores the data bus.
    pub const INACTIVE: ControlLines = ControlLines::empty();
    /// Latch address: BDIR and BC1 high.
    pub const LATCH_ADDRESS: ControlLines = ControlLines::BDIR.union(ControlLines::BC1);
    /// Write to the latched register: BDIR high, BC1 low.
    pub const WRITE_DATA: ControlLines = ControlLines::BDIR;
}

/// What the sequencer drives onto the data pins during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Shift the register address out of the command word.
    Address,
    /// Shift the register value out of the command word.
    Value,
    /// Leave the data pins as they are.
    Hold,
}

/// One step of the bus program: set the control lines, optionally present a
/// byte, and hold for a number of sequencer cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusStep {
    /// Control line state for the step
    pub lines: ControlLines,
    /// Byte presented on the data bus
    pub data: DataSource,
    /// Sequencer cycles the step lasts
    pub cycles: u32,
}

impl BusStep {
    const fn new(lines: ControlLines, data: DataSource, cycles: u32) -> Self {
        Self {
            lines,
            data,
            cycles,
        }
    }
}

/// Ordered list of bus steps executed once per register write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusProgram {
    steps: Vec<BusStep>,
}

impl BusProgram {
    /// The YM2149 write cycle: address latch, gap, data write, gap.
    pub fn ym2149() -> Self {
        Self {
            steps: vec![
                BusStep::new(
                    ControlLines::LATCH_ADDRESS,
                    DataSource::Address,
                    LATCH_HOLD_CYCLES,
                ),
                BusStep::new(
                    ControlLines::INACTIVE,
                    DataSource::Hold,
                    INACTIVE_HOLD_CYCLES,
                ),
                BusStep::new(
                    ControlLines::WRITE_DATA,
                    DataSource::Value,
                    LATCH_HOLD_CYCLES,
                ),
                BusStep::new(
                    ControlLines::INACTIVE,
                    DataSource::Hold,
                    INACTIVE_HOLD_CYCLES,
                ),
            ],
        }
    }

    /// Program steps in execution order.
    pub fn steps(&self) -> &[BusStep] {
        &self.steps
    }

    /// Total sequencer cycles for one write.
    pub fn total_cycles(&self) -> u32 {
        self.steps.iter().map(|s| s.cycles).sum()
    }

    /// Wall-clock length of one write at the given sequencer clock.
    pub fn write_duration(&self, sequencer_hz: u32) -> Duration {
        cycles_to_duration(self.total_cycles(), sequencer_hz)
    }

    /// Control lines the program leaves the bus in.
    pub fn idle_lines(&self) -> ControlLines {
        self.steps
            .last()
            .map(|s| s.lines)
            .unwrap_or(ControlLines::INACTIVE)
    }
}

impl Default for BusProgram {
    fn default() -> Self {
        Self::ym2149()
    }
}

/// Convert sequencer cycles into a duration.
#[inline]
pub fn cycles_to_duration(cycles: u32, sequencer_hz: u32) -> Duration {
    if sequencer_hz == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(cycles as u64 * 1_000_000_000 / sequencer_hz as u64)
}

/// Pack one register write into a FIFO word.
///
/// The address sits in the low byte so it is shifted out first; the value
/// follows in the next byte.
#[inline]
pub fn encode_word(addr: u8, value: u8) -> u32 {
    ((value as u32) << 8) | addr as u32
}

/// Split a FIFO word back into `(address, value)`.
#[inline]
pub fn decode_word(word: u32) -> (u8, u8) {
    ((word & 0xFF) as u8, ((word >> 8) & 0xFF) as u8)
}
