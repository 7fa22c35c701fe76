//! FIFO-fed bus sequencer.
//!
//! On hardware the register words are pushed into the TX FIFO of a
//! programmable I/O state machine which runs the [`BusProgram`]. The
//! [`CommandFifo`] trait is that queue; [`SoftSequencer`] is a software
//! rendition executing the same program against a [`PinDriver`].

use std::time::Duration;

use log::{debug, error, trace};

use super::program::{
    cycles_to_duration, decode_word, encode_word, BusProgram, ControlLines, DataSource,
    DEFAULT_SEQUENCER_HZ,
};
use super::RegisterBus;
use crate::{DriverError, Result};

/// Queue of packed register words feeding a bus sequencer.
pub trait CommandFifo: Send {
    /// Enqueue one packed write (see [`encode_word`]).
    ///
    /// An error means the sequencer can no longer be trusted; the caller
    /// treats it as a fatal hardware fault.
    fn push(&mut self, word: u32) -> Result<()>;
}

/// Output side of a sequencer: the control and data pins.
pub trait PinDriver: Send {
    /// Drive the two control lines.
    fn set_control(&mut self, lines: ControlLines);

    /// Drive the eight data lines.
    fn set_data(&mut self, value: u8);

    /// Hold the current pin state for `duration`.
    fn hold(&mut self, duration: Duration);
}

/// Executes a [`BusProgram`] in software for every pushed word.
pub struct SoftSequencer<P: PinDriver> {
    program: BusProgram,
    pins: P,
    sequencer_hz: u32,
}

impl<P: PinDriver> SoftSequencer<P> {
    /// Create a sequencer running the YM2149 program at the default clock.
    pub fn new(pins: P) -> Self {
        Self::with_program(pins, BusProgram::ym2149(), DEFAULT_SEQUENCER_HZ)
    }

    /// Create a sequencer with an explicit program and clock.
    pub fn with_program(pins: P, program: BusProgram, sequencer_hz: u32) -> Self {
        Self {
            program,
            pins,
            sequencer_hz,
        }
    }

    /// The pin driver (e.g. to inspect a trace).
    pub fn pins(&self) -> &P {
        &self.pins
    }

    /// Mutable access to the pin driver.
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    /// The program being executed.
    pub fn program(&self) -> &BusProgram {
        &self.program
    }
}

impl<P: PinDriver> CommandFifo for SoftSequencer<P> {
    fn push(&mut self, word: u32) -> Result<()> {
        let (addr, value) = decode_word(word);
        for step in self.program.steps() {
            self.pins.set_control(step.lines);
            match step.data {
                DataSource::Address => self.pins.set_data(addr),
                DataSource::Value => self.pins.set_data(value),
                DataSource::Hold => {}
            }
            let hold = cycles_to_duration(step.cycles, self.sequencer_hz);
            trace!("bus step {:?} {:?} for {:?}", step.lines, step.data, hold);
            self.pins.hold(hold);
        }
        Ok(())
    }
}

/// One observed pin transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    /// Control lines changed
    Control(ControlLines),
    /// Data lines changed
    Data(u8),
    /// Pins held
    Hold(Duration),
}

/// Pin driver that records every transition instead of toggling GPIOs.
#[derive(Debug, Default, Clone)]
pub struct PinTrace {
    events: Vec<LineEvent>,
}

impl PinTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events in order
    pub fn events(&self) -> &[LineEvent] {
        &self.events
    }

    /// Forget all recorded events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl PinDriver for PinTrace {
    fn set_control(&mut self, lines: ControlLines) {
        self.events.push(LineEvent::Control(lines));
    }

    fn set_data(&mut self, value: u8) {
        self.events.push(LineEvent::Data(value));
    }

    fn hold(&mut self, duration: Duration) {
        self.events.push(LineEvent::Hold(duration));
    }
}

/// Register bus backed by a command FIFO and a guard delay.
///
/// Every write packs `(address, value)` into one FIFO word and then blocks
/// for the guard delay, which dominates the real bus time. A FIFO error halts
/// the bus permanently: every later write returns [`DriverError::BusHalted`].
pub struct SequencedBus<F: CommandFifo> {
    fifo: F,
    guard_delay: Duration,
    halted: bool,
    writes: u64,
}

impl<F: CommandFifo> SequencedBus<F> {
    /// Create a bus over `fifo` that blocks for `guard_delay` per write.
    pub fn new(fifo: F, guard_delay: Duration) -> Self {
        Self {
            fifo,
            guard_delay,
            halted: false,
            writes: 0,
        }
    }

    /// Whether a fault has halted the bus.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of writes completed since creation.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    /// Guard delay applied after each write.
    pub fn guard_delay(&self) -> Duration {
        self.guard_delay
    }

    /// The underlying FIFO.
    pub fn fifo(&self) -> &F {
        &self.fifo
    }

    /// Mutable access to the underlying FIFO.
    pub fn fifo_mut(&mut self) -> &mut F {
        &mut self.fifo
    }
}

impl<F: CommandFifo> RegisterBus for SequencedBus<F> {
    fn write(&mut self, addr: u8, value: u8) -> Result<()> {
        if self.halted {
            return Err(DriverError::BusHalted);
        }
        debug!("R{:02} <- 0x{:02X}", addr & 0x0F, value);
        if let Err(e) = self.fifo.push(encode_word(addr, value)) {
            self.halted = true;
            error!("bus fault writing R{addr} = 0x{value:02X}: {e}");
            return Err(DriverError::BusFault(e.to_string()));
        }
        if !self.guard_delay.is_zero() {
            std::thread::sleep(self.guard_delay);
        }
        self.writes += 1;
        Ok(())
    }
}
