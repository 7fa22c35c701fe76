//! Chip startup sequence.

use log::info;

use crate::bus::RegisterBus;
use crate::config::DriverConfig;
use crate::registers::{Channel, Register, LEVEL_MASK, REGISTER_COUNT, USE_ENVELOPE};
use crate::Result;

/// Write 0 to all 16 registers.
pub fn zero_registers<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<()> {
    for addr in 0..REGISTER_COUNT as u8 {
        bus.write(addr, 0)?;
    }
    Ok(())
}

/// Bring the chip into the state the voice allocator expects.
///
/// All registers are cleared first. Then the fixed mixer value goes to R7,
/// every channel level is set to full scale following the envelope, and the
/// envelope period is written to R11/R12. R13 stays 0 so the envelope is off
/// until the first note.
pub fn init_chip<B: RegisterBus + ?Sized>(bus: &mut B, config: &DriverConfig) -> Result<()> {
    zero_registers(bus)?;
    bus.write_register(Register::Mixer, config.mixer)?;
    for channel in Channel::ALL {
        bus.write_level(channel, LEVEL_MASK | USE_ENVELOPE)?;
    }
    let period = config.envelope_period_register();
    bus.write_register(Register::EnvelopePeriodLo, (period & 0xFF) as u8)?;
    bus.write_register(Register::EnvelopePeriodHi, (period >> 8) as u8)?;
    info!(
        "chip initialised: clock {} Hz, mixer 0x{:02X}, envelope period {}",
        config.clock_hz, config.mixer, period
    );
    Ok(())
}
