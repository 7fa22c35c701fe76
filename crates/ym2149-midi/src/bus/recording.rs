//! Bus implementations that remember what was written.

use std::sync::Arc;

use parking_lot::Mutex;

use super::RegisterBus;
use crate::registers::{Register, RegisterBank, REGISTER_COUNT};
use crate::{DriverError, Result};

/// In-memory bus that logs every write in order.
///
/// Used by tests and dry runs. It can be told to fail after a number of
/// writes to exercise fault handling; once failed it stays halted like a
/// real bus.
#[derive(Debug, Default, Clone)]
pub struct RecordingBus {
    writes: Vec<(u8, u8)>,
    bank: RegisterBank,
    fail_after: Option<usize>,
    halted: bool,
}

impl RecordingBus {
    /// Create an empty recording bus
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that accepts `count` writes and faults on the next one.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    /// All writes as `(address, value)` in emission order.
    pub fn writes(&self) -> &[(u8, u8)] {
        &self.writes
    }

    /// Values written to one register, in order.
    pub fn writes_to(&self, reg: Register) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(addr, _)| *addr == reg.addr())
            .map(|(_, value)| *value)
            .collect()
    }

    /// Current register contents.
    pub fn registers(&self) -> [u8; REGISTER_COUNT] {
        self.bank.registers
    }

    /// Current register contents as a bank.
    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    /// Forget the write log (register contents are kept).
    pub fn clear_log(&mut self) {
        self.writes.clear();
    }

    /// Whether the bus has faulted.
    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

impl RegisterBus for RecordingBus {
    fn write(&mut self, addr: u8, value: u8) -> Result<()> {
        if self.halted {
            return Err(DriverError::BusHalted);
        }
        if self.fail_after == Some(self.writes.len()) {
            self.halted = true;
            return Err(DriverError::BusFault(format!(
                "injected fault at write {}",
                self.writes.len()
            )));
        }
        let addr = addr & 0x0F;
        self.writes.push((addr, value));
        self.bank.write(addr, value);
        Ok(())
    }
}

/// Decorator mirroring successful writes into a shared register bank.
///
/// The bank can be read from other threads while the engine owns the bus.
pub struct ShadowBus<B: RegisterBus> {
    inner: B,
    shadow: Arc<Mutex<RegisterBank>>,
}

impl<B: RegisterBus> ShadowBus<B> {
    /// Wrap `inner` with a fresh, zeroed shadow bank.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            shadow: Arc::new(Mutex::new(RegisterBank::new())),
        }
    }

    /// Handle to the shared shadow bank.
    pub fn shadow(&self) -> Arc<Mutex<RegisterBank>> {
        Arc::clone(&self.shadow)
    }

    /// Copy of the current shadow registers.
    pub fn snapshot(&self) -> RegisterBank {
        *self.shadow.lock()
    }

    /// The wrapped bus
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Unwrap the decorated bus.
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: RegisterBus> RegisterBus for ShadowBus<B> {
    fn write(&mut self, addr: u8, value: u8) -> Result<()> {
        self.inner.write(addr, value)?;
        self.shadow.lock().write(addr, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::ToneValue;
    use crate::registers::Channel;

    #[test]
    fn test_recording_order_and_bank() {
        let mut bus = RecordingBus::new();
        bus.write_register(Register::Mixer, 0x38).unwrap();
        bus.write_tone(Channel::C, ToneValue::from_raw(0x3FF)).unwrap();
        bus.write_level(Channel::C, 0x1F).unwrap();

        assert_eq!(bus.writes(), &[(7, 0x38), (4, 0xFF), (5, 0x03), (10, 0x1F)]);
        assert_eq!(bus.registers()[5], 0x03);
        assert_eq!(bus.writes_to(Register::LevelC), vec![0x1F]);
    }

    #[test]
    fn test_recording_masks_address() {
        let mut bus = RecordingBus::new();
        bus.write(0x18, 0xAA).unwrap();
        assert_eq!(bus.writes(), &[(8, 0xAA)]);
    }

    #[test]
    fn test_injected_fault_is_sticky() {
        let mut bus = RecordingBus::failing_after(2);
        bus.write(0, 0).unwrap();
        bus.write(1, 0).unwrap();
        assert!(matches!(bus.write(2, 0), Err(DriverError::BusFault(_))));
        assert!(matches!(bus.write(3, 0), Err(DriverError::BusHalted)));
        assert_eq!(bus.writes().len(), 2);
    }

    #[test]
    fn test_shadow_bus_mirrors_successful_writes() {
        let mut bus = ShadowBus::new(RecordingBus::failing_after(1));
        let shadow = bus.shadow();
        bus.write(8, 0x1C).unwrap();
        assert!(bus.write(9, 0x1C).is_err());

        let bank = *shadow.lock();
        assert_eq!(bank.read(8), 0x1C);
        assert_eq!(bank.read(9), 0x00);
        assert_eq!(bus.snapshot(), bank);
    }
}
