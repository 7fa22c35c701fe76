//! Driver configuration.
//!
//! Everything here is fixed for the lifetime of the chip: the reference clock,
//! the envelope and release timings, and the bus guard delay. Values can be
//! loaded from JSON; missing fields fall back to the defaults of the
//! reference board (2 MHz clock, 40 ms envelope, 5 ms guard).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::program::DEFAULT_SEQUENCER_HZ;
use crate::pitch::{envelope_period, DEFAULT_CLOCK_HZ};
use crate::registers::{ENVELOPE_ON, MIXER_TONES_ONLY};
use crate::{DriverError, Result};

/// Driver-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Chip master clock in Hz
    pub clock_hz: u32,
    /// Delay between the last key release on a channel and its pitch being cleared
    pub release_ms: u64,
    /// Envelope generator cycle length used to derive R11/R12
    pub envelope_period_ms: u32,
    /// R13 value written when the envelope is enabled
    pub envelope_shape: u8,
    /// Fixed R7 mixer value
    pub mixer: u8,
    /// Worst-case bus time each register write blocks for
    pub guard_delay_us: u64,
    /// Bus sequencer clock in Hz
    pub sequencer_hz: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            release_ms: 40,
            envelope_period_ms: 40,
            envelope_shape: ENVELOPE_ON,
            mixer: MIXER_TONES_ONLY,
            guard_delay_us: 5_000,
            sequencer_hz: DEFAULT_SEQUENCER_HZ,
        }
    }
}

impl DriverConfig {
    /// Parse a configuration from JSON text and validate it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: DriverConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check that the values describe a usable chip setup.
    pub fn validate(&self) -> Result<()> {
        if self.clock_hz == 0 {
            return Err(DriverError::ConfigError("clock_hz must be non-zero".into()));
        }
        if self.sequencer_hz == 0 {
            return Err(DriverError::ConfigError(
                "sequencer_hz must be non-zero".into(),
            ));
        }
        if self.envelope_period_ms == 0 {
            return Err(DriverError::ConfigError(
                "envelope_period_ms must be non-zero".into(),
            ));
        }
        if self.envelope_shape > 0x0F {
            return Err(DriverError::ConfigError(format!(
                "envelope_shape 0x{:02X} is not a 4-bit shape",
                self.envelope_shape
            )));
        }
        if self.mixer & 0x07 != 0 {
            return Err(DriverError::ConfigError(format!(
                "mixer 0x{:02X} disables a tone channel",
                self.mixer
            )));
        }
        Ok(())
    }

    /// Set the master clock
    pub fn clock_hz(mut self, clock_hz: u32) -> Self {
        self.clock_hz = clock_hz;
        self
    }

    /// Set the release delay
    pub fn release_ms(mut self, release_ms: u64) -> Self {
        self.release_ms = release_ms;
        self
    }

    /// Set the bus guard delay
    pub fn guard_delay_us(mut self, guard_delay_us: u64) -> Self {
        self.guard_delay_us = guard_delay_us;
        self
    }

    /// Release delay as a duration.
    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_ms)
    }

    /// Guard delay as a duration.
    pub fn guard_delay(&self) -> Duration {
        Duration::from_micros(self.guard_delay_us)
    }

    /// R11/R12 value for the configured envelope period.
    pub fn envelope_period_register(&self) -> u16 {
        envelope_period(self.clock_hz, self.envelope_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DriverConfig::default();
        config.validate().unwrap();
        assert_eq!(config.envelope_period_register(), 312);
        assert_eq!(config.release_delay(), Duration::from_millis(40));
        assert_eq!(config.guard_delay(), Duration::from_millis(5));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = DriverConfig::from_json_str(r#"{ "clock_hz": 1789773, "release_ms": 10 }"#)
            .unwrap();
        assert_eq!(config.clock_hz, 1_789_773);
        assert_eq!(config.release_ms, 10);
        assert_eq!(config.mixer, MIXER_TONES_ONLY);
        assert_eq!(config.envelope_shape, ENVELOPE_ON);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            DriverConfig::from_json_str(r#"{ "clock_hz": 0 }"#),
            Err(DriverError::ConfigError(_))
        ));
        assert!(matches!(
            DriverConfig::from_json_str(r#"{ "envelope_shape": 16 }"#),
            Err(DriverError::ConfigError(_))
        ));
        assert!(matches!(
            DriverConfig::from_json_str(r#"{ "mixer": 63 }"#),
            Err(DriverError::ConfigError(_))
        ));
        assert!(matches!(
            DriverConfig::from_json_str("{ not json"),
            Err(DriverError::Json(_))
        ));
    }

    #[test]
    fn test_builder_setters() {
        let config = DriverConfig::default()
            .clock_hz(1_000_000)
            .release_ms(0)
            .guard_delay_us(0);
        assert_eq!(config.clock_hz, 1_000_000);
        assert_eq!(config.release_delay(), Duration::ZERO);
        assert_eq!(config.guard_delay(), Duration::ZERO);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = DriverConfig::load("/nonexistent/ym2149-midi.json").unwrap_err();
        assert!(matches!(err, DriverError::Io(_)));
    }
}
