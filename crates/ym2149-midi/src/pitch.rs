//! Pitch conversion for the YM2149 tone generators.
//!
//! A tone channel toggles its square wave every `period` ticks of the master
//! clock divided by 16, so `period = clock / (16 * frequency)`.

/// Default YM2149 master clock frequency (in Hz).
pub const DEFAULT_CLOCK_HZ: u32 = 2_000_000;

/// Note number the tuning is referenced to.
pub const REFERENCE_NOTE: u8 = 57;

/// Frequency of [`REFERENCE_NOTE`] in Hz.
pub const REFERENCE_HZ: f64 = 440.0;

/// Largest tone period the 12-bit register pair can hold.
pub const MAX_TONE_PERIOD: u16 = 0x0FFF;

const PERIOD_DENOMINATOR: f64 = 16.0;
const ENVELOPE_DENOMINATOR: f64 = 256.0;

/// A 12-bit tone period as written to a channel's register pair.
///
/// Zero means "no tone period" (silence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ToneValue(u16);

impl ToneValue {
    /// Silent channel.
    pub const SILENT: ToneValue = ToneValue(0);

    /// Wrap a raw period, masking it to 12 bits.
    pub fn from_raw(period: u16) -> Self {
        ToneValue(period & MAX_TONE_PERIOD)
    }

    /// Tone period for a frequency and master clock.
    pub fn from_frequency(frequency_hz: f64, clock_hz: u32) -> Self {
        tone_value(frequency_hz, clock_hz)
    }

    /// Tone period for an equal-tempered note number.
    pub fn from_note(note: u8, clock_hz: u32) -> Self {
        tone_value(note_to_frequency(note), clock_hz)
    }

    /// Raw 12-bit period.
    pub fn period(self) -> u16 {
        self.0
    }

    /// Value for the low (fine) register.
    pub fn lo(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Value for the high (coarse) register, bits 0-3 only.
    pub fn hi(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// The same pitch shifted up by `octaves` (period halved per octave).
    pub fn octave_up(self, octaves: u32) -> Self {
        ToneValue(self.0.checked_shr(octaves).unwrap_or(0))
    }
}

/// Convert a frequency into a 12-bit tone period.
///
/// Returns 0 for a zero frequency. Any other frequency yields
/// `floor(clock / (16 * frequency))` clamped into `1..=4095`. Negative or
/// non-finite frequencies are treated as silence.
pub fn tone_value(frequency_hz: f64, clock_hz: u32) -> ToneValue {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return ToneValue::SILENT;
    }
    let period = (clock_hz as f64 / (PERIOD_DENOMINATOR * frequency_hz)).floor();
    ToneValue(period.clamp(1.0, MAX_TONE_PERIOD as f64) as u16)
}

/// Equal-tempered frequency of a note number, with note 57 at 440 Hz.
#[inline]
pub fn note_to_frequency(note: u8) -> f64 {
    REFERENCE_HZ * 2f64.powf((note as f64 - REFERENCE_NOTE as f64) / 12.0)
}

/// Frequency produced by a tone period at the given clock.
#[inline]
pub fn period_to_frequency(period: u16, clock_hz: f64) -> f64 {
    if period == 0 {
        0.0
    } else {
        clock_hz / (PERIOD_DENOMINATOR * period as f64)
    }
}

/// Envelope generator period (R11/R12) for an envelope cycle of `period_ms`.
///
/// The envelope steps at `clock / 256`, so the register value is
/// `clock / (256 * (1000 / period_ms))`.
pub fn envelope_period(clock_hz: u32, period_ms: u32) -> u16 {
    if period_ms == 0 {
        return 0;
    }
    let envelope_freq = 1000.0 / period_ms as f64;
    let value = (clock_hz as f64 / (ENVELOPE_DENOMINATOR * envelope_freq)).floor();
    value.clamp(0.0, u16::MAX as f64) as u16
}
