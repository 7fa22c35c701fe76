//! Decoding a register bank back into per-channel state.
//!
//! Used for reporting what the chip is currently doing, from a
//! [`RegisterBank`](crate::RegisterBank) mirror or any other 16-byte dump.
//!
//! ```
//! use ym2149_midi::ChannelStates;
//!
//! let mut regs = [0u8; 16];
//! regs[0] = 0x1C; // 284: note 57
//! regs[1] = 0x01;
//! regs[7] = 0x38;
//! regs[8] = 0x1C;
//!
//! let states = ChannelStates::from_registers(&regs);
//! assert_eq!(states.channels[0].note, Some(57));
//! assert!(states.channels[0].envelope_enabled);
//! ```

use std::fmt;

use crate::pitch::{period_to_frequency, DEFAULT_CLOCK_HZ, REFERENCE_HZ, REFERENCE_NOTE};
use crate::registers::{
    Channel, Register, CHANNEL_COUNT, ENVELOPE_ON, LEVEL_MASK, REGISTER_COUNT, USE_ENVELOPE,
};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// State of one tone channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    /// 12-bit tone period
    pub tone_period: u16,
    /// Output frequency (None when the period is 0)
    pub frequency_hz: Option<f64>,
    /// Nearest note number, with note 57 at 440 Hz
    pub note: Option<u8>,
    /// Fixed level (0-15)
    pub level: u8,
    /// Level follows the envelope generator
    pub envelope_enabled: bool,
    /// Tone enabled in the mixer
    pub tone_enabled: bool,
    /// Noise enabled in the mixer
    pub noise_enabled: bool,
}

impl ChannelState {
    /// Name of the nearest note, e.g. "A4" for note 57.
    pub fn note_name(&self) -> Option<String> {
        self.note.map(note_name)
    }

    /// A channel is audible when its tone is enabled, it has a pitch and
    /// either a fixed level or the envelope.
    pub fn is_audible(&self) -> bool {
        self.tone_enabled && self.tone_period > 0 && (self.level > 0 || self.envelope_enabled)
    }
}

/// Envelope generator state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvelopeState {
    /// 16-bit envelope period (R11/R12)
    pub period: u16,
    /// Shape register (R13)
    pub shape: u8,
    /// Envelope cycle frequency (None when the period is 0)
    pub frequency_hz: Option<f64>,
}

impl EnvelopeState {
    /// Whether the shape register holds the value used while notes sound.
    pub fn is_running(&self) -> bool {
        self.shape == ENVELOPE_ON
    }
}

/// State of all three channels and the envelope generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelStates {
    /// Channels A, B, C
    pub channels: [ChannelState; CHANNEL_COUNT],
    /// Envelope generator
    pub envelope: EnvelopeState,
    /// Raw mixer value
    pub mixer: u8,
}

impl ChannelStates {
    /// Decode a register dump assuming the default 2 MHz clock.
    pub fn from_registers(regs: &[u8; REGISTER_COUNT]) -> Self {
        Self::from_registers_with_clock(regs, DEFAULT_CLOCK_HZ)
    }

    /// Decode a register dump for a chip clocked at `clock_hz`.
    pub fn from_registers_with_clock(regs: &[u8; REGISTER_COUNT], clock_hz: u32) -> Self {
        let mixer = regs[Register::Mixer.addr() as usize];
        let channels = Channel::ALL.map(|channel| decode_channel(regs, channel, mixer, clock_hz));

        let env_lo = regs[Register::EnvelopePeriodLo.addr() as usize] as u16;
        let env_hi = regs[Register::EnvelopePeriodHi.addr() as usize] as u16;
        let period = env_lo | (env_hi << 8);
        let envelope = EnvelopeState {
            period,
            shape: regs[Register::EnvelopeShape.addr() as usize] & 0x0F,
            frequency_hz: (period > 0).then(|| clock_hz as f64 / (256.0 * period as f64)),
        };

        ChannelStates {
            channels,
            envelope,
            mixer,
        }
    }

    /// Channels that are currently audible, with their hardware channel.
    pub fn audible_channels(&self) -> impl Iterator<Item = (Channel, &ChannelState)> {
        Channel::ALL
            .into_iter()
            .zip(self.channels.iter())
            .filter(|(_, state)| state.is_audible())
    }
}

impl fmt::Display for ChannelStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (channel, state) in Channel::ALL.into_iter().zip(self.channels.iter()) {
            let level = if state.envelope_enabled {
                "env".to_string()
            } else {
                format!("{:>3}", state.level)
            };
            match state.frequency_hz {
                Some(hz) => writeln!(
                    f,
                    "{channel}: period {:>4}  {:>8.2} Hz  {:<4}  level {level}",
                    state.tone_period,
                    hz,
                    state.note_name().unwrap_or_default()
                )?,
                None => writeln!(f, "{channel}: silent{:>25}level {level}", "")?,
            }
        }
        write!(
            f,
            "mixer 0x{:02X}  envelope period {} shape 0x{:X}",
            self.mixer, self.envelope.period, self.envelope.shape
        )
    }
}

fn decode_channel(
    regs: &[u8; REGISTER_COUNT],
    channel: Channel,
    mixer: u8,
    clock_hz: u32,
) -> ChannelState {
    let (lo_reg, hi_reg) = channel.tone_registers();
    let lo = regs[lo_reg.addr() as usize] as u16;
    let hi = (regs[hi_reg.addr() as usize] & 0x0F) as u16;
    let tone_period = lo | (hi << 8);

    let level_raw = regs[channel.level_register().addr() as usize];

    // Mixer bits are active low
    let index = channel.index();
    let tone_enabled = mixer & (1 << index) == 0;
    let noise_enabled = mixer & (8 << index) == 0;

    let frequency_hz =
        (tone_period > 0).then(|| period_to_frequency(tone_period, clock_hz as f64));

    ChannelState {
        tone_period,
        frequency_hz,
        note: frequency_hz.and_then(frequency_to_note),
        level: level_raw & LEVEL_MASK,
        envelope_enabled: level_raw & USE_ENVELOPE != 0,
        tone_enabled,
        noise_enabled,
    }
}

/// Nearest note number for a frequency, or None outside 0..=127.
pub fn frequency_to_note(frequency_hz: f64) -> Option<u8> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return None;
    }
    let note = 12.0 * (frequency_hz / REFERENCE_HZ).log2() + REFERENCE_NOTE as f64;
    let note = note.round();
    (0.0..=127.0).contains(&note).then_some(note as u8)
}

/// Note name with octave, counting note 57 as "A4".
pub fn note_name(note: u8) -> String {
    format!("{}{}", NOTE_NAMES[note as usize % 12], note / 12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decode_channel_a() {
        let mut regs = [0u8; 16];
        regs[0] = 0x1C;
        regs[1] = 0x01;
        regs[7] = 0x3E;
        regs[8] = 0x0F;

        let states = ChannelStates::from_registers(&regs);
        let a = &states.channels[0];
        assert_eq!(a.tone_period, 284);
        assert_eq!(a.level, 15);
        assert!(a.tone_enabled);
        assert!(!a.noise_enabled);
        assert!(!a.envelope_enabled);
        assert_relative_eq!(a.frequency_hz.unwrap(), 440.14, epsilon = 0.01);
        assert_eq!(a.note, Some(57));
        assert_eq!(a.note_name().as_deref(), Some("A4"));

        // B and C have no tone enable
        assert!(!states.channels[1].tone_enabled);
        assert_eq!(states.audible_channels().count(), 1);
    }

    #[test]
    fn test_envelope_state() {
        let mut regs = [0u8; 16];
        regs[8] = 0x10;
        regs[11] = 0x38;
        regs[12] = 0x01;
        regs[13] = 0x0D;

        let states = ChannelStates::from_registers(&regs);
        assert!(states.channels[0].envelope_enabled);
        assert_eq!(states.channels[0].level, 0);
        assert_eq!(states.envelope.period, 312);
        assert!(states.envelope.is_running());
        assert_relative_eq!(states.envelope.frequency_hz.unwrap(), 25.04, epsilon = 0.01);
    }

    #[test]
    fn test_silent_channel() {
        let states = ChannelStates::from_registers(&[0u8; 16]);
        assert_eq!(states.channels[2].frequency_hz, None);
        assert_eq!(states.channels[2].note, None);
        assert_eq!(states.envelope.frequency_hz, None);
        assert!(!states.envelope.is_running());
        assert_eq!(states.audible_channels().count(), 0);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(57), "A4");
        assert_eq!(note_name(60), "C5");
        assert_eq!(note_name(0), "C0");
        assert_eq!(frequency_to_note(440.0), Some(57));
        assert_eq!(frequency_to_note(0.0), None);
    }

    #[test]
    fn test_display_lists_every_channel() {
        let mut regs = [0u8; 16];
        regs[2] = 0xEE;
        regs[9] = 0x1F;
        let text = ChannelStates::from_registers(&regs).to_string();
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("period  238"));
        assert!(text.contains("env"));
    }
}
