//! Fixed-tune playback and mixer test setups.
//!
//! These bypass the voice allocator: a tune is a list of (frequency, length)
//! steps and every step is sounded on all three channels at once, stacked in
//! octaves, with fixed channel levels and no envelope.

use std::time::Duration;

use log::{debug, info};

use crate::bus::RegisterBus;
use crate::pitch::{tone_value, ToneValue};
use crate::registers::{Channel, Register, LEVEL_MASK};
use crate::setup::zero_registers;
use crate::Result;

/// Mixer for fixed playback: tones on, noise off, I/O ports set as outputs.
pub const MIXER_FIXED_TONES: u8 = 0xF8;

/// Mixer for the noise test: tone and noise enabled on all channels.
pub const MIXER_NOISE_TEST: u8 = 0xC0;

/// Default length of one beat.
pub const DEFAULT_BEAT: Duration = Duration::from_millis(250);

/// One step of a tune.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneStep {
    /// Pitch in Hz; 0 is a rest
    pub frequency_hz: f64,
    /// Length in beats
    pub beats: f64,
}

impl TuneStep {
    /// Create a step
    pub fn new(frequency_hz: f64, beats: f64) -> Self {
        Self {
            frequency_hz,
            beats,
        }
    }

    /// A rest of `beats` beats
    pub fn rest(beats: f64) -> Self {
        Self::new(0.0, beats)
    }
}

/// A sequence of steps played in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tune {
    steps: Vec<TuneStep>,
}

impl Tune {
    /// Build a tune from `(frequency_hz, beats)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            steps: pairs.iter().map(|&(f, b)| TuneStep::new(f, b)).collect(),
        }
    }

    /// Steps in playing order
    pub fn steps(&self) -> &[TuneStep] {
        &self.steps
    }

    /// Total length in beats
    pub fn total_beats(&self) -> f64 {
        self.steps.iter().map(|s| s.beats).sum()
    }
}

/// Plays tunes directly onto the tone registers.
#[derive(Debug, Clone)]
pub struct FixedPlayer {
    clock_hz: u32,
    beat: Duration,
    frequency_multiplier: f64,
}

impl FixedPlayer {
    /// Create a player for a chip clocked at `clock_hz`.
    pub fn new(clock_hz: u32) -> Self {
        Self {
            clock_hz,
            beat: DEFAULT_BEAT,
            frequency_multiplier: 1.0,
        }
    }

    /// Set the beat length
    pub fn with_beat(mut self, beat: Duration) -> Self {
        self.beat = beat;
        self
    }

    /// Scale every step frequency before conversion (2.0 sounds an octave up).
    pub fn with_frequency_multiplier(mut self, multiplier: f64) -> Self {
        self.frequency_multiplier = multiplier;
        self
    }

    /// Clear the chip and set fixed full levels with tone-only mixing.
    pub fn setup<B: RegisterBus + ?Sized>(&self, bus: &mut B) -> Result<()> {
        fixed_level_setup(bus, MIXER_FIXED_TONES)
    }

    /// Tone period for a step on channel A.
    pub fn step_tone(&self, step: &TuneStep) -> ToneValue {
        if step.frequency_hz == 0.0 {
            return ToneValue::SILENT;
        }
        tone_value(step.frequency_hz * self.frequency_multiplier, self.clock_hz)
    }

    /// Sound one step and return how long it should be held.
    ///
    /// Channel A gets the step's pitch, B one octave up and C two octaves up.
    pub fn play_step<B: RegisterBus + ?Sized>(
        &self,
        bus: &mut B,
        step: &TuneStep,
    ) -> Result<Duration> {
        let tone = self.step_tone(step);
        debug!("step {:.2} Hz -> period {}", step.frequency_hz, tone.period());
        for (octave, channel) in Channel::ALL.into_iter().enumerate() {
            bus.write_tone(channel, tone.octave_up(octave as u32))?;
        }
        Ok(self.beat.mul_f64(step.beats.max(0.0)))
    }

    /// Play a whole tune, calling `wait` with each step's length.
    pub fn play<B, W>(&self, bus: &mut B, tune: &Tune, mut wait: W) -> Result<()>
    where
        B: RegisterBus + ?Sized,
        W: FnMut(Duration),
    {
        info!(
            "playing {} steps ({} beats)",
            tune.steps().len(),
            tune.total_beats()
        );
        for step in tune.steps() {
            let hold = self.play_step(bus, step)?;
            wait(hold);
        }
        Ok(())
    }
}

/// Clear the chip and enable noise on all channels at fixed full level.
pub fn noise_test_setup<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<()> {
    fixed_level_setup(bus, MIXER_NOISE_TEST)
}

fn fixed_level_setup<B: RegisterBus + ?Sized>(bus: &mut B, mixer: u8) -> Result<()> {
    zero_registers(bus)?;
    bus.write_register(Register::Mixer, mixer)?;
    for channel in Channel::ALL {
        bus.write_level(channel, LEVEL_MASK)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingBus;
    use crate::pitch::DEFAULT_CLOCK_HZ;

    #[test]
    fn test_setup_writes_fixed_levels() {
        let mut bus = RecordingBus::new();
        FixedPlayer::new(DEFAULT_CLOCK_HZ).setup(&mut bus).unwrap();
        assert_eq!(bus.writes().len(), 20);
        assert_eq!(
            &bus.writes()[16..],
            &[(7, 0xF8), (8, 0x0F), (9, 0x0F), (10, 0x0F)]
        );
    }

    #[test]
    fn test_noise_setup() {
        let mut bus = RecordingBus::new();
        noise_test_setup(&mut bus).unwrap();
        assert_eq!(bus.registers()[7], 0xC0);
        assert_eq!(bus.registers()[8], 0x0F);
    }

    #[test]
    fn test_step_is_octave_stacked() {
        let player = FixedPlayer::new(DEFAULT_CLOCK_HZ).with_frequency_multiplier(2.0);
        let mut bus = RecordingBus::new();
        // 2 MHz / (16 * 261.62) = 477.8
        let hold = player
            .play_step(&mut bus, &TuneStep::new(130.81, 4.0))
            .unwrap();

        assert_eq!(hold, Duration::from_secs(1));
        assert_eq!(
            bus.writes(),
            &[(0, 0xDD), (1, 0x01), (2, 0xEE), (3, 0x00), (4, 0x77), (5, 0x00)]
        );
    }

    #[test]
    fn test_rest_silences_all_channels() {
        let player = FixedPlayer::new(DEFAULT_CLOCK_HZ);
        let mut bus = RecordingBus::new();
        player.play_step(&mut bus, &TuneStep::rest(0.66)).unwrap();
        assert!(bus.writes().iter().all(|&(_, v)| v == 0));
        assert_eq!(bus.writes().len(), 6);
    }

    #[test]
    fn test_play_waits_for_every_step() {
        let tune = Tune::from_pairs(&[(146.83, 0.5), (0.0, 1.0), (196.0, 2.0)]);
        let player = FixedPlayer::new(DEFAULT_CLOCK_HZ).with_beat(Duration::from_millis(100));
        let mut bus = RecordingBus::new();
        let mut waits = Vec::new();
        player.play(&mut bus, &tune, |d| waits.push(d)).unwrap();

        assert_eq!(
            waits,
            vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(200)
            ]
        );
        assert_eq!(bus.writes().len(), 18);
        assert!((tune.total_beats() - 3.5).abs() < 1e-9);
    }
}
