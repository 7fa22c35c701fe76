//! Voice allocation across the chip's three tone channels.
//!
//! Every channel keeps the set of keys currently held on it, but the chip can
//! only sound one pitch per channel. On note-on the new note always takes the
//! channel. On note-off the channel falls back to another held note:
//!
//! - if the released note was the highest held, the new highest sounds;
//! - otherwise the lowest remaining note sounds.
//!
//! A held chord therefore keeps its top voice while inner notes come and go,
//! and a released top note drops to the next one down.
//!
//! All channel levels follow the shared hardware envelope. The envelope is
//! switched on when the first key goes down anywhere and off as soon as the
//! last key anywhere is released. A released channel keeps its pitch for the
//! release delay (so the envelope can ring out without a click) and is then
//! silenced by a timer that a new note on that channel cancels.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::debug;

use crate::bus::RegisterBus;
use crate::config::DriverConfig;
use crate::pitch::ToneValue;
use crate::registers::{level_for_velocity, Channel, Register, ENVELOPE_OFF, USE_ENVELOPE};
use crate::scheduler::EnvelopeScheduler;
use crate::setup;
use crate::Result;

/// Deferred work attached to a channel's release timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAction {
    /// Clear both tone period registers of the channel
    SilencePitch,
}

#[derive(Debug, Default, Clone)]
struct ChannelVoice {
    /// Held keys: note number -> velocity
    active_notes: BTreeMap<u8, u8>,
    /// Note whose pitch is currently in the tone registers
    sounding: Option<u8>,
}

/// Maps note events onto the three hardware channels.
pub struct VoiceAllocator<B: RegisterBus> {
    bus: B,
    config: DriverConfig,
    channels: [ChannelVoice; 3],
    envelope_enabled: bool,
    scheduler: EnvelopeScheduler<ReleaseAction>,
}

impl<B: RegisterBus> VoiceAllocator<B> {
    /// Create an allocator writing through `bus`.
    ///
    /// Nothing is written until [`startup`](Self::startup) is called.
    pub fn new(bus: B, config: &DriverConfig) -> Self {
        Self {
            bus,
            config: config.clone(),
            channels: Default::default(),
            envelope_enabled: false,
            scheduler: EnvelopeScheduler::new(),
        }
    }

    /// Initialise the chip and forget all voice state.
    pub fn startup(&mut self) -> Result<()> {
        self.channels = Default::default();
        self.envelope_enabled = false;
        self.scheduler.cancel_all();
        setup::init_chip(&mut self.bus, &self.config)
    }

    /// A key went down on `channel`.
    pub fn note_on(&mut self, channel: Channel, note: u8, velocity: u8) -> Result<()> {
        let idx = channel.index();
        if self.scheduler.cancel(channel) {
            debug!("channel {channel}: pending release superseded by note {note}");
        }

        if self.total_active() == 0 {
            self.set_envelope(true)?;
        }

        self.channels[idx].active_notes.insert(note, velocity);
        debug!("channel {channel}: note on {note} vel {velocity}");
        self.sound(channel, note, velocity)
    }

    /// A key was released on `channel`.
    ///
    /// Releasing a note that is not held is ignored.
    pub fn note_off(&mut self, channel: Channel, note: u8, now: Instant) -> Result<()> {
        let voice = &mut self.channels[channel.index()];
        if voice.active_notes.remove(&note).is_none() {
            debug!("channel {channel}: note off {note} not held, ignored");
            return Ok(());
        }

        let was_highest = voice
            .active_notes
            .last_key_value()
            .map_or(true, |(&highest, _)| highest < note);
        let fallback = if was_highest {
            voice.active_notes.last_key_value()
        } else {
            voice.active_notes.first_key_value()
        }
        .map(|(&n, &v)| (n, v));

        match fallback {
            Some((next, velocity)) => {
                debug!("channel {channel}: note off {note}, falling back to {next}");
                self.sound(channel, next, velocity)?;
            }
            None => {
                debug!("channel {channel}: note off {note}, channel released");
                self.channels[channel.index()].sounding = None;
                self.bus.write_level(channel, USE_ENVELOPE)?;
                self.scheduler.arm(
                    channel,
                    self.config.release_delay(),
                    now,
                    ReleaseAction::SilencePitch,
                );
            }
        }

        if self.total_active() == 0 {
            self.set_envelope(false)?;
        }
        Ok(())
    }

    /// Run every release timer that is due at `now`. Returns how many fired.
    pub fn fire_due(&mut self, now: Instant) -> Result<usize> {
        let fired = self.scheduler.fire_due(now);
        for timer in &fired {
            match timer.action {
                ReleaseAction::SilencePitch => {
                    let channel = timer.ticket.channel;
                    debug!("channel {channel}: release expired, pitch cleared");
                    self.bus.write_tone(channel, ToneValue::SILENT)?;
                }
            }
        }
        Ok(fired.len())
    }

    /// Earliest pending release deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Time until the earliest pending release, if any.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.scheduler.time_until_next(now)
    }

    /// Whether `channel` is waiting for its release timer.
    pub fn release_pending(&self, channel: Channel) -> bool {
        self.scheduler.is_pending(channel)
    }

    /// Keys held on `channel` as `(note, velocity)`, lowest first.
    pub fn active_notes(&self, channel: Channel) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.channels[channel.index()]
            .active_notes
            .iter()
            .map(|(&n, &v)| (n, v))
    }

    /// Note currently driving `channel`'s tone registers.
    pub fn sounding_note(&self, channel: Channel) -> Option<u8> {
        self.channels[channel.index()].sounding
    }

    /// Number of keys held across all channels.
    pub fn total_active(&self) -> usize {
        self.channels.iter().map(|c| c.active_notes.len()).sum()
    }

    /// Whether the shared envelope generator is switched on.
    pub fn is_envelope_enabled(&self) -> bool {
        self.envelope_enabled
    }

    /// The configuration in use
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// The bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Give the bus back.
    pub fn into_bus(self) -> B {
        self.bus
    }

    fn sound(&mut self, channel: Channel, note: u8, velocity: u8) -> Result<()> {
        let tone = ToneValue::from_note(note, self.config.clock_hz);
        self.bus.write_tone(channel, tone)?;
        self.bus.write_level(channel, level_for_velocity(velocity))?;
        self.channels[channel.index()].sounding = Some(note);
        Ok(())
    }

    fn set_envelope(&mut self, enabled: bool) -> Result<()> {
        let shape = if enabled {
            self.config.envelope_shape
        } else {
            ENVELOPE_OFF
        };
        debug!("envelope {}", if enabled { "on" } else { "off" });
        self.bus.write_register(Register::EnvelopeShape, shape)?;
        self.envelope_enabled = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingBus;

    const R13: u8 = 13;

    fn allocator() -> VoiceAllocator<RecordingBus> {
        let mut alloc = VoiceAllocator::new(RecordingBus::new(), &DriverConfig::default());
        alloc.startup().unwrap();
        alloc.bus_mut().clear_log();
        alloc
    }

    fn tone_writes(channel: Channel, note: u8) -> [(u8, u8); 2] {
        let tone = ToneValue::from_note(note, DriverConfig::default().clock_hz);
        let (lo, hi) = channel.tone_registers();
        [(lo.addr(), tone.lo()), (hi.addr(), tone.hi())]
    }

    #[test]
    fn test_first_note_enables_envelope_before_pitch() {
        let mut alloc = allocator();
        alloc.note_on(Channel::A, 60, 100).unwrap();

        let [lo, hi] = tone_writes(Channel::A, 60);
        assert_eq!(alloc.bus().writes(), &[(R13, 0x0D), lo, hi, (8, 0x1C)]);
        assert!(alloc.is_envelope_enabled());
        assert_eq!(alloc.sounding_note(Channel::A), Some(60));
    }

    #[test]
    fn test_retrigger_overwrites_velocity() {
        let mut alloc = allocator();
        alloc.note_on(Channel::B, 64, 40).unwrap();
        alloc.note_on(Channel::B, 64, 120).unwrap();

        let held: Vec<_> = alloc.active_notes(Channel::B).collect();
        assert_eq!(held, vec![(64, 120)]);
        assert_eq!(alloc.bus().writes_to(Register::EnvelopeShape), vec![0x0D]);
    }

    #[test]
    fn test_release_of_highest_falls_to_next_highest() {
        let mut alloc = allocator();
        let now = Instant::now();
        for (note, vel) in [(60, 8), (64, 16), (67, 24)] {
            alloc.note_on(Channel::A, note, vel).unwrap();
        }
        alloc.bus_mut().clear_log();

        alloc.note_off(Channel::A, 67, now).unwrap();
        let [lo, hi] = tone_writes(Channel::A, 64);
        assert_eq!(alloc.bus().writes(), &[lo, hi, (8, 0x12)]);
        assert_eq!(alloc.sounding_note(Channel::A), Some(64));
    }

    #[test]
    fn test_release_of_inner_note_falls_to_lowest() {
        let mut alloc = allocator();
        let now = Instant::now();
        for note in [60, 64, 67] {
            alloc.note_on(Channel::A, note, 100).unwrap();
        }
        alloc.note_off(Channel::A, 60, now).unwrap();
        assert_eq!(alloc.sounding_note(Channel::A), Some(64));

        alloc.note_on(Channel::A, 72, 100).unwrap();
        // 67 is not the highest (72 is), so the lowest remaining (64) sounds
        alloc.note_off(Channel::A, 67, now).unwrap();
        assert_eq!(alloc.sounding_note(Channel::A), Some(64));
    }

    #[test]
    fn test_unknown_note_off_writes_nothing() {
        let mut alloc = allocator();
        let now = Instant::now();
        alloc.note_off(Channel::C, 42, now).unwrap();
        assert!(alloc.bus().writes().is_empty());
        assert!(!alloc.release_pending(Channel::C));

        alloc.note_on(Channel::C, 50, 64).unwrap();
        alloc.bus_mut().clear_log();
        alloc.note_off(Channel::C, 51, now).unwrap();
        assert!(alloc.bus().writes().is_empty());
    }

    #[test]
    fn test_last_release_disables_envelope_immediately() {
        let mut alloc = allocator();
        let now = Instant::now();
        alloc.note_on(Channel::A, 60, 100).unwrap();
        alloc.bus_mut().clear_log();

        alloc.note_off(Channel::A, 60, now).unwrap();
        assert_eq!(alloc.bus().writes(), &[(8, 0x10), (R13, 0x00)]);
        assert!(alloc.release_pending(Channel::A));
        assert!(!alloc.is_envelope_enabled());

        alloc.bus_mut().clear_log();
        assert_eq!(alloc.fire_due(now + Duration::from_millis(40)).unwrap(), 1);
        assert_eq!(alloc.bus().writes(), &[(0, 0), (1, 0)]);
    }

    #[test]
    fn test_envelope_stays_on_while_another_channel_holds() {
        let mut alloc = allocator();
        let now = Instant::now();
        alloc.note_on(Channel::A, 60, 100).unwrap();
        alloc.note_on(Channel::B, 64, 100).unwrap();
        alloc.note_off(Channel::A, 60, now).unwrap();
        assert!(alloc.is_envelope_enabled());
        assert_eq!(alloc.bus().writes_to(Register::EnvelopeShape), vec![0x0D]);

        alloc.note_off(Channel::B, 64, now).unwrap();
        assert_eq!(
            alloc.bus().writes_to(Register::EnvelopeShape),
            vec![0x0D, 0x00]
        );
    }

    #[test]
    fn test_note_on_cancels_pending_release() {
        let mut alloc = allocator();
        let now = Instant::now();
        alloc.note_on(Channel::B, 60, 100).unwrap();
        alloc.note_off(Channel::B, 60, now).unwrap();
        assert!(alloc.release_pending(Channel::B));

        alloc.note_on(Channel::B, 62, 100).unwrap();
        assert!(!alloc.release_pending(Channel::B));
        alloc.bus_mut().clear_log();

        assert_eq!(alloc.fire_due(now + Duration::from_secs(1)).unwrap(), 0);
        assert!(alloc.bus().writes().is_empty());
        assert_eq!(alloc.sounding_note(Channel::B), Some(62));
    }

    #[test]
    fn test_release_timer_waits_for_delay() {
        let mut alloc = allocator();
        let now = Instant::now();
        alloc.note_on(Channel::C, 70, 100).unwrap();
        alloc.note_off(Channel::C, 70, now).unwrap();

        assert_eq!(alloc.fire_due(now + Duration::from_millis(39)).unwrap(), 0);
        assert_eq!(alloc.time_until_next(now), Some(Duration::from_millis(40)));
        assert_eq!(alloc.fire_due(now + Duration::from_millis(40)).unwrap(), 1);
        assert_eq!(alloc.next_deadline(), None);
    }

    #[test]
    fn test_startup_resets_state() {
        let mut alloc = allocator();
        alloc.note_on(Channel::A, 60, 100).unwrap();
        alloc.startup().unwrap();
        assert_eq!(alloc.total_active(), 0);
        assert!(!alloc.is_envelope_enabled());
        assert_eq!(alloc.bus().registers()[13], 0);
    }
}
