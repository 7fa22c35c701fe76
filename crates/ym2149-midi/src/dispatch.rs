//! Entry point for decoded note events.
//!
//! Events arrive with 1-based source channels (as on the wire). The
//! dispatcher maps them onto hardware channels and forwards them to the
//! [`VoiceAllocator`]; nothing here ever rejects an event.

use std::time::Instant;

use log::warn;

use crate::bus::RegisterBus;
use crate::config::DriverConfig;
use crate::registers::Channel;
use crate::voice::VoiceAllocator;
use crate::Result;

/// A decoded note event. `channel` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    /// Key pressed
    NoteOn {
        /// Source channel, 1-based
        channel: u8,
        /// Note number
        note: u8,
        /// Key velocity
        velocity: u8,
    },
    /// Key released
    NoteOff {
        /// Source channel, 1-based
        channel: u8,
        /// Note number
        note: u8,
        /// Release velocity (unused)
        velocity: u8,
    },
}

impl NoteEvent {
    /// Shorthand for a note-on event
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        NoteEvent::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    /// Shorthand for a note-off event
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        NoteEvent::NoteOff {
            channel,
            note,
            velocity,
        }
    }

    /// Source channel (1-based)
    pub fn source_channel(&self) -> u8 {
        match *self {
            NoteEvent::NoteOn { channel, .. } | NoteEvent::NoteOff { channel, .. } => channel,
        }
    }

    /// Hardware channel the event is routed to.
    pub fn hardware_channel(&self) -> Channel {
        hardware_channel(self.source_channel())
    }
}

/// Map a 1-based source channel onto a hardware channel.
///
/// Channels 1-3 map to A-C; anything higher folds onto C. Channel 0 is not a
/// valid 1-based channel and is treated as channel 1.
pub fn hardware_channel(source: u8) -> Channel {
    if source == 0 {
        warn!("source channel 0 is not 1-based, routing to channel A");
    }
    Channel::clamped(source.max(1) as usize - 1)
}

/// Routes decoded events into the voice allocator.
pub struct EventDispatcher<B: RegisterBus> {
    allocator: VoiceAllocator<B>,
}

impl<B: RegisterBus> EventDispatcher<B> {
    /// Create a dispatcher over a fresh allocator.
    pub fn new(bus: B, config: &DriverConfig) -> Self {
        Self {
            allocator: VoiceAllocator::new(bus, config),
        }
    }

    /// Run the chip startup sequence.
    pub fn startup(&mut self) -> Result<()> {
        self.allocator.startup()
    }

    /// Handle one event to completion.
    pub fn dispatch(&mut self, event: NoteEvent, now: Instant) -> Result<()> {
        let channel = event.hardware_channel();
        match event {
            NoteEvent::NoteOn { note, velocity, .. } => {
                self.allocator.note_on(channel, note, velocity)
            }
            NoteEvent::NoteOff { note, .. } => self.allocator.note_off(channel, note, now),
        }
    }

    /// Fire release timers due at `now`.
    pub fn poll_timers(&mut self, now: Instant) -> Result<usize> {
        self.allocator.fire_due(now)
    }

    /// The allocator
    pub fn allocator(&self) -> &VoiceAllocator<B> {
        &self.allocator
    }

    /// Mutable access to the allocator
    pub fn allocator_mut(&mut self) -> &mut VoiceAllocator<B> {
        &mut self.allocator
    }

    /// Unwrap the allocator.
    pub fn into_allocator(self) -> VoiceAllocator<B> {
        self.allocator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RecordingBus;

    #[test]
    fn test_channel_translation() {
        assert_eq!(hardware_channel(1), Channel::A);
        assert_eq!(hardware_channel(2), Channel::B);
        assert_eq!(hardware_channel(3), Channel::C);
        assert_eq!(hardware_channel(4), Channel::C);
        assert_eq!(hardware_channel(16), Channel::C);
        assert_eq!(hardware_channel(0), Channel::A);
    }

    #[test]
    fn test_dispatch_routes_to_channel() {
        let mut dispatcher = EventDispatcher::new(RecordingBus::new(), &DriverConfig::default());
        dispatcher.startup().unwrap();
        let now = Instant::now();

        dispatcher.dispatch(NoteEvent::note_on(2, 60, 64), now).unwrap();
        dispatcher.dispatch(NoteEvent::note_on(9, 72, 64), now).unwrap();

        let alloc = dispatcher.allocator();
        assert_eq!(alloc.sounding_note(Channel::B), Some(60));
        assert_eq!(alloc.sounding_note(Channel::C), Some(72));
        assert_eq!(alloc.sounding_note(Channel::A), None);
    }

    #[test]
    fn test_note_off_velocity_ignored() {
        let mut dispatcher = EventDispatcher::new(RecordingBus::new(), &DriverConfig::default());
        dispatcher.startup().unwrap();
        let now = Instant::now();

        dispatcher.dispatch(NoteEvent::note_on(1, 60, 64), now).unwrap();
        dispatcher.dispatch(NoteEvent::note_off(1, 60, 127), now).unwrap();
        assert_eq!(dispatcher.allocator().total_active(), 0);
        let release = dispatcher.allocator().config().release_delay();
        assert_eq!(dispatcher.poll_timers(now + release).unwrap(), 1);
    }
}
