//! Per-channel release timers.
//!
//! Each channel owns at most one pending timer. Timers do not run callbacks
//! on their own thread; the owner polls [`EnvelopeScheduler::fire_due`] from
//! the same execution context that handles note events and runs the returned
//! actions there, so a firing timer can never interleave its register writes
//! with a live note.

use std::time::{Duration, Instant};

use crate::registers::{Channel, CHANNEL_COUNT};

/// Identifies one arming of a channel timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTicket {
    /// Channel the timer belongs to
    pub channel: Channel,
    /// Arming generation; bumps on every arm
    pub generation: u64,
}

/// A timer that reached its deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<A> {
    /// Ticket issued when the timer was armed
    pub ticket: TimerTicket,
    /// Deadline the timer was armed for
    pub deadline: Instant,
    /// Action supplied at arm time
    pub action: A,
}

#[derive(Debug)]
struct Pending<A> {
    deadline: Instant,
    generation: u64,
    action: A,
}

#[derive(Debug)]
struct Slot<A> {
    generation: u64,
    pending: Option<Pending<A>>,
}

/// One-shot, cancel-and-replace timers, one slot per channel.
#[derive(Debug)]
pub struct EnvelopeScheduler<A> {
    slots: [Slot<A>; CHANNEL_COUNT],
}

impl<A> EnvelopeScheduler<A> {
    /// Create a scheduler with nothing pending.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot {
                generation: 0,
                pending: None,
            }),
        }
    }

    /// Schedule `on_fire` for `channel` after `delay`, replacing any pending timer.
    ///
    /// A zero delay is due immediately and fires on the next poll.
    pub fn arm(
        &mut self,
        channel: Channel,
        delay: Duration,
        now: Instant,
        on_fire: A,
    ) -> TimerTicket {
        let slot = &mut self.slots[channel.index()];
        slot.generation += 1;
        slot.pending = Some(Pending {
            deadline: now + delay,
            generation: slot.generation,
            action: on_fire,
        });
        TimerTicket {
            channel,
            generation: slot.generation,
        }
    }

    /// Drop the pending timer for `channel`. Returns whether one was pending.
    pub fn cancel(&mut self, channel: Channel) -> bool {
        self.slots[channel.index()].pending.take().is_some()
    }

    /// Drop every pending timer.
    pub fn cancel_all(&mut self) {
        for slot in &mut self.slots {
            slot.pending = None;
        }
    }

    /// Whether `channel` has a timer that has not fired yet.
    pub fn is_pending(&self, channel: Channel) -> bool {
        self.slots[channel.index()].pending.is_some()
    }

    /// Whether `ticket` is still the pending timer of its channel.
    pub fn is_current(&self, ticket: TimerTicket) -> bool {
        self.slots[ticket.channel.index()]
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == ticket.generation)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter_map(|s| s.pending.as_ref().map(|p| p.deadline))
            .min()
    }

    /// Time left until the earliest deadline (zero if already due).
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Remove and return every timer whose deadline is at or before `now`,
    /// earliest first.
    pub fn fire_due(&mut self, now: Instant) -> Vec<Fired<A>> {
        let mut fired = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.pending.as_ref().is_some_and(|p| p.deadline <= now) {
                if let Some(p) = slot.pending.take() {
                    fired.push(Fired {
                        ticket: TimerTicket {
                            channel: Channel::clamped(index),
                            generation: p.generation,
                        },
                        deadline: p.deadline,
                        action: p.action,
                    });
                }
            }
        }
        fired.sort_by_key(|f| (f.deadline, f.ticket.channel));
        fired
    }
}

impl<A> Default for EnvelopeScheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE: Duration = Duration::from_millis(40);

    #[test]
    fn test_fires_once_after_delay() {
        let mut sched = EnvelopeScheduler::new();
        let t0 = Instant::now();
        sched.arm(Channel::A, RELEASE, t0, "silence");

        assert!(sched.fire_due(t0 + Duration::from_millis(39)).is_empty());
        let fired = sched.fire_due(t0 + RELEASE);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].ticket.channel, Channel::A);
        assert_eq!(fired[0].action, "silence");

        // One-shot
        assert!(sched.fire_due(t0 + RELEASE * 10).is_empty());
        assert!(!sched.is_pending(Channel::A));
    }

    #[test]
    fn test_arm_replaces_pending_timer() {
        let mut sched = EnvelopeScheduler::new();
        let t0 = Instant::now();
        let first = sched.arm(Channel::B, RELEASE, t0, 1);
        let second = sched.arm(Channel::B, RELEASE * 2, t0, 2);

        assert!(!sched.is_current(first));
        assert!(sched.is_current(second));
        assert!(sched.fire_due(t0 + RELEASE).is_empty());

        let fired = sched.fire_due(t0 + RELEASE * 2);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].action, 2);
        assert_eq!(fired[0].ticket, second);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut sched = EnvelopeScheduler::new();
        let t0 = Instant::now();
        assert!(!sched.cancel(Channel::C));
        sched.arm(Channel::C, RELEASE, t0, ());
        assert!(sched.cancel(Channel::C));
        assert!(!sched.cancel(Channel::C));
        assert!(sched.fire_due(t0 + RELEASE).is_empty());
    }

    #[test]
    fn test_zero_delay_is_due_immediately() {
        let mut sched = EnvelopeScheduler::new();
        let t0 = Instant::now();
        sched.arm(Channel::A, Duration::ZERO, t0, ());
        assert_eq!(sched.time_until_next(t0), Some(Duration::ZERO));
        assert_eq!(sched.fire_due(t0).len(), 1);
    }

    #[test]
    fn test_channels_are_independent_and_ordered() {
        let mut sched = EnvelopeScheduler::new();
        let t0 = Instant::now();
        sched.arm(Channel::A, RELEASE * 3, t0, 'a');
        sched.arm(Channel::B, RELEASE, t0, 'b');
        sched.arm(Channel::C, RELEASE * 2, t0, 'c');

        assert_eq!(sched.next_deadline(), Some(t0 + RELEASE));
        sched.cancel(Channel::C);

        let fired: Vec<char> = sched
            .fire_due(t0 + RELEASE * 5)
            .into_iter()
            .map(|f| f.action)
            .collect();
        assert_eq!(fired, vec!['b', 'a']);
        assert_eq!(sched.next_deadline(), None);
    }
}
