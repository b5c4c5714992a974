// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

/// Type for unsigned time, in system ticks
pub type Time = u64;
/// Type for signed time, in system ticks
pub type TimeS = i64;

/// A scheduler used by the emulation cores to time peripheral events
/// against the shared cycle counter.
///
/// Events are kept in a sorted list; insertions are rare compared to CPU
/// steps, which makes a `Vec` faster than a heap here. Events with equal
/// stamps fire in insertion order, and an event scheduled with zero delay
/// while a batch is draining joins that same batch.
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Scheduler<E: Kind> {
    /// Current time of the scheduler, the global cycle counter.
    time: Time,
    /// Time of the next event.
    next: Time,
    /// Events currently awaiting execution, sorted by execution time
    /// descending; the soonest event is last.
    #[cfg_attr(feature = "serde", serde(bound = ""))]
    events: Vec<ScheduledEvent<E>>,
}

impl<E: Kind> Scheduler<E> {
    /// Schedule an event of the given kind after the given amount
    /// of cycles have elapsed from now.
    /// Number can be negative; this is mainly used for events that were
    /// late and the followup event also needed to happen already.
    pub fn schedule(&mut self, kind: E, after: TimeS) {
        let time = self.time.saturating_add_signed(after);
        let event = ScheduledEvent {
            kind,
            execute_at: time,
        };
        self.events.push(event);

        // Swap the new element towards the front until it is in the right
        // spot. `>=` makes equal stamps keep insertion order: the newer
        // event ends up deeper in the list and pops later.
        for idx in (1..self.events.len()).rev() {
            let other = self.events[idx - 1];
            if time >= other.execute_at {
                self.events[idx] = other;
            } else {
                self.events[idx] = event;
                self.next = self.events.last().unwrap().execute_at;
                return;
            }
        }
        self.events[0] = event;
        self.next = self
            .events
            .last()
            .map(|e| e.execute_at)
            .unwrap_or(Time::MAX);
    }

    /// Advance the current time by the given amount of ticks.
    #[inline]
    pub fn advance(&mut self, by: Time) {
        self.time += by;
    }

    /// Advance the current time to the given absolute stamp.
    #[inline]
    pub fn advance_to(&mut self, time: Time) {
        debug_assert!(time >= self.time);
        self.time = time;
    }

    /// Get the next pending event. If no event is due yet, returns None.
    #[inline]
    pub fn get_next_pending(&mut self) -> Option<Event<E>> {
        if self.next <= self.time {
            let event = self.events.pop().unwrap();
            self.next = self
                .events
                .last()
                .map(|e| e.execute_at)
                .unwrap_or(Time::MAX);
            Some(Event {
                kind: event.kind,
                late_by: (self.time - event.execute_at) as TimeS,
            })
        } else {
            None
        }
    }

    /// Is an event due at the current time?
    #[inline]
    pub fn has_events(&self) -> bool {
        self.next <= self.time
    }

    /// Stamp of the soonest pending event.
    #[inline]
    pub fn next_at(&self) -> Time {
        self.next
    }

    /// Return the next event immediately, and set the current time to
    /// the event's execution time. This is useful during HALT or similar
    /// states.
    pub fn pop(&mut self) -> Event<E> {
        let event = self.events.pop().unwrap();
        debug_assert!(event.execute_at >= self.time);
        self.time = event.execute_at;
        self.next = self
            .events
            .last()
            .map(|e| e.execute_at)
            .unwrap_or(Time::MAX);
        Event {
            kind: event.kind,
            late_by: 0,
        }
    }

    /// Subtract the given amount from the current time and every pending
    /// stamp. Used to periodically rebase the shared counter so it stays
    /// far away from overflow; the CPUs' local counters are rebased in
    /// lockstep by the caller.
    pub fn rebase(&mut self, by: Time) {
        self.time = self.time.saturating_sub(by);
        for event in &mut self.events {
            event.execute_at = event.execute_at.saturating_sub(by);
        }
        self.next = self.next.saturating_sub(by);
    }

    #[inline]
    pub fn now(&self) -> Time {
        self.time
    }
}

impl<E: Kind> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            time: 0,
            next: Time::MAX,
            events: Vec::new(),
        }
    }
}

/// An event awaiting execution
#[derive(Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct ScheduledEvent<E: Kind> {
    /// Kind of event to execute
    #[cfg_attr(feature = "serde", serde(bound = ""))]
    kind: E,
    /// Time of the scheduler to execute it at
    execute_at: Time,
}

/// Trait for event kinds.
#[cfg(feature = "serde")]
pub trait Kind:
    for<'de> serde::Deserialize<'de> + serde::Serialize + PartialEq + Copy + Clone
{
}
#[cfg(not(feature = "serde"))]
pub trait Kind: PartialEq + Copy + Clone {}

/// Event that is ready to be handled.
#[derive(Copy, Clone)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub struct Event<E: Kind> {
    /// The kind of event to handle
    pub kind: E,
    /// By how many ticks the event was delayed. For example:
    /// - Event was scheduled to be executed at tick 1000
    /// - Scheduler ran until 1010 before the event got handled
    /// - `late_by` will be 1010 - 1000 = 10.
    pub late_by: TimeS,
}
