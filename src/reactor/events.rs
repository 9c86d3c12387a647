// -----------------------------------------------------------------------------------------------
// dchub - Direct Connect hub server
//
// Copyright (c) 2022, Frank Sommer.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are met:
//
// * Redistributions of source code must retain the above copyright notice, this
//   list of conditions and the following disclaimer.
//
// * Redistributions in binary form must reproduce the above copyright notice,
//   this list of conditions and the following disclaimer in the documentation
//   and/or other materials provided with the distribution.
//
// * Neither the name of the copyright holder nor the names of its
//   contributors may be used to endorse or promote products derived from
//   this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
// AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE
// FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
// CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY,
// OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.
// -----------------------------------------------------------------------------------------------

//! Per-descriptor interest and revents bitsets.

/// Bitset over the readiness events a connection can care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EventMask(u8);

impl EventMask {
    pub const NONE: EventMask          = EventMask(0);
    pub const READABLE: EventMask      = EventMask(1 << 0);
    pub const WRITABLE: EventMask      = EventMask(1 << 1);
    pub const ERROR: EventMask         = EventMask(1 << 2);
    pub const CLOSE_REQUESTED: EventMask = EventMask(1 << 3);
    /// Shorthand for the union of readable, writable and error; only meaningful when
    /// deregistering, never a legal interest value on its own.
    pub const ALL: EventMask = EventMask(Self::READABLE.0 | Self::WRITABLE.0 | Self::ERROR.0);

    #[inline]
    pub fn contains(self, other: EventMask) -> bool { self.0 & other.0 == other.0 }

    #[inline]
    pub fn intersects(self, other: EventMask) -> bool { self.0 & other.0 != 0 }

    #[inline]
    pub fn is_empty(self) -> bool { self.0 == 0 }

    #[inline]
    pub fn union(self, other: EventMask) -> EventMask { EventMask(self.0 | other.0) }

    #[inline]
    pub fn difference(self, other: EventMask) -> EventMask { EventMask(self.0 & !other.0) }
}

impl std::ops::BitOr for EventMask {
    type Output = EventMask;
    fn bitor(self, rhs: EventMask) -> EventMask { self.union(rhs) }
}

/// One interest/revents pair per live descriptor.
#[derive(Clone, Copy, Debug, Default)]
struct EventRecord {
    interest: EventMask,
    revents: EventMask
}

/// Registry of per-descriptor interest and revents bitsets.
///
/// Interest and revents are kept separate deliberately: clearing interest does not retract
/// a revent bit already observed in the current tick, so higher layers must dispatch
/// idempotently rather than assume opt-out cancels an in-flight notification.
#[derive(Debug, Default)]
pub struct EventRegistrar {
    records: Vec<Option<EventRecord>>
}

impl EventRegistrar {
    pub fn new() -> EventRegistrar { EventRegistrar { records: Vec::new() } }

    fn ensure_slot(&mut self, descriptor: usize) -> &mut EventRecord {
        if descriptor >= self.records.len() {
            self.records.resize_with(descriptor + 1, || None);
        }
        self.records[descriptor].get_or_insert_with(EventRecord::default)
    }

    /// Sets the named bits in the descriptor's interest mask, registering it if unseen.
    pub fn opt_in(&mut self, descriptor: usize, mask: EventMask) {
        let rec = self.ensure_slot(descriptor);
        rec.interest = rec.interest.union(mask);
    }

    /// Clears the named bits from the descriptor's interest mask.
    /// Clearing `ALL` does not touch `CLOSE_REQUESTED`; that bit must be opted out explicitly.
    pub fn opt_out(&mut self, descriptor: usize, mask: EventMask) {
        if let Some(Some(rec)) = self.records.get_mut(descriptor) {
            rec.interest = rec.interest.difference(mask);
        }
    }

    pub fn opt_get(&self, descriptor: usize) -> EventMask {
        self.records.get(descriptor).and_then(|r| r.as_ref())
            .map_or(EventMask::NONE, |r| r.interest)
    }

    /// Overwrites the revents mask for `descriptor`, as reported by the last poll.
    pub fn set_revents(&mut self, descriptor: usize, revents: EventMask) {
        let rec = self.ensure_slot(descriptor);
        rec.revents = revents;
    }

    pub fn rev_get(&self, descriptor: usize) -> EventMask {
        self.records.get(descriptor).and_then(|r| r.as_ref())
            .map_or(EventMask::NONE, |r| r.revents)
    }

    pub fn rev_test(&self, descriptor: usize) -> bool {
        ! self.rev_get(descriptor).is_empty()
    }

    /// Removes all registrar state for `descriptor`: opts out of `ALL`, then opts out of
    /// `CLOSE_REQUESTED` as the final step, guaranteeing no further dispatch is possible.
    pub fn purge(&mut self, descriptor: usize) {
        if let Some(slot) = self.records.get_mut(descriptor) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_in_then_opt_out_restores_interest() {
        let mut reg = EventRegistrar::new();
        reg.opt_in(4, EventMask::READABLE);
        reg.opt_in(4, EventMask::WRITABLE);
        assert!(reg.opt_get(4).contains(EventMask::READABLE | EventMask::WRITABLE));
        reg.opt_out(4, EventMask::WRITABLE);
        assert_eq!(reg.opt_get(4), EventMask::READABLE);
        reg.opt_out(4, EventMask::READABLE);
        assert_eq!(reg.opt_get(4), EventMask::NONE);
    }

    #[test]
    fn opt_out_does_not_retract_current_revents() {
        let mut reg = EventRegistrar::new();
        reg.opt_in(1, EventMask::READABLE);
        reg.set_revents(1, EventMask::READABLE);
        reg.opt_out(1, EventMask::READABLE);
        assert!(reg.rev_test(1));
        assert_eq!(reg.rev_get(1), EventMask::READABLE);
    }

    #[test]
    fn purge_clears_everything() {
        let mut reg = EventRegistrar::new();
        reg.opt_in(2, EventMask::ALL);
        reg.set_revents(2, EventMask::ERROR);
        reg.purge(2);
        assert_eq!(reg.opt_get(2), EventMask::NONE);
        assert_eq!(reg.rev_get(2), EventMask::NONE);
        assert!(! reg.rev_test(2));
    }

    #[test]
    fn revents_subset_of_interest_plus_error_and_close() {
        let mut reg = EventRegistrar::new();
        reg.opt_in(9, EventMask::READABLE);
        reg.set_revents(9, EventMask::READABLE | EventMask::ERROR);
        let revents = reg.rev_get(9);
        let allowed = reg.opt_get(9).union(EventMask::ERROR).union(EventMask::CLOSE_REQUESTED);
        assert!(allowed.contains(revents));
    }
}
