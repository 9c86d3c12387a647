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

//! Readiness polling, expressed as a capability trait so the concrete OS primitive
//! (epoll, kqueue, ...) can be swapped without touching the reactor loop.

use std::io;
use std::time::Duration;
use mio::{Events, Interest, Poll, Token};
use crate::reactor::events::EventMask;

/// Capability set every readiness backend must provide. Chosen once at startup; no
/// per-call dynamic dispatch is required beyond the single trait object the hub holds.
pub trait ReadinessPoller {
    /// Registers a raw file descriptor's source for the given interest.
    fn add_fd(&mut self, descriptor: usize, source: &mut dyn mio::event::Source,
              mask: EventMask) -> io::Result<()>;

    /// Updates the interest for an already-registered source.
    fn reregister_fd(&mut self, source: &mut dyn mio::event::Source,
                      descriptor: usize, mask: EventMask) -> io::Result<()>;

    /// Deregisters a source. Idempotent: deregistering an absent source is not an error.
    fn remove_fd(&mut self, source: &mut dyn mio::event::Source) -> io::Result<()>;

    /// Blocks at most `timeout`, then returns `(descriptor, revents)` pairs for which
    /// revents is non-empty, in ascending descriptor order.
    fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<(usize, EventMask)>>;
}

/// `mio`-backed poller. `mio::Poll` already multiplexes onto epoll/kqueue/IOCP per target,
/// so polymorphism over the OS primitive comes for free without per-call virtual overhead.
pub struct MioPoller {
    poll: Poll,
    events: Events
}

impl MioPoller {
    pub fn new(events_capacity: usize) -> io::Result<MioPoller> {
        Ok(MioPoller { poll: Poll::new()?, events: Events::with_capacity(events_capacity) })
    }

    fn interest_for(mask: EventMask) -> Interest {
        if mask.contains(EventMask::READABLE) && mask.contains(EventMask::WRITABLE) {
            Interest::READABLE | Interest::WRITABLE
        } else if mask.contains(EventMask::WRITABLE) {
            Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }
}

impl ReadinessPoller for MioPoller {
    fn add_fd(&mut self, descriptor: usize, source: &mut dyn mio::event::Source,
              mask: EventMask) -> io::Result<()> {
        self.poll.registry().register(source, Token(descriptor), Self::interest_for(mask))
    }

    fn reregister_fd(&mut self, source: &mut dyn mio::event::Source,
                      descriptor: usize, mask: EventMask) -> io::Result<()> {
        self.poll.registry().reregister(source, Token(descriptor), Self::interest_for(mask))
    }

    fn remove_fd(&mut self, source: &mut dyn mio::event::Source) -> io::Result<()> {
        match self.poll.registry().deregister(source) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
        }
    }

    fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<(usize, EventMask)>> {
        self.poll.poll(&mut self.events, timeout)?;
        let mut ready: Vec<(usize, EventMask)> = self.events.iter().map(|ev| {
            let mut mask = EventMask::NONE;
            if ev.is_readable() { mask = mask.union(EventMask::READABLE); }
            if ev.is_writable() { mask = mask.union(EventMask::WRITABLE); }
            if ev.is_error() || ev.is_read_closed() || ev.is_write_closed() {
                mask = mask.union(EventMask::ERROR);
            }
            (ev.token().0, mask)
        }).collect();
        ready.sort_by_key(|(d, _)| *d);
        ready.dedup_by_key(|(d, _)| *d);
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdTcpListener;
    use mio::net::TcpListener;

    #[test]
    fn poll_reports_listener_readable_on_connect() {
        let std_listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let addr = std_listener.local_addr().unwrap();
        let mut listener = TcpListener::from_std(std_listener);

        let mut poller = MioPoller::new(8).unwrap();
        poller.add_fd(10, &mut listener, EventMask::READABLE).unwrap();

        let _client = std::net::TcpStream::connect(addr).unwrap();
        let ready = poller.poll(Some(Duration::from_secs(2))).unwrap();
        assert!(ready.iter().any(|(d, m)| *d == 10 && m.contains(EventMask::READABLE)));
    }
}
