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

//! Connection lifecycle state machine.

use crate::reactor::events::EventMask;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Accepting,
    Handshaking,
    Normal,
    Closing,
    Closed
}

impl ConnectionState {
    /// Interest mask implied by the state alone, before outbound-buffer state is folded in.
    /// `Normal` and `Handshaking` additionally need `WRITABLE` opted in whenever the
    /// outbound buffer is non-empty; callers add that bit themselves.
    pub fn base_interest(self) -> EventMask {
        match self {
            ConnectionState::Accepting => EventMask::READABLE,
            ConnectionState::Handshaking => EventMask::READABLE,
            ConnectionState::Normal => EventMask::READABLE,
            ConnectionState::Closing => EventMask::NONE,
            ConnectionState::Closed => EventMask::NONE
        }
    }

    pub fn is_terminal(self) -> bool { self == ConnectionState::Closed }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepting_is_readable_only() {
        assert_eq!(ConnectionState::Accepting.base_interest(), EventMask::READABLE);
    }

    #[test]
    fn closed_has_no_interest() {
        assert_eq!(ConnectionState::Closed.base_interest(), EventMask::NONE);
        assert!(ConnectionState::Closed.is_terminal());
    }
}
