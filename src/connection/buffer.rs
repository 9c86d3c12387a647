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

//! Send and receive buffers for the sentinel-delimited connection framing.

use std::fmt::{Debug, Formatter};
use crate::error::*;
use crate::hubxe;

/// Every frame, inbound or outbound, ends with this byte.
pub const SENTINEL: u8 = b'|';

/// Accumulates bytes read from a socket and splits them into sentinel-delimited frames.
/// A frame that would exceed `max_size` before a sentinel is seen is rejected; the caller
/// is expected to close the connection rather than keep accumulating.
pub struct ReceiveBuffer {
    buffer: Vec<u8>,
    max_size: usize
}
impl ReceiveBuffer {
    /// Creates a receive buffer enforcing the given maximum frame size.
    pub fn new(max_size: usize) -> ReceiveBuffer {
        ReceiveBuffer { buffer: Vec::with_capacity(512), max_size }
    }

    /// Appends bytes just read from the socket.
    ///
    /// # Errors
    /// Returns an error once the unterminated buffer content exceeds `max_size`; the
    /// accumulated bytes are discarded so the caller can recover with a fresh buffer.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), HubError> {
        if self.buffer.len() + data.len() > self.max_size {
            self.buffer.clear();
            return Err(hubxe!(E_MSG_TOO_LARGE,
                               (self.buffer.len() + data.len()).to_string(),
                               self.max_size.to_string()))
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Extracts the next complete frame, if the buffer holds a sentinel byte.
    /// The sentinel itself is not included in the returned frame. Multiple frames may be
    /// pending; call repeatedly until `None` is returned.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|&b| b == SENTINEL)?;
        let frame = self.buffer[..pos].to_vec();
        self.buffer.drain(..=pos);
        Some(frame)
    }

    /// Number of bytes currently buffered without having seen a sentinel.
    pub fn pending_len(&self) -> usize { self.buffer.len() }
}
impl Debug for ReceiveBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "pending={}/max={}", self.buffer.len(), self.max_size)
    }
}

/// Queues outbound frames as a single byte buffer ready to be written to the socket in order.
/// A connection with an empty `SendBuffer` must opt out of the writable interest, or the
/// next readiness poll reports writable again with nothing to send.
#[derive(Default)]
pub struct SendBuffer {
    buffer: Vec<u8>
}
impl SendBuffer {
    pub fn new() -> SendBuffer { SendBuffer { buffer: Vec::new() } }

    /// Appends a frame, terminating it with the sentinel byte.
    pub fn push_frame(&mut self, frame: &[u8]) {
        self.buffer.extend_from_slice(frame);
        self.buffer.push(SENTINEL);
    }

    /// Bytes still waiting to be written.
    pub fn as_slice(&self) -> &[u8] { &self.buffer }

    /// Whether there is nothing left to send.
    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    /// Drops the first `n` bytes, e.g. after a partial `write()` succeeded.
    pub fn consume(&mut self, n: usize) {
        self.buffer.drain(..n.min(self.buffer.len()));
    }

    pub fn clear(&mut self) { self.buffer.clear(); }
}
impl Debug for SendBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "queued={}", self.buffer.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_single_frame() {
        let mut rb = ReceiveBuffer::new(1024);
        rb.feed(b"$MyNick Alice|").unwrap();
        let frame = rb.next_frame().unwrap();
        assert_eq!(frame, b"$MyNick Alice");
        assert!(rb.next_frame().is_none());
    }

    #[test]
    fn splits_multiple_frames_fed_at_once() {
        let mut rb = ReceiveBuffer::new(1024);
        rb.feed(b"$A|$B|").unwrap();
        assert_eq!(rb.next_frame().unwrap(), b"$A");
        assert_eq!(rb.next_frame().unwrap(), b"$B");
        assert!(rb.next_frame().is_none());
    }

    #[test]
    fn holds_partial_frame_until_sentinel_arrives() {
        let mut rb = ReceiveBuffer::new(1024);
        rb.feed(b"$MyNick Al").unwrap();
        assert!(rb.next_frame().is_none());
        assert_eq!(rb.pending_len(), 10);
        rb.feed(b"ice|").unwrap();
        assert_eq!(rb.next_frame().unwrap(), b"$MyNick Alice");
    }

    #[test]
    fn rejects_oversize_frame() {
        let mut rb = ReceiveBuffer::new(8);
        let err = rb.feed(b"123456789").unwrap_err();
        assert_eq!(err.severity(), Severity::Error);
        assert_eq!(rb.pending_len(), 0);
    }

    #[test]
    fn send_buffer_tracks_emptiness() {
        let mut sb = SendBuffer::new();
        assert!(sb.is_empty());
        sb.push_frame(b"$Hello");
        assert!(! sb.is_empty());
        assert_eq!(sb.as_slice(), b"$Hello|");
        sb.consume(7);
        assert!(sb.is_empty());
    }
}
