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

//! A single peer session: socket, framing buffers, negotiated features and lifecycle state.

pub mod state;
pub mod features;
pub mod buffer;

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Instant;
use mio::net::TcpStream;

pub use state::ConnectionState;
pub use features::{Feature, FeatureSet};
use buffer::{ReceiveBuffer, SendBuffer};
use crate::reactor::events::EventMask;

/// One accepted peer connection. Owns its socket and framing buffers exclusively; the
/// descriptor table and event registrar only ever hold its `mio::Token` (its raw fd).
pub struct Connection {
    socket: TcpStream,
    descriptor: usize,
    peer_addr: SocketAddr,
    state: ConnectionState,
    inbound: ReceiveBuffer,
    outbound: SendBuffer,
    last_activity: Instant,
    features: FeatureSet,
    /// Nickname this connection registered under, once known.
    nick: Option<String>,
    /// Set when a higher layer decided to boot this peer; mirrored into the event
    /// registrar's CLOSE_REQUESTED bit by the caller.
    close_requested: bool
}

impl Connection {
    pub fn accept(socket: TcpStream, descriptor: usize, peer_addr: SocketAddr,
                  max_frame_size: usize) -> Connection {
        Connection {
            socket,
            descriptor,
            peer_addr,
            state: ConnectionState::Accepting,
            inbound: ReceiveBuffer::new(max_frame_size),
            outbound: SendBuffer::new(),
            last_activity: Instant::now(),
            features: FeatureSet::empty(),
            nick: None,
            close_requested: false
        }
    }

    pub fn descriptor(&self) -> usize { self.descriptor }
    pub fn peer_addr(&self) -> SocketAddr { self.peer_addr }
    pub fn state(&self) -> ConnectionState { self.state }
    pub fn features(&self) -> &FeatureSet { &self.features }
    pub fn nick(&self) -> Option<&str> { self.nick.as_deref() }
    pub fn set_nick(&mut self, nick: String) { self.nick = Some(nick); }
    pub fn socket_mut(&mut self) -> &mut TcpStream { &mut self.socket }
    pub fn last_activity(&self) -> Instant { self.last_activity }

    /// First handshake bytes arrived: promote from `Accepting` to `Handshaking`.
    pub fn begin_handshake(&mut self) {
        if self.state == ConnectionState::Accepting { self.state = ConnectionState::Handshaking; }
    }

    /// NICK and feature negotiation completed: promote to `Normal`.
    pub fn complete_handshake(&mut self, supports: &str) {
        self.features = FeatureSet::from_tokens(supports);
        self.state = ConnectionState::Normal;
    }

    /// Marks the connection for a graceful close; outbound bytes already queued still
    /// get a chance to drain before the descriptor is actually released.
    pub fn request_close(&mut self) {
        self.close_requested = true;
        if self.state == ConnectionState::Normal { self.state = ConnectionState::Closing; }
    }

    pub fn close_requested(&self) -> bool { self.close_requested }

    /// Any I/O error, or a handshake-time failure, moves straight to `Closed` regardless
    /// of the current state.
    pub fn fail(&mut self) { self.state = ConnectionState::Closed; }

    pub fn queue_frame(&mut self, frame: &[u8]) {
        self.outbound.push_frame(frame);
    }

    /// Computes the interest mask implied by the current state plus buffer occupancy.
    /// A writable-ready connection whose outbound buffer later empties must be re-polled
    /// through this method and re-registered, or the next poll busy-loops on writable.
    pub fn wanted_interest(&self) -> EventMask {
        let mut mask = self.state.base_interest();
        let wants_writable = match self.state {
            ConnectionState::Accepting | ConnectionState::Closed => false,
            ConnectionState::Handshaking | ConnectionState::Normal => ! self.outbound.is_empty(),
            ConnectionState::Closing => true
        };
        if wants_writable { mask = mask.union(EventMask::WRITABLE); }
        if self.close_requested { mask = mask.union(EventMask::CLOSE_REQUESTED); }
        mask
    }

    /// Reads opportunistically into the inbound buffer. Returns the complete frames
    /// extracted, in FIFO order. A transient `WouldBlock` is not an error; any other I/O
    /// error during `Normal` is retried next tick, during `Handshaking` it is fatal.
    pub fn read_frames(&mut self) -> Result<Vec<Vec<u8>>, io::Error> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.socket.read(&mut chunk) {
                Ok(0) => { self.state = ConnectionState::Closed; break }
                Ok(n) => {
                    self.last_activity = Instant::now();
                    if self.inbound.feed(&chunk[..n]).is_err() {
                        self.state = ConnectionState::Closed;
                        break
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e)
            }
        }
        let mut frames = Vec::new();
        while let Some(f) = self.inbound.next_frame() { frames.push(f); }
        Ok(frames)
    }

    /// Writes as much of the outbound buffer as the socket accepts right now.
    pub fn flush_outbound(&mut self) -> Result<(), io::Error> {
        loop {
            if self.outbound.is_empty() { break }
            match self.socket.write(self.outbound.as_slice()) {
                Ok(0) => break,
                Ok(n) => self.outbound.consume(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e)
            }
        }
        if self.state == ConnectionState::Closing && self.outbound.is_empty() {
            self.state = ConnectionState::Closed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdTcpListener;

    fn accepted_pair() -> (Connection, std::net::TcpStream) {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server_std, peer) = listener.accept().unwrap();
        server_std.set_nonblocking(true).unwrap();
        let server = TcpStream::from_std(server_std);
        (Connection::accept(server, 42, peer, 4096), client)
    }

    #[test]
    fn starts_in_accepting_with_readable_interest() {
        let (conn, _client) = accepted_pair();
        assert_eq!(conn.state(), ConnectionState::Accepting);
        assert_eq!(conn.wanted_interest(), EventMask::READABLE);
    }

    #[test]
    fn handshake_then_normal_transitions() {
        let (mut conn, _client) = accepted_pair();
        conn.begin_handshake();
        assert_eq!(conn.state(), ConnectionState::Handshaking);
        conn.complete_handshake("TLS BotINFO");
        assert_eq!(conn.state(), ConnectionState::Normal);
        assert!(conn.features().has(Feature::TLS));
    }

    #[test]
    fn queued_outbound_adds_writable_interest() {
        let (mut conn, _client) = accepted_pair();
        conn.begin_handshake();
        conn.complete_handshake("");
        assert_eq!(conn.wanted_interest(), EventMask::READABLE);
        conn.queue_frame(b"$Lock FOO");
        assert!(conn.wanted_interest().contains(EventMask::WRITABLE));
    }

    #[test]
    fn request_close_moves_normal_to_closing() {
        let (mut conn, _client) = accepted_pair();
        conn.begin_handshake();
        conn.complete_handshake("");
        conn.request_close();
        assert_eq!(conn.state(), ConnectionState::Closing);
        assert!(conn.close_requested());
    }

    #[test]
    fn read_frames_extracts_complete_sentinel_delimited_frames() {
        let (mut conn, mut client) = accepted_pair();
        client.write_all(b"$MyNick Alice|").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));
        let frames = conn.read_frames().unwrap();
        assert_eq!(frames, vec![b"$MyNick Alice".to_vec()]);
    }
}
