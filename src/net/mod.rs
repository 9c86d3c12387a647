// ---------------------------------------------------------------------------------------------
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
// ---------------------------------------------------------------------------------------------

//! Listening socket and the per-IP whitelist/ban gate applied on accept.

pub mod whitelist;

use std::io;
use std::net::SocketAddr;
use mio::net::{TcpListener, TcpStream};
use crate::error::*;
use crate::hubxe;
use whitelist::{AddressWhitelist, BanList};

/// Outcome of one accept attempt, after the whitelist/ban gate.
pub enum AcceptOutcome {
    Accepted(TcpStream, SocketAddr),
    Rejected(SocketAddr, String)
}

/// Binds the hub's listening socket on `addr`.
pub fn bind_listener(addr: SocketAddr) -> Result<TcpListener, HubError> {
    TcpListener::bind(addr).map_err(|e| hubxe!(E_SOCKET_BIND_ERR, addr.to_string(), e.to_string()))
}

/// Drains all sockets currently pending on `listener`, checking each against the
/// whitelist (always allowed) and ban list (always rejected, unless whitelisted) before
/// handing it back to the caller. Stops at the first `WouldBlock`, which is the normal
/// end-of-burst signal, not an error.
pub fn accept_ready(listener: &TcpListener, whitelist: &AddressWhitelist, bans: &BanList,
                     now: i64) -> io::Result<Vec<AcceptOutcome>> {
    let mut outcomes = Vec::new();
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                if whitelist.allows(&addr) {
                    outcomes.push(AcceptOutcome::Accepted(stream, addr));
                    continue;
                }
                if let Some(reason) = bans.ban_reason(&addr, now) {
                    outcomes.push(AcceptOutcome::Rejected(addr, reason.to_string()));
                    continue;
                }
                outcomes.push(AcceptOutcome::Accepted(stream, addr));
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e)
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banned_peer_without_whitelist_entry_is_rejected() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = std::net::TcpStream::connect(addr).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        let whitelist = AddressWhitelist::default();
        let mut bans = BanList::new();
        bans.add(whitelist::BanEntry::new("127.0.0.1:*", "test", "op", 0).unwrap());

        let outcomes = accept_ready(&listener, &whitelist, &bans, 0).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], AcceptOutcome::Rejected(_, _)));
    }

    #[test]
    fn whitelisted_peer_bypasses_ban() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = std::net::TcpStream::connect(addr).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(50));

        let whitelist = AddressWhitelist::from_patterns(&[String::from("127.0.0.1:*")]);
        let mut bans = BanList::new();
        bans.add(whitelist::BanEntry::new("127.0.0.1:*", "test", "op", 0).unwrap());

        let outcomes = accept_ready(&listener, &whitelist, &bans, 0).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], AcceptOutcome::Accepted(_, _)));
    }
}
