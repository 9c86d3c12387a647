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

//! The Hub Context: the process-wide instance owning the reactor, the lobby state and the
//! persistence handles. Every other component reaches its neighbors only through this
//! explicit handle, never through a file-scope mutable pointer.

use std::path::Path;
use std::time::Duration;
use chrono::Local;
use crate::bots::BotRegistry;
use crate::cli::Args;
use crate::config::HubConfig;
use crate::connection::Connection;
use crate::error::*;
use crate::geo::GeoLookup;
use crate::hubxe;
use crate::hublog_info;
use crate::hublog_warn;
use crate::hublog_error;
use crate::net::{self, whitelist::{AddressWhitelist, BanList}};
use crate::reactor::{DescriptorTable, EventRegistrar, EventMask, MioPoller, ReadinessPoller};
use crate::signals::{self, SignalAction, SignalSource};
use crate::users::UserStore;
use mio::net::TcpListener;

/// Reserved descriptor the listening socket is registered under. Real connections arrive
/// on whatever descriptor `accept()` hands back from the OS, which never collides with
/// this sentinel in practice.
const LISTENER_DESCRIPTOR: usize = usize::MAX - 2;

pub struct Hub {
    config: HubConfig,
    listener: TcpListener,
    whitelist: AddressWhitelist,
    bans: BanList,
    descriptors: DescriptorTable<Connection>,
    registrar: EventRegistrar,
    poller: MioPoller,
    signal_source: SignalSource,
    geo: GeoLookup,
    users: UserStore,
    bots: BotRegistry,
    config_dir: String,
    running: bool
}

impl Hub {
    /// Constructs the hub: loads configuration, binds the listening socket, opens the
    /// user database and geo databases, and wires signal delivery into the reactor.
    pub fn new(config_dir: &Path, args: &Args) -> Result<Hub, HubError> {
        let mut config = HubConfig::load(config_dir)?;
        if let Some(port) = args.port { config.port = port; }

        let bind_addr = format!("0.0.0.0:{}", config.port).parse()
            .map_err(|_| hubxe!(E_SOCKET_BIND_ERR, config.port.to_string(),
                                 String::from("invalid bind address")))?;
        let mut listener = net::bind_listener(bind_addr)?;

        let mut poller = MioPoller::new(1024)
            .map_err(|e| hubxe!(E_POLL_FAILED, e.to_string()))?;
        poller.add_fd(LISTENER_DESCRIPTOR, &mut listener, EventMask::READABLE)
            .map_err(|e| hubxe!(E_POLL_FAILED, e.to_string()))?;

        let mut signal_source = SignalSource::new()
            .map_err(|e| hubxe!(E_POLL_FAILED, e.to_string()))?;
        poller.add_fd(signals::SIGNAL_DESCRIPTOR, signal_source.source(), EventMask::READABLE)
            .map_err(|e| hubxe!(E_POLL_FAILED, e.to_string()))?;

        let whitelist = AddressWhitelist::from_patterns(&config.whitelist);
        let users = UserStore::open(&config.users_db_path)?;
        let geo = GeoLookup::new(&config.geo_db_dir, config.geo_cache_max_age_secs);

        hublog_info!("hub listening on port {}", config.port);

        Ok(Hub {
            config,
            listener,
            whitelist,
            bans: BanList::new(),
            descriptors: DescriptorTable::new(),
            registrar: EventRegistrar::new(),
            poller,
            signal_source,
            geo,
            users,
            bots: BotRegistry::new(),
            config_dir: config_dir.display().to_string(),
            running: true
        })
    }

    pub fn geo(&mut self) -> &mut GeoLookup { &mut self.geo }
    pub fn users(&self) -> &UserStore { &self.users }
    pub fn bots(&mut self) -> &mut BotRegistry { &mut self.bots }
    pub fn connection_count(&self) -> usize { self.descriptors.len() }

    /// Resolves a nick to the descriptor of its live connection, folding case the same
    /// way the registered-user store does.
    fn find_descriptor_by_nick(&self, nick: &str) -> Option<usize> {
        let folded = crate::users::fold_nick(nick);
        self.descriptors.iter()
            .find(|(_, conn)| conn.nick().map(crate::users::fold_nick).as_deref()
                  == Some(folded.as_str()))
            .map(|(d, _)| d)
    }

    fn is_operator_nick(&self, nick: &str) -> bool {
        matches!(self.users.find(nick), Ok(Some(user)) if user.class >= 3)
    }

    /// `InUserSupports(nick, flag)`: true iff `nick` names a live connection whose
    /// negotiated feature bitset contains `flag`. The decimal-bitmask compatibility
    /// fallback is gated by `compat_numeric_supports_fallback` in the configuration.
    pub fn in_user_supports(&self, nick: &str, flag: &str) -> bool {
        let fallback = self.config.compat_numeric_supports_fallback;
        self.find_descriptor_by_nick(nick)
            .and_then(|d| self.descriptors.lookup(d))
            .map_or(false, |conn| conn.features().supports(flag, fallback))
    }

    /// `ReportUser(nick, message)`: routes a textual notice to the operator chat room if
    /// `nick` names a live connection. The operator chat room is every connected user
    /// whose registered account class qualifies as operator (class >= 3, the same
    /// threshold `bots::Bot::is_operator` uses).
    pub fn report_user(&mut self, nick: &str, message: &str) {
        if self.find_descriptor_by_nick(nick).is_none() { return }
        let notice = format!("<Hub-Security> {} reported: {}", nick, message);
        let connected: Vec<(usize, String)> = self.descriptors.iter()
            .filter_map(|(d, conn)| conn.nick().map(|n| (d, n.to_string())))
            .collect();
        for (descriptor, conn_nick) in connected {
            if self.is_operator_nick(&conn_nick) {
                if let Some(conn) = self.descriptors.lookup_mut(descriptor) {
                    conn.queue_frame(notice.as_bytes());
                }
            }
        }
    }

    /// Runs the reactor until a shutdown signal arrives: poll, dispatch readiness, run
    /// timers, repeat. The poll is the only suspension point.
    pub fn run(&mut self) -> Result<(), HubError> {
        let timeout = Duration::from_millis(self.config.poll_timeout_ms);
        while self.running {
            let ready = self.poller.poll(Some(timeout))
                .map_err(|e| hubxe!(E_POLL_FAILED, e.to_string()))?;
            for (descriptor, _mask) in ready {
                if descriptor == LISTENER_DESCRIPTOR {
                    self.accept_pending();
                } else if descriptor == signals::SIGNAL_DESCRIPTOR {
                    self.handle_signals();
                } else {
                    self.service_connection(descriptor);
                }
            }
            self.run_timers();
        }
        Ok(())
    }

    fn accept_pending(&mut self) {
        let now = Local::now().timestamp();
        let outcomes = match net::accept_ready(&self.listener, &self.whitelist, &self.bans, now) {
            Ok(outcomes) => outcomes,
            Err(e) => { hublog_error!("accept failed: {}", e); return }
        };
        for outcome in outcomes {
            match outcome {
                net::AcceptOutcome::Accepted(mut stream, addr) => {
                    let descriptor = stream_descriptor(&stream);
                    if let Err(e) = self.poller.add_fd(descriptor, &mut stream, EventMask::READABLE) {
                        hublog_error!("failed to register accepted peer {}: {}", addr, e);
                        continue;
                    }
                    self.registrar.opt_in(descriptor, EventMask::READABLE);
                    let conn = Connection::accept(stream, descriptor, addr, self.config.max_frame_size);
                    if let Err(e) = self.descriptors.add(descriptor, conn) {
                        hublog_error!("descriptor table rejected {}: {}", addr, e);
                    }
                },
                net::AcceptOutcome::Rejected(addr, reason) => {
                    hublog_warn!("rejected connection from {}: {}", addr, reason);
                }
            }
        }
    }

    fn service_connection(&mut self, descriptor: usize) {
        let mut should_remove = false;
        if let Some(conn) = self.descriptors.lookup_mut(descriptor) {
            if conn.state() == crate::connection::ConnectionState::Accepting {
                conn.begin_handshake();
            }
            match conn.read_frames() {
                Ok(frames) => {
                    for frame in &frames { service_handshake_frame(conn, frame); }
                },
                Err(e) => {
                    hublog_warn!("read error on descriptor {}: {}", descriptor, e);
                    conn.fail();
                }
            }
            if let Err(e) = conn.flush_outbound() {
                hublog_warn!("write error on descriptor {}: {}", descriptor, e);
                conn.fail();
            }
            let interest = conn.wanted_interest();
            if conn.state().is_terminal() {
                should_remove = true;
            } else if let Err(e) = self.poller.reregister_fd(conn.socket_mut(), descriptor, interest) {
                hublog_error!("failed to reregister descriptor {}: {}", descriptor, e);
            }
        }
        if should_remove { self.drop_connection(descriptor); }
    }

    fn drop_connection(&mut self, descriptor: usize) {
        if let Some(mut conn) = self.descriptors.remove(descriptor) {
            let _ = self.poller.remove_fd(conn.socket_mut());
        }
        self.registrar.purge(descriptor);
    }

    fn handle_signals(&mut self) {
        for signum in self.signal_source.pending() {
            match signals::classify(signum) {
                SignalAction::Ignore => hublog_info!("ignoring signal {}", signum),
                SignalAction::Shutdown => {
                    hublog_info!("graceful shutdown requested (signal {})", signum);
                    self.running = false;
                },
                SignalAction::ReloadConfig => {
                    hublog_info!("reloading configuration and databases");
                    self.geo.reload();
                },
                SignalAction::FatalDump => {
                    hublog_error!("fatal signal {}, exiting", signum);
                    self.running = false;
                }
            }
        }
    }

    fn run_timers(&mut self) {
        let now = Local::now().timestamp();
        let evicted = self.bans.sweep_expired(now);
        if evicted > 0 { hublog_info!("swept {} expired bans", evicted); }
        self.geo.sweep_expired(now);
    }

    /// Tears down the hub in reverse construction order: flush bots, close connections,
    /// close the databases, close the log.
    pub fn shutdown(&mut self) {
        hublog_info!("shutting down hub on {}", self.config_dir);
        let descriptors: Vec<usize> = self.descriptors.iter().map(|(d, _)| d).collect();
        for descriptor in descriptors { self.drop_connection(descriptor); }
    }
}

/// Interprets one frame decoded during `Handshaking`: `$MyNick <nick>` records the nick,
/// `$Supports <tokens...>` completes feature negotiation and promotes the connection to
/// `Normal`. Frames of any other shape, or frames arriving outside `Handshaking`, are left
/// for the lobby layer once the connection reaches `Normal`.
fn service_handshake_frame(conn: &mut Connection, frame: &[u8]) {
    if conn.state() != crate::connection::ConnectionState::Handshaking { return }
    let text = String::from_utf8_lossy(frame);
    if let Some(nick) = text.strip_prefix("$MyNick ") {
        conn.set_nick(nick.trim().to_string());
    } else if let Some(supports) = text.strip_prefix("$Supports ") {
        conn.complete_handshake(supports.trim());
    }
}

#[cfg(unix)]
fn stream_descriptor(stream: &mio::net::TcpStream) -> usize {
    use std::os::unix::io::AsRawFd;
    stream.as_raw_fd() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener as StdTcpListener;
    use mio::net::TcpStream;

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
    fn handshake_frames_set_nick_and_complete_handshake() {
        let (mut conn, _client) = accepted_pair();
        conn.begin_handshake();
        service_handshake_frame(&mut conn, b"$MyNick Alice");
        assert_eq!(conn.nick(), Some("Alice"));
        assert_eq!(conn.state(), crate::connection::ConnectionState::Handshaking);
        service_handshake_frame(&mut conn, b"$Supports TLS BotINFO");
        assert_eq!(conn.state(), crate::connection::ConnectionState::Normal);
        assert!(conn.features().has(crate::connection::Feature::TLS));
    }

    #[test]
    fn handshake_frame_ignored_outside_handshaking_state() {
        let (mut conn, _client) = accepted_pair();
        service_handshake_frame(&mut conn, b"$MyNick Bob");
        assert_eq!(conn.nick(), None);
    }
}
