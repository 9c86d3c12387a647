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

//! IP address pattern matching, used both for the operator whitelist and for bans.

use core::str::FromStr;
use regex::Regex;
use crate::error::*;
use crate::hubxe;
use std::net::SocketAddr;

/// Whitelist of client addresses always allowed to connect, regardless of ban entries.
#[derive(Clone, Debug, Default)]
pub struct AddressWhitelist(Vec<SocketAddrPattern>);
impl AddressWhitelist {
    /// Creates a whitelist from the given address patterns. Patterns that fail to parse
    /// are silently skipped; the config loader validates them up front.
    pub fn from_patterns(patterns: &[String]) -> AddressWhitelist {
        let mut wl = AddressWhitelist(Vec::new());
        for p in patterns {
            if let Ok(pat) = p.parse() { wl.0.push(pat); }
        }
        wl
    }

    /// Indicates whether the whitelist permits a client using the given address.
    pub fn allows(&self, addr: &SocketAddr) -> bool {
        self.0.iter().any(|p| p.matches(addr))
    }
}

/// A single ban entry: an address pattern plus metadata about who imposed it, for how long.
#[derive(Clone, Debug)]
pub struct BanEntry {
    pattern: SocketAddrPattern,
    reason: String,
    set_by: String,
    expires_at: i64
}
impl BanEntry {
    pub fn new(pattern: &str, reason: &str, set_by: &str, expires_at: i64)
        -> Result<BanEntry, HubError> {
        Ok(BanEntry {
            pattern: pattern.parse()?,
            reason: reason.to_string(),
            set_by: set_by.to_string(),
            expires_at
        })
    }

    pub fn reason(&self) -> &str { &self.reason }
    pub fn set_by(&self) -> &str { &self.set_by }
    pub fn expires_at(&self) -> i64 { self.expires_at }

    /// A ban with `expires_at == 0` never expires.
    fn is_active(&self, now: i64) -> bool {
        self.expires_at == 0 || self.expires_at > now
    }
}

/// List of currently effective IP bans, checked on accept and on registration.
#[derive(Clone, Debug, Default)]
pub struct BanList(Vec<BanEntry>);
impl BanList {
    pub fn new() -> BanList { BanList(Vec::new()) }

    pub fn add(&mut self, entry: BanEntry) { self.0.push(entry); }

    pub fn remove(&mut self, pattern: &str) {
        self.0.retain(|e| e.pattern.source() != pattern);
    }

    /// Returns the reason for the first active ban matching `addr`, if any.
    pub fn ban_reason(&self, addr: &SocketAddr, now: i64) -> Option<&str> {
        self.0.iter()
            .find(|e| e.is_active(now) && e.pattern.matches(addr))
            .map(|e| e.reason.as_str())
    }

    /// Drops expired entries, returning how many were removed.
    pub fn sweep_expired(&mut self, now: i64) -> usize {
        let before = self.0.len();
        self.0.retain(|e| e.is_active(now));
        before - self.0.len()
    }
}

/// Descriptor structure for fast matching of socket addresses against an allowed pattern.
#[derive(Clone, Debug)]
struct SocketAddrPattern {
    source: String,
    // indicators for every part of the address, false means wildcard, i.e. segment can be ignored
    segment_flags: [bool; 8],
    // specific value for every part of the address
    segment_patterns: [u16; 8],
    // required port number with 0 acting as wildcard
    port: u16
}
impl SocketAddrPattern {
    fn source(&self) -> &str { &self.source }

    /// Indicates whether the specified socket address matches the pattern.
    /// For IPv4 addresses, each octet is compared against this descriptor's value,
    /// unless the octet has been marked as any value accepted.
    /// For IPv6 addresses, each 16-bit segment is compared against this descriptor's value,
    /// unless the segment has been marked as any value accepted.
    fn matches(&self, addr: &SocketAddr) -> bool {
        match addr {
            SocketAddr::V4(addr4) => {
                let octets = addr4.ip().octets();
                for i in 0 .. 4  {
                    if self.segment_flags[i] && octets[i] != self.segment_patterns[i] as u8 {
                        return false
                    }
                }
            },
            SocketAddr::V6(addr6) => {
                let segments = addr6.ip().segments();
                for i in 0 .. 8  {
                    if self.segment_flags[i] && segments[i] != self.segment_patterns[i] {
                        return false
                    }
                }
            }
        }
        self.port == 0 || self.port == addr.port()
    }
}
impl FromStr for SocketAddrPattern {
    type Err = HubError;

    /// Parses a socket address descriptor from the specified string.
    ///
    /// IPv4 patterns allowed:
    ///
    ///  `*` - any address and port allowed
    ///  `*:*` - any address and port allowed
    ///  `*:0` - any address and port allowed
    ///  `n.n.n.n` - each octet must match given number unless n is '*', any port allowed
    ///  `n.n.n.n:p` - each octet must match given number unless n is '*',
    ///                port match given port number unless p is '*' or '0'
    ///
    /// IPv6 patterns allowed:
    ///
    ///  `[*]` - any address and port allowed
    ///  `[*]:*` - any address and port allowed
    ///  `[*]:0` - any address and port allowed
    ///  `[n:n:n:n:n:n:n:n]` - each segment must match given number unless n is '*' or '',
    ///                        any port allowed. Segment numbers must be specified in hexadecimal.
    ///  `[n:n:n:n:n:n:n:n]:p` - each segment must match given number unless n is '*' or '',
    ///                          port must match given port number unless p is '*' or '0'.
    ///                          Segment numbers must be specified in hexadecimal, port decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segment_flags: [bool; 8] = [false; 8];
        let mut segment_patterns: [u16; 8] = [0; 8];
        let mut port: u16 = 0;
        let source = s.to_string();

        // any IP address and port
        if s == IP4_ADDR_ANY || s == IP4_ADDR_ANY_PORT_ANY || s == IP4_ADDR_ANY_PORT_0 ||
           s == IP6_ADDR_ANY || s == IP6_ADDR_ANY_PORT_ANY || s == IP6_ADDR_ANY_PORT_0 {
            return Ok(SocketAddrPattern { source, segment_flags, segment_patterns, port })
        }

        // IP4 address with optional port
        let p = Regex::new(IP4_ADDR_PATTERN).unwrap();
        if let Some(caps) = p.captures(s) {
            for i in 1 ..= 4 {
                let octet = caps.get(i).unwrap().as_str();
                if octet != "*" {
                    segment_flags[i-1] = true;
                    match u8::from_str_radix(octet, 10) {
                        Ok(num) => segment_patterns[i-1] = num as u16,
                        Err(_) => return Err(hubxe!(E_IP4_OCTET_TOO_LARGE, octet.to_string()))
                    }
                }
            }
            if let Some(octet) = caps.get(6) {
                let octet = octet.as_str();
                if octet != "*" {
                    match u16::from_str_radix(octet, 10) {
                        Ok(num) => port = num,
                        Err(_) => return Err(hubxe!(E_IP_PORT_TOO_LARGE, octet.to_string()))
                    }
                }
            }
            return Ok(SocketAddrPattern { source, segment_flags, segment_patterns, port })
        }

        // IP6 address with optional port
        let p = Regex::new(IP6_ADDR_PATTERN).unwrap();
        if let Some(caps) = p.captures(s) {
            for i in 1 ..= 8 {
                let segment = caps.get(i).unwrap().as_str();
                if ! segment.is_empty() && segment != "*" {
                    segment_flags[i-1] = true;
                    segment_patterns[i-1] = u16::from_str_radix(segment, 16).unwrap();
                }
            }
            if let Some(segment) = caps.get(10) {
                let segment = segment.as_str();
                if ! segment.is_empty() && segment != "*" {
                    match u16::from_str_radix(segment, 10) {
                        Ok(num) => port = num,
                        Err(_) => return Err(hubxe!(E_IP_PORT_TOO_LARGE, segment.to_string()))
                    }
                }
            }
            return Ok(SocketAddrPattern { source, segment_flags, segment_patterns, port })
        }
        Err(hubxe!(E_INVALID_ADDR_PATTERN, s.to_string()))
    }
}

const IP4_ADDR_ANY: &str = "*";
const IP4_ADDR_ANY_PORT_ANY: &str = "*:*";
const IP4_ADDR_ANY_PORT_0: &str = "*:0";
const IP6_ADDR_ANY: &str = "[*]";
const IP6_ADDR_ANY_PORT_ANY: &str = "[*]:*";
const IP6_ADDR_ANY_PORT_0: &str = "[*]:0";

const IP4_ADDR_PATTERN: &str = r"^(\*|[\d]{1,3})\.(\*|[\d]{1,3})\.(\*|[\d]{1,3})\.(\*|[\d]{1,3})(:(\*|[\d]{1,5})){0,1}$";
const IP6_ADDR_PATTERN: &str = r"^\[(\*|[\da-fA-F]{0,4}):(\*|[\da-fA-F]{0,4}):(\*|[\da-fA-F]{0,4}):(\*|[\da-fA-F]{0,4}):(\*|[\da-fA-F]{0,4}):(\*|[\da-fA-F]{0,4}):(\*|[\da-fA-F]{0,4}):(\*|[\da-fA-F]{0,4})\](:(\*|[\d]{1,5})){0,1}$";

#[cfg(test)]
mod test {
    use super::*;
    use std::net::SocketAddr;

    const FLAGS_ALL_FALSE: [bool; 8] = [false; 8];
    const FLAGS_ALL_TRUE: [bool; 8] = [true; 8];
    const FLAGS_7T: [bool; 8] = [true,true,true,true,true,true,true,false];
    const FLAGS_4T: [bool; 8] = [true,true,true,true,false,false,false,false];
    const FLAGS_3T: [bool; 8] = [true,true,true,false,false,false,false,false];
    const VALUES_ALL_0: [u16; 8] = [0; 8];
    const VALUES_IP4_LOOPBACK: [u16; 8] = [127, 0, 0, 1, 0, 0, 0, 0];
    const VALUES_IP6_LOOPBACK: [u16; 8] = [0, 0, 0, 0, 0, 0, 0, 1];
    const VALUES_192_168_2_X: [u16; 8] = [192, 168, 2, 0, 0, 0, 0, 0];
    const VALUES_DEAD_BEEF_X: [u16; 8] = [1, 0xab, 0xcd, 0xffff, 0, 0xdead, 0xbeef, 0];

    #[test]
    fn whitelist_allows_matching_addr() {
        let ip4_addr1: SocketAddr = "127.0.0.1:1111".parse().unwrap();
        let ip4_addr2: SocketAddr = "192.168.203.88:7654".parse().unwrap();
        let ip4_addr3: SocketAddr = "192.168.203.88:6000".parse().unwrap();
        let ip4_addr4: SocketAddr = "192.168.203.99:7654".parse().unwrap();
        let patterns = vec![String::from("127.0.0.1:*"), String::from("192.168.203.88:7654")];
        let wl = AddressWhitelist::from_patterns(&patterns);
        assert!(wl.allows(&ip4_addr1));
        assert!(wl.allows(&ip4_addr2));
        assert!(! wl.allows(&ip4_addr3));
        assert!(! wl.allows(&ip4_addr4));
    }

    #[test]
    fn ban_list_reports_reason_and_expires() {
        let mut bans = BanList::new();
        bans.add(BanEntry::new("192.168.1.*:*", "spam", "op1", 0).unwrap());
        bans.add(BanEntry::new("10.0.0.1:*", "flood", "op2", 100).unwrap());
        let banned: SocketAddr = "192.168.1.5:4000".parse().unwrap();
        let expired: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let clean: SocketAddr = "8.8.8.8:4000".parse().unwrap();
        assert_eq!(bans.ban_reason(&banned, 50), Some("spam"));
        assert_eq!(bans.ban_reason(&expired, 50), Some("flood"));
        assert_eq!(bans.ban_reason(&expired, 150), None);
        assert_eq!(bans.ban_reason(&clean, 50), None);
    }

    #[test]
    fn sweep_expired_removes_stale_entries() {
        let mut bans = BanList::new();
        bans.add(BanEntry::new("10.0.0.1:*", "flood", "op2", 100).unwrap());
        bans.add(BanEntry::new("10.0.0.2:*", "flood", "op2", 0).unwrap());
        assert_eq!(bans.sweep_expired(150), 1);
        assert_eq!(bans.0.len(), 1);
    }

    #[test]
    fn test_socket_addr_pattern_creation() {
        // IPv4, valid
        validate_pattern_creation("*", true, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);
        validate_pattern_creation("*:*", true, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);
        validate_pattern_creation("*:0", true, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);
        validate_pattern_creation("127.0.0.1:4000", true, &FLAGS_4T, &VALUES_IP4_LOOPBACK, 4000);
        validate_pattern_creation("192.168.2.*:8888", true, &FLAGS_3T, &VALUES_192_168_2_X, 8888);
        // IPv4, segment too large
        validate_pattern_creation("127.999.0.1", false, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);
        // IPv4, port too large
        validate_pattern_creation("127.0.0.1:72345", false, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);
        // IPv4, invalid segment char
        validate_pattern_creation("127.0.0.aa:0", false, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);

        // IPv6, valid
        validate_pattern_creation("[*]", true, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);
        validate_pattern_creation("[0:0:0:0:0:0:0:1]:3333", true, &FLAGS_ALL_TRUE,
                                  &VALUES_IP6_LOOPBACK, 3333);
        validate_pattern_creation("[1:ab:cd:ffff:0:DEAD:BEEF:*]:1234", true, &FLAGS_7T,
                                  &VALUES_DEAD_BEEF_X, 1234);
        // IPv6, addr missing
        validate_pattern_creation("[]", false, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);
        // IPv6, port too large
        validate_pattern_creation("[*]:99999", false, &FLAGS_ALL_FALSE, &VALUES_ALL_0, 0);
    }

    #[test]
    fn test_socket_addr_pattern_match() {
        let ip4_addr1: SocketAddr = "127.0.0.1:1111".parse().unwrap();
        let ip4_addr2: SocketAddr = "192.168.203.99:6000".parse().unwrap();
        let ip4_addr3: SocketAddr = "192.168.203.199:6000".parse().unwrap();
        let ip4_addrs = [&ip4_addr1, &ip4_addr2, &ip4_addr3];
        let ip4_pat1 = "127.0.0.1:*".parse::<SocketAddrPattern>().unwrap();
        let ip4_pat4 = "192.168.203.*:*".parse::<SocketAddrPattern>().unwrap();
        let ip4_pat6 = "192.168.203.*:7000".parse::<SocketAddrPattern>().unwrap();

        validate_pattern_match(&ip4_pat1, &ip4_addrs, &[true,false,false]);
        validate_pattern_match(&ip4_pat4, &ip4_addrs, &[false,true,true]);
        validate_pattern_match(&ip4_pat6, &ip4_addrs, &[false,false,false]);
    }

    fn validate_pattern_creation(p: &str,
                                 ok_expected: bool,
                                 seg_flags: &[bool],
                                 seg_values: &[u16],
                                 port: u16) {
        let addr_pattern = p.parse::<SocketAddrPattern>();
        assert_eq!(ok_expected, addr_pattern.is_ok());
        if let Ok(pattern) = addr_pattern {
            for i in 0 .. 8 {
                assert_eq!(seg_flags[i], pattern.segment_flags[i]);
                assert_eq!(seg_values[i], pattern.segment_patterns[i]);
            }
            assert_eq!(port, pattern.port);
        }
    }

    fn validate_pattern_match(pattern: &SocketAddrPattern,
                              addrs: &[&SocketAddr],
                              expected_results: &[bool]) {
        for (i, a) in addrs.iter().enumerate() {
            assert_eq!(expected_results[i], pattern.matches(a));
        }
    }
}
