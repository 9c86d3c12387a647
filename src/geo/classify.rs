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

//! Peer address classification, the gate every geo/ASN lookup passes through first.

use std::net::Ipv4Addr;

pub const CODE_LOOPBACK: &str = "L1";
pub const CODE_PRIVATE: &str = "P1";
pub const CODE_INVALID: &str = "E1";
pub const NOT_FOUND: &str = "--";

pub const NAME_LOOPBACK: &str = "Local Network";
pub const NAME_PRIVATE: &str = "Private Network";
pub const NAME_INVALID: &str = "Invalid IP";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddrClass {
    Loopback,
    Invalid,
    Private,
    /// Routable address, carried as its 32-bit representation for the cache key.
    Routable(u32)
}

/// Classifies a textual host address in the order the lookup contract requires: loopback
/// prefix first, then parseable-as-32-bit-integer, then the private ranges, anything else
/// is routable and goes on to cache/database lookup.
pub fn classify(host: &str) -> AddrClass {
    if host.starts_with("127.") { return AddrClass::Loopback }
    let ip: Ipv4Addr = match host.parse() {
        Ok(ip) => ip,
        Err(_) => return AddrClass::Invalid
    };
    let as_u32 = u32::from(ip);
    if as_u32 == 0 { return AddrClass::Invalid }
    if is_private(ip) { return AddrClass::Private }
    AddrClass::Routable(as_u32)
}

fn is_private(ip: Ipv4Addr) -> bool {
    let o = ip.octets();
    o[0] == 10 || (o[0] == 172 && (16 ..= 31).contains(&o[1])) || (o[0] == 192 && o[1] == 168)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_prefix_takes_priority() {
        assert_eq!(classify("127.0.0.1"), AddrClass::Loopback);
        assert_eq!(classify("127.255.255.255"), AddrClass::Loopback);
    }

    #[test]
    fn unparsable_host_is_invalid() {
        assert_eq!(classify("not-an-ip"), AddrClass::Invalid);
        assert_eq!(classify("300.1.1.1"), AddrClass::Invalid);
    }

    #[test]
    fn zero_address_is_invalid() {
        assert_eq!(classify("0.0.0.0"), AddrClass::Invalid);
    }

    #[test]
    fn private_ranges_are_recognized() {
        assert_eq!(classify("10.1.2.3"), AddrClass::Private);
        assert_eq!(classify("172.16.0.1"), AddrClass::Private);
        assert_eq!(classify("172.31.255.255"), AddrClass::Private);
        assert_eq!(classify("172.32.0.1") != AddrClass::Private, true);
        assert_eq!(classify("192.168.1.1"), AddrClass::Private);
    }

    #[test]
    fn public_address_is_routable() {
        assert_eq!(classify("8.8.8.8"), AddrClass::Routable(u32::from(Ipv4Addr::new(8, 8, 8, 8))));
    }
}
