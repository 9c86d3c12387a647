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

//! Geo/ASN lookup: classify the address, consult the cache, fall through to the MMDB files.

pub mod cache;
pub mod classify;
pub mod mmdb;

use std::net::IpAddr;
use encoding_rs::Encoding;
use cache::{GeoCache, GeoRecord};
use classify::AddrClass;
use mmdb::GeoDatabases;

pub struct GeoLookup {
    cache: GeoCache,
    databases: GeoDatabases,
    configured_dir: String,
    max_age_secs: i64,
    conversion_depth: u8,
    target_encoding: &'static Encoding
}

impl GeoLookup {
    pub fn new(configured_dir: &str, max_age_secs: i64) -> GeoLookup {
        GeoLookup {
            cache: GeoCache::new(),
            databases: GeoDatabases::open(configured_dir),
            configured_dir: configured_dir.to_string(),
            max_age_secs,
            conversion_depth: 0,
            target_encoding: encoding_rs::UTF_8
        }
    }

    pub fn set_conversion_depth(&mut self, depth: u8) { self.conversion_depth = depth; }
    pub fn set_target_encoding(&mut self, encoding: &'static Encoding) {
        self.target_encoding = encoding;
    }

    pub fn country_code(&mut self, host: &str, now: i64) -> String {
        match classify::classify(host) {
            AddrClass::Loopback => classify::CODE_LOOPBACK.to_string(),
            AddrClass::Invalid => classify::CODE_INVALID.to_string(),
            AddrClass::Private => classify::CODE_PRIVATE.to_string(),
            AddrClass::Routable(ip) => {
                if let Some(cached) = self.cache.get(ip).filter(|r| ! r.country_code.is_empty()) {
                    return cached.country_code.clone()
                }
                match self.lookup_addr(host).and_then(|addr| self.databases.country_code(addr)) {
                    Some(code) => {
                        self.merge(ip, GeoRecord { country_code: code.clone(), ..Default::default() }, now);
                        code
                    },
                    None => classify::NOT_FOUND.to_string()
                }
            }
        }
    }

    pub fn country_name(&mut self, host: &str, now: i64) -> String {
        match classify::classify(host) {
            AddrClass::Loopback => classify::NAME_LOOPBACK.to_string(),
            AddrClass::Invalid => classify::NAME_INVALID.to_string(),
            AddrClass::Private => classify::NAME_PRIVATE.to_string(),
            AddrClass::Routable(ip) => {
                if let Some(cached) = self.cache.get(ip).filter(|r| ! r.country_name.is_empty()) {
                    return self.normalize(&cached.country_name.clone())
                }
                match self.lookup_addr(host).and_then(|addr| self.databases.country_name(addr)) {
                    Some(name) => {
                        self.merge(ip, GeoRecord { country_name: name.clone(), ..Default::default() }, now);
                        self.normalize(&name)
                    },
                    None => classify::NOT_FOUND.to_string()
                }
            }
        }
    }

    pub fn city(&mut self, host: &str, now: i64) -> String {
        match classify::classify(host) {
            AddrClass::Loopback => classify::NAME_LOOPBACK.to_string(),
            AddrClass::Invalid => classify::NAME_INVALID.to_string(),
            AddrClass::Private => classify::NAME_PRIVATE.to_string(),
            AddrClass::Routable(ip) => {
                if let Some(cached) = self.cache.get(ip).filter(|r| ! r.city.is_empty()) {
                    return self.normalize(&cached.city.clone())
                }
                match self.lookup_addr(host).and_then(|addr| self.databases.city(addr)) {
                    Some(city) => {
                        self.merge(ip, GeoRecord { city: city.clone(), ..Default::default() }, now);
                        self.normalize(&city)
                    },
                    None => classify::NOT_FOUND.to_string()
                }
            }
        }
    }

    pub fn asn(&mut self, host: &str, now: i64) -> String {
        match classify::classify(host) {
            AddrClass::Loopback => classify::CODE_LOOPBACK.to_string(),
            AddrClass::Invalid => classify::CODE_INVALID.to_string(),
            AddrClass::Private => classify::CODE_PRIVATE.to_string(),
            AddrClass::Routable(ip) => {
                if let Some(cached) = self.cache.get(ip).filter(|r| ! r.asn.is_empty()) {
                    return cached.asn.clone()
                }
                match self.lookup_addr(host).and_then(|addr| self.databases.asn(addr)) {
                    Some(asn) => {
                        self.merge(ip, GeoRecord { asn: asn.clone(), ..Default::default() }, now);
                        asn
                    },
                    None => classify::NOT_FOUND.to_string()
                }
            }
        }
    }

    fn lookup_addr(&self, host: &str) -> Option<IpAddr> { host.parse().ok() }

    fn merge(&mut self, ip: u32, fresh: GeoRecord, now: i64) { self.cache.merge(ip, &fresh, now); }

    fn normalize(&self, value: &str) -> String {
        mmdb::normalize(value, self.conversion_depth, self.target_encoding)
    }

    /// Periodic sweep driven by the hub clock.
    pub fn sweep_expired(&mut self, now: i64) -> usize {
        self.cache.sweep_expired(now, self.max_age_secs)
    }

    /// Closes and reopens all database handles, clearing the cache as part of reload.
    pub fn reload(&mut self) {
        self.databases.reload(&self.configured_dir);
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_short_circuits_before_any_database_access() {
        let mut lookup = GeoLookup::new("/nonexistent", 3600);
        assert_eq!(lookup.country_code("127.0.0.1", 1000), classify::CODE_LOOPBACK);
        assert_eq!(lookup.country_name("127.0.0.1", 1000), classify::NAME_LOOPBACK);
    }

    #[test]
    fn private_range_short_circuits() {
        let mut lookup = GeoLookup::new("/nonexistent", 3600);
        assert_eq!(lookup.country_code("192.168.1.5", 1000), classify::CODE_PRIVATE);
        assert_eq!(lookup.asn("10.0.0.1", 1000), classify::CODE_PRIVATE);
    }

    #[test]
    fn invalid_address_short_circuits() {
        let mut lookup = GeoLookup::new("/nonexistent", 3600);
        assert_eq!(lookup.country_code("garbage", 1000), classify::CODE_INVALID);
    }

    #[test]
    fn routable_address_without_database_reports_not_found() {
        let mut lookup = GeoLookup::new("/nonexistent/path/for/dchub/tests", 3600);
        assert_eq!(lookup.country_code("8.8.8.8", 1000), classify::NOT_FOUND);
        assert_eq!(lookup.asn("8.8.8.8", 1000), classify::NOT_FOUND);
    }

    #[test]
    fn reload_clears_cache() {
        let mut lookup = GeoLookup::new("/nonexistent", 3600);
        lookup.merge(1, GeoRecord { country_code: String::from("DE"), ..Default::default() }, 1000);
        lookup.reload();
        assert!(lookup.cache.is_empty());
    }
}
