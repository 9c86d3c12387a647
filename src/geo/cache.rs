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

//! Merge-on-write cache of resolved geo/ASN fields, keyed by 32-bit IPv4 address.

use std::collections::HashMap;

/// Resolved fields for one address. Fields a particular lookup did not touch stay empty and
/// are never allowed to overwrite a previously-cached non-empty value for that field.
#[derive(Clone, Debug, Default)]
pub struct GeoRecord {
    pub country_code: String,
    pub country_name: String,
    pub city: String,
    pub asn: String,
    pub last_lookup: i64
}

impl GeoRecord {
    fn merge_from(&mut self, other: &GeoRecord, now: i64) {
        if ! other.country_code.is_empty() { self.country_code = other.country_code.clone(); }
        if ! other.country_name.is_empty() { self.country_name = other.country_name.clone(); }
        if ! other.city.is_empty() { self.city = other.city.clone(); }
        if ! other.asn.is_empty() { self.asn = other.asn.clone(); }
        self.last_lookup = now;
    }
}

#[derive(Debug, Default)]
pub struct GeoCache {
    entries: HashMap<u32, GeoRecord>
}

impl GeoCache {
    pub fn new() -> GeoCache { GeoCache { entries: HashMap::new() } }

    /// Folds a freshly resolved (possibly partial) record into the cache. Fields the new
    /// record left empty keep whatever was cached before, per the merge-on-write contract.
    pub fn merge(&mut self, ip: u32, fresh: &GeoRecord, now: i64) {
        self.entries.entry(ip).or_insert_with(GeoRecord::default).merge_from(fresh, now);
    }

    pub fn get(&self, ip: u32) -> Option<&GeoRecord> { self.entries.get(&ip) }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Drops every entry whose `last_lookup` is older than `max_age_secs`. Entries are not
    /// required to be evicted the instant they age out; this is just the periodic sweep.
    pub fn sweep_expired(&mut self, now: i64, max_age_secs: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, rec| now - rec.last_lookup <= max_age_secs);
        before - self.entries.len()
    }

    /// Drops every cached entry. Used during a database reload.
    pub fn clear(&mut self) { self.entries.clear(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_fills_empty_record() {
        let mut cache = GeoCache::new();
        let fresh = GeoRecord { country_code: String::from("DE"), ..Default::default() };
        cache.merge(1, &fresh, 100);
        assert_eq!(cache.get(1).unwrap().country_code, "DE");
        assert_eq!(cache.get(1).unwrap().asn, "");
    }

    #[test]
    fn asn_only_lookup_does_not_erase_country_name() {
        let mut cache = GeoCache::new();
        let first = GeoRecord { country_name: String::from("Germany"), ..Default::default() };
        cache.merge(1, &first, 100);
        let second = GeoRecord { asn: String::from("AS3320 Deutsche Telekom"), ..Default::default() };
        cache.merge(1, &second, 200);
        let rec = cache.get(1).unwrap();
        assert_eq!(rec.country_name, "Germany");
        assert_eq!(rec.asn, "AS3320 Deutsche Telekom");
        assert_eq!(rec.last_lookup, 200);
    }

    #[test]
    fn sweep_removes_entries_older_than_max_age() {
        let mut cache = GeoCache::new();
        cache.merge(1, &GeoRecord { country_code: String::from("DE"), ..Default::default() }, 0);
        cache.merge(2, &GeoRecord { country_code: String::from("FR"), ..Default::default() }, 900);
        assert_eq!(cache.sweep_expired(1000, 500), 1);
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn clear_empties_cache_for_reload() {
        let mut cache = GeoCache::new();
        cache.merge(1, &GeoRecord { country_code: String::from("DE"), ..Default::default() }, 0);
        cache.clear();
        assert!(cache.is_empty());
    }
}
