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

//! MaxMind DB file discovery, opening and text normalization.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use encoding_rs::Encoding;
use maxminddb::{geoip2, Reader};
use unicode_normalization::UnicodeNormalization;
use crate::hublog_warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbKind { Country, City, Asn }

impl DbKind {
    fn file_stem(self) -> &'static str {
        match self {
            DbKind::Country => "Country",
            DbKind::City => "City",
            DbKind::Asn => "ASN"
        }
    }
}

/// Builds the ordered candidate path list for one database kind: the configured directory
/// first (GeoIP2 then GeoLite2 naming), then the well-known system locations, then the
/// current directory, each tried in both namings before moving to the next location.
pub fn fallback_paths(configured_dir: &str, kind: DbKind) -> Vec<PathBuf> {
    let stem = kind.file_stem();
    let geoip2_name = format!("GeoIP2-{}.mmdb", stem);
    let geolite2_name = format!("GeoLite2-{}.mmdb", stem);
    vec![
        Path::new(configured_dir).join(&geoip2_name),
        Path::new(configured_dir).join(&geolite2_name),
        Path::new("/usr/share/GeoIP").join(&geoip2_name),
        Path::new("/usr/local/share/GeoIP").join(&geoip2_name),
        Path::new(".").join(&geoip2_name),
        Path::new("/usr/share/GeoIP").join(&geolite2_name),
        Path::new("/usr/local/share/GeoIP").join(&geolite2_name),
        Path::new(".").join(&geolite2_name)
    ]
}

fn open_first_existing(paths: &[PathBuf]) -> Option<Reader<Vec<u8>>> {
    paths.iter().find(|p| p.exists()).and_then(|p| Reader::open_readfile(p).ok())
}

/// The three open database handles. Any of them may be absent, in which case lookups
/// against that kind simply report not-found.
#[derive(Default)]
pub struct GeoDatabases {
    country: Option<Reader<Vec<u8>>>,
    city: Option<Reader<Vec<u8>>>,
    asn: Option<Reader<Vec<u8>>>
}

impl GeoDatabases {
    /// Opens whatever database files can be found under `configured_dir`'s fallback chain.
    /// A missing database is logged as a warning, not an error — the hub still runs.
    pub fn open(configured_dir: &str) -> GeoDatabases {
        let mut dbs = GeoDatabases::default();
        dbs.country = open_first_existing(&fallback_paths(configured_dir, DbKind::Country));
        dbs.city = open_first_existing(&fallback_paths(configured_dir, DbKind::City));
        dbs.asn = open_first_existing(&fallback_paths(configured_dir, DbKind::Asn));
        if dbs.country.is_none() {
            hublog_warn!("no country geo database found under {}", configured_dir);
        }
        if dbs.city.is_none() {
            hublog_warn!("no city geo database found under {}", configured_dir);
        }
        if dbs.asn.is_none() {
            hublog_warn!("no ASN database found under {}", configured_dir);
        }
        dbs
    }

    /// Closes and reopens all three handles via the fallback chain. The caller is
    /// responsible for clearing the cache that sits in front of these databases.
    pub fn reload(&mut self, configured_dir: &str) { *self = GeoDatabases::open(configured_dir); }

    pub fn country_code(&self, ip: IpAddr) -> Option<String> {
        self.country.as_ref()
            .and_then(|db| db.lookup::<geoip2::Country>(ip).ok())
            .and_then(|c| c.country)
            .and_then(|c| c.iso_code)
            .map(str::to_string)
    }

    pub fn country_name(&self, ip: IpAddr) -> Option<String> {
        self.country.as_ref()
            .and_then(|db| db.lookup::<geoip2::Country>(ip).ok())
            .and_then(|c| c.country)
            .and_then(|c| c.names)
            .and_then(|n| n.get("en").copied())
            .map(str::to_string)
    }

    pub fn city(&self, ip: IpAddr) -> Option<String> {
        self.city.as_ref()
            .and_then(|db| db.lookup::<geoip2::City>(ip).ok())
            .and_then(|c| c.city)
            .and_then(|c| c.names)
            .and_then(|n| n.get("en").copied())
            .map(str::to_string)
    }

    pub fn asn(&self, ip: IpAddr) -> Option<String> {
        self.asn.as_ref()
            .and_then(|db| db.lookup::<geoip2::Asn>(ip).ok())
            .map(|a| {
                let number = a.autonomous_system_number.unwrap_or(0);
                let org = a.autonomous_system_organization.unwrap_or("");
                format!("AS{} {}", number, org).trim_end().to_string()
            })
    }
}

/// Applies the configured text conversion depth to a database string. Depth 0 passes the
/// value through unchanged. Depth 1 transcodes to `target`. Depth 2 first strips combining
/// marks after NFD decomposition and recomposes to NFC, then transcodes.
pub fn normalize(value: &str, depth: u8, target: &'static Encoding) -> String {
    match depth {
        0 => value.to_string(),
        1 => transcode(value, target),
        _ => {
            let stripped: String = value.nfd().filter(|c| ! is_combining_mark(*c)).collect();
            let recomposed: String = stripped.nfc().collect();
            transcode(&recomposed, target)
        }
    }
}

fn transcode(value: &str, target: &'static Encoding) -> String {
    let (bytes, _, _) = target.encode(value);
    let (decoded, _, _) = target.decode(&bytes);
    decoded.into_owned()
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300 ..= 0x036F | 0x1AB0 ..= 0x1AFF | 0x1DC0 ..= 0x1DFF | 0x20D0 ..= 0x20FF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_paths_has_eight_candidates_in_order() {
        let paths = fallback_paths("/etc/dchub", DbKind::City);
        assert_eq!(paths.len(), 8);
        assert_eq!(paths[0], PathBuf::from("/etc/dchub/GeoIP2-City.mmdb"));
        assert_eq!(paths[1], PathBuf::from("/etc/dchub/GeoLite2-City.mmdb"));
        assert_eq!(paths[7], PathBuf::from("./GeoLite2-City.mmdb"));
    }

    #[test]
    fn depth_zero_passes_through_unchanged() {
        assert_eq!(normalize("Köln", 0, encoding_rs::UTF_8), "Köln");
    }

    #[test]
    fn depth_two_strips_combining_marks() {
        let composed = "Ko\u{0308}ln";
        let result = normalize(composed, 2, encoding_rs::UTF_8);
        assert_eq!(result, "Koln");
    }

    #[test]
    fn open_with_no_files_present_yields_all_none_databases() {
        let dbs = GeoDatabases::open("/nonexistent/path/for/dchub/tests");
        assert!(dbs.country.is_none());
        assert!(dbs.city.is_none());
        assert!(dbs.asn.is_none());
    }
}
