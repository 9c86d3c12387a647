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

//! Hub configuration: TOML file contents plus the directory discovery fallback chain.

use std::fs;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::error::*;
use crate::hubxe;

const CONFIG_FILE_NAME: &str = "dchub.toml";

/// Settings read from `dchub.toml`. Every field has a sensible default so a hub can start
/// with no configuration file present at all.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub port: u16,
    pub max_frame_size: usize,
    pub poll_timeout_ms: u64,
    pub geo_cache_max_age_secs: i64,
    pub whitelist: Vec<String>,
    pub users_db_path: String,
    pub geo_db_dir: String,
    /// Whether `InUserSupports` falls back to treating an unrecognized token as a decimal
    /// feature bitmask. A reproduced compatibility quirk, kept behind an explicit toggle
    /// rather than always on.
    pub compat_numeric_supports_fallback: bool
}

impl Default for HubConfig {
    fn default() -> HubConfig {
        HubConfig {
            port: 411,
            max_frame_size: 64 * 1024,
            poll_timeout_ms: 100,
            geo_cache_max_age_secs: 86400,
            whitelist: Vec::new(),
            users_db_path: String::from("dchub.sqlite"),
            geo_db_dir: String::from("."),
            compat_numeric_supports_fallback: true
        }
    }
}

impl HubConfig {
    /// Loads the configuration from `dir`/`dchub.toml`. A missing file yields defaults;
    /// a present-but-unparsable file is an error.
    pub fn load(dir: &Path) -> Result<HubConfig, HubError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if ! path.exists() { return Ok(HubConfig::default()) }
        let content = fs::read_to_string(&path)
            .map_err(|e| hubxe!(E_FILE_READ_ERR, path.display().to_string(), e.to_string()))?;
        toml::from_str(&content)
            .map_err(|e| hubxe!(E_CFG_PARSE_FAILED, path.display().to_string(), e.to_string()))
    }
}

/// Resolves the configuration directory: an explicit `-d/--config-dir` value, or the
/// first of `$HOME/.config/verlihub`, `$HOME/.verlihub`, `./.verlihub`, `$VERLIHUB_CFG`,
/// `/etc/verlihub` that exists on disk.
pub fn resolve_config_dir(explicit: Option<&str>) -> Result<PathBuf, HubError> {
    if let Some(dir) = explicit { return Ok(PathBuf::from(dir)) }
    let candidates = candidate_dirs();
    for candidate in &candidates {
        if candidate.is_dir() { return Ok(candidate.clone()) }
    }
    Err(hubxe!(E_CFG_DIR_NOT_FOUND, candidates.iter()
        .map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")))
}

fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(&home).join(".config").join("verlihub"));
        dirs.push(PathBuf::from(&home).join(".verlihub"));
    }
    dirs.push(PathBuf::from("./.verlihub"));
    if let Some(cfg) = std::env::var_os("VERLIHUB_CFG") {
        dirs.push(PathBuf::from(cfg));
    }
    dirs.push(PathBuf::from("/etc/verlihub"));
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = std::env::temp_dir().join("dchub-test-missing-cfg");
        let _ = fs::create_dir_all(&dir);
        let cfg = HubConfig::load(&dir).unwrap();
        assert_eq!(cfg.port, 411);
        assert_eq!(cfg.max_frame_size, 64 * 1024);
    }

    #[test]
    fn parses_present_file() {
        let dir = std::env::temp_dir().join("dchub-test-present-cfg");
        fs::create_dir_all(&dir).unwrap();
        let mut f = fs::File::create(dir.join(CONFIG_FILE_NAME)).unwrap();
        write!(f, "port = 7777\nwhitelist = [\"127.0.0.1:*\"]\n").unwrap();
        let cfg = HubConfig::load(&dir).unwrap();
        assert_eq!(cfg.port, 7777);
        assert_eq!(cfg.whitelist, vec![String::from("127.0.0.1:*")]);
        assert_eq!(cfg.poll_timeout_ms, 100);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join("dchub-test-bad-cfg");
        fs::create_dir_all(&dir).unwrap();
        let mut f = fs::File::create(dir.join(CONFIG_FILE_NAME)).unwrap();
        write!(f, "port = not_a_number").unwrap();
        assert!(HubConfig::load(&dir).is_err());
    }

    #[test]
    fn explicit_dir_bypasses_fallback_chain() {
        let resolved = resolve_config_dir(Some("/tmp/whatever")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/whatever"));
    }
}
