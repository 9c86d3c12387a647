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

//! Command-line argument parsing. One positional port, a handful of flags, exit codes.

use crate::error::*;
use crate::hubxe;

pub const EXIT_OK: i32 = 0;
pub const EXIT_STARTUP_FAILURE: i32 = 3;

#[derive(Clone, Debug, Default)]
pub struct Args {
    pub port: Option<u16>,
    pub syslog: bool,
    pub syslog_suffix: Option<String>,
    pub config_dir: Option<String>,
    pub verbosity: u32
}

/// Parses the process argument vector (without the program name).
pub fn parse(argv: &[String]) -> Result<Args, HubError> {
    let mut args = Args::default();
    let mut i = 0;
    while i < argv.len() {
        let arg = argv[i].as_str();
        match arg {
            "-S" | "--syslog" => args.syslog = true,
            "-s" | "--syslog-suffix" => {
                i += 1;
                args.syslog_suffix = Some(require_value(argv, i, arg)?);
            },
            "-d" | "--config-dir" => {
                i += 1;
                args.config_dir = Some(require_value(argv, i, arg)?);
            },
            "-v" | "--verbose" => args.verbosity += 1,
            _ if arg.starts_with('-') => return Err(hubxe!(E_INVALID_CLI_OPTION, arg.to_string())),
            _ => {
                let port: u16 = arg.parse()
                    .map_err(|_| hubxe!(E_INVALID_CLI_PORT, arg.to_string()))?;
                args.port = Some(port);
            }
        }
        i += 1;
    }
    Ok(args)
}

fn require_value(argv: &[String], idx: usize, option: &str) -> Result<String, HubError> {
    argv.get(idx).cloned().ok_or_else(|| hubxe!(E_MISSING_CLI_VALUE, option.to_string()))
}

/// Maps a raw OS signal number to the exit code a fatal signal should produce (128+signum).
pub fn exit_code_for_signal(signum: i32) -> i32 { 128 + signum }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_port() {
        let args = parse(&[String::from("7777")]).unwrap();
        assert_eq!(args.port, Some(7777));
    }

    #[test]
    fn parses_flags_and_values() {
        let argv: Vec<String> = vec!["-S", "-s", "myhub", "-d", "/etc/dchub", "-v", "-v", "411"]
            .into_iter().map(String::from).collect();
        let args = parse(&argv).unwrap();
        assert!(args.syslog);
        assert_eq!(args.syslog_suffix.as_deref(), Some("myhub"));
        assert_eq!(args.config_dir.as_deref(), Some("/etc/dchub"));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.port, Some(411));
    }

    #[test]
    fn rejects_unknown_option() {
        let argv: Vec<String> = vec![String::from("--bogus")];
        assert!(parse(&argv).is_err());
    }

    #[test]
    fn rejects_non_numeric_port() {
        let argv: Vec<String> = vec![String::from("not-a-port")];
        assert!(parse(&argv).is_err());
    }

    #[test]
    fn missing_value_for_option_is_an_error() {
        let argv: Vec<String> = vec![String::from("-d")];
        assert!(parse(&argv).is_err());
    }

    #[test]
    fn exit_code_adds_128_to_signal_number() {
        assert_eq!(exit_code_for_signal(11), 139);
    }
}
