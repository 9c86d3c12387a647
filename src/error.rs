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

//! Common exception type used across the hub.

use std::fmt;
use std::io;

/// Raise an exception with severity error
#[macro_export]
macro_rules! hubxe {
    ($id: expr) => {
        $crate::error::HubError::new($id, $crate::error::Severity::Error)
    };
    ($id: expr $(,$arg: expr)+) => {
        $crate::error::HubError::with_args($id, $crate::error::Severity::Error, &[$($arg),+])
    };
}

/// Raise an exception with severity warning
#[macro_export]
macro_rules! hubxw {
    ($id: expr) => {
        $crate::error::HubError::new($id, $crate::error::Severity::Warning)
    };
    ($id: expr $(,$arg: expr)+) => {
        $crate::error::HubError::with_args($id, $crate::error::Severity::Warning, &[$($arg),+])
    };
}

// General errors
pub const E_FILE_NOT_FOUND: &str = "configuration file %s not found";
pub const E_FILE_READ_ERR: &str = "failed to read file %s: %s";
pub const E_FILE_WRITE_ERR: &str = "failed to write file %s: %s";
pub const E_CFG_PARSE_FAILED: &str = "failed to parse configuration file %s: %s";
pub const E_CFG_DIR_NOT_FOUND: &str = "no configuration directory found, checked %s";
pub const E_INVALID_ADDR_PATTERN: &str = "invalid address pattern %s";
pub const E_IP4_OCTET_TOO_LARGE: &str = "IPv4 octet %s exceeds 255";
pub const E_IP_PORT_TOO_LARGE: &str = "port %s exceeds 65535";
pub const E_SOCKET_BIND_ERR: &str = "failed to bind listening socket on %s: %s";
pub const E_SOCKET_READ_ERR: &str = "failed to read from socket: %s";
pub const E_SOCKET_WRITE_ERR: &str = "failed to write to socket: %s";
pub const E_POLL_FAILED: &str = "readiness poll failed: %s";
pub const E_DESCR_TABLE_FULL: &str = "descriptor table exhausted, limit %s reached";
pub const E_DESCR_ALREADY_PRESENT: &str = "descriptor %s already present in table";
pub const E_DESCR_UNKNOWN: &str = "unknown descriptor %s";
pub const E_MSG_TOO_LARGE: &str = "frame of %s bytes exceeds limit of %s bytes";
pub const W_CONN_PROTOCOL_ERROR: &str = "protocol error from %s: %s";
pub const W_NICK_ALREADY_REGISTERED: &str = "nickname %s already registered";
pub const E_DB_OPEN_ERR: &str = "failed to open user database %s: %s";
pub const E_DB_QUERY_ERR: &str = "user database query failed: %s";
pub const W_GEO_DB_NOT_FOUND: &str = "no geo database found for %s, checked %s paths";
pub const W_GEO_LOOKUP_FAILED: &str = "geo lookup failed for %s: %s";
pub const E_INTERNAL: &str = "internal error: %s";
pub const E_INVALID_CLI_OPTION: &str = "unrecognized command line option %s";
pub const E_INVALID_CLI_PORT: &str = "invalid port number %s";
pub const E_MISSING_CLI_VALUE: &str = "option %s requires a value";

/// Exception severities
#[derive (Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARN")
        }
    }
}

/// Warning or error describing a problem found during runtime.
///
/// The message template may contain `%s` placeholders, filled in order from `args`.
#[derive (Clone, Debug)]
pub struct HubError {
    template: &'static str,
    severity: Severity,
    args: Option<Vec<String>>,
    cause: Option<Box<HubError>>
}

impl HubError {
    /// Creates an exception without arguments.
    #[inline]
    pub fn new(template: &'static str, severity: Severity) -> HubError {
        HubError { template, severity, args: None, cause: None }
    }

    /// Creates an exception with an arbitrary number of arguments.
    pub fn with_args(template: &'static str, severity: Severity, args: &[String]) -> HubError {
        let v = args.iter().map(|e| e.to_string()).collect();
        HubError { template, severity, args: Some(v), cause: None }
    }

    /// Sets the root cause for this exception.
    #[inline]
    pub fn set_cause(&mut self, cause: HubError) { self.cause = Some(Box::new(cause)); }

    /// Returns the exception severity.
    #[inline]
    pub fn severity(&self) -> Severity { self.severity }

    /// Returns the number of argument values contained in this message.
    #[inline]
    pub fn arg_count(&self) -> usize {
        self.args.as_ref().map_or(0, |a| a.len())
    }

    /// Returns the argument values, if any.
    #[inline]
    pub fn args(&self) -> &Option<Vec<String>> { &self.args }

    /// Renders the message, substituting `%s` placeholders with argument values in order.
    /// Missing arguments are rendered as an empty string, surplus arguments are ignored.
    pub fn message(&self) -> String {
        let mut res = String::with_capacity(self.template.len() + 32);
        let pars = self.args.as_deref().unwrap_or(&[]);
        let mut par_index = 0;
        let mut expect_var = false;
        for c in self.template.chars() {
            if expect_var {
                if c == 's' {
                    if let Some(p) = pars.get(par_index) { res.push_str(p); }
                    par_index += 1;
                } else {
                    if c != '%' { res.push('%'); }
                    res.push(c);
                }
                expect_var = false;
                continue;
            }
            if c == '%' {
                expect_var = true;
                continue;
            }
            res.push(c);
        }
        if let Some(cause) = &self.cause {
            res.push_str(": ");
            res.push_str(&cause.message());
        }
        res
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message())
    }
}

impl std::error::Error for HubError {}

impl From<io::Error> for HubError {
    fn from(e: io::Error) -> HubError {
        HubError::with_args(E_INTERNAL, Severity::Error, &[e.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT_P0: &str = "Something went wrong.";
    const TEXT_P1: &str = "Line %s: Something went wrong.";
    const TEXT_P3: &str = "Line %s: Found %s, but expected %s.";

    #[test]
    fn err_without_arg() {
        let x = HubError::new(TEXT_P0, Severity::Error);
        assert_eq!(x.severity(), Severity::Error);
        assert_eq!(x.arg_count(), 0);
        assert_eq!(x.message(), TEXT_P0);
    }

    #[test]
    fn err_with_one_arg() {
        let x = HubError::with_args(TEXT_P1, Severity::Error, &["123".to_string()]);
        assert_eq!(x.message(), "Line 123: Something went wrong.");
    }

    #[test]
    fn err_with_multiple_args() {
        let x = HubError::with_args(
            TEXT_P3, Severity::Error,
            &["99".to_string(), "=".to_string(), "String".to_string()]);
        assert_eq!(x.message(), "Line 99: Found =, but expected String.");
    }

    #[test]
    fn warning_severity() {
        let x = HubError::new(TEXT_P0, Severity::Warning);
        assert_eq!(x.severity(), Severity::Warning);
    }

    // Make sure superfluous arguments are simply ignored
    #[test]
    fn too_many_args() {
        let x = HubError::with_args(
            TEXT_P1, Severity::Error, &["123".to_string(), "456".to_string()]);
        assert_eq!(x.message(), "Line 123: Something went wrong.");
    }

    // Make sure placeholders without a supplied argument are replaced with an empty string
    #[test]
    fn too_few_args() {
        let x = HubError::with_args(TEXT_P3, Severity::Warning, &["99".to_string()]);
        assert_eq!(x.message(), "Line 99: Found , but expected .");
    }

    #[test]
    fn cause_is_appended() {
        let mut outer = HubError::new(TEXT_P0, Severity::Error);
        outer.set_cause(HubError::new("disk full", Severity::Error));
        assert_eq!(outer.message(), "Something went wrong.: disk full");
    }
}
