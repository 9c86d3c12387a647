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

//! Process-wide log sink: a single configurable agent reached through level-filtered macros.

use std::ffi::CString;
use std::sync::{Arc, Mutex};
use chrono::Local;
use crate::util::current_thread_id;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level { Error, Warning, Info, Debug }

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG"
        }
    }
}

/// Where filtered records go.
enum Sink {
    Stderr,
    Syslog { ident: CString, suffix: String }
}

struct LogAgent {
    threshold: Level,
    sink: Sink
}

impl LogAgent {
    fn new() -> LogAgent {
        LogAgent { threshold: Level::Info, sink: Sink::Stderr }
    }

    fn write(&self, level: Level, file: &str, line: u32, msg: &str) {
        if level > self.threshold { return }
        match &self.sink {
            Sink::Stderr => {
                eprintln!("{} [{}] thread={} {}:{} {}",
                          Local::now().format("%Y-%m-%d %H:%M:%S%.3f"), level.tag(),
                          current_thread_id(), file, line, msg);
            },
            Sink::Syslog { ident: _, suffix } => {
                let formatted = format!("[{}] {}:{} {}{}", level.tag(), file, line, msg, suffix);
                write_syslog(level, &formatted);
            }
        }
    }
}

lazy_static::lazy_static! {
    static ref LOG_AGENT: Arc<Mutex<LogAgent>> = Arc::new(Mutex::new(LogAgent::new()));
}

/// Sets the minimum level that reaches the sink. Anything stricter than `level` is dropped.
pub fn set_threshold(level: Level) {
    if let Ok(mut agent) = LOG_AGENT.lock() { agent.threshold = level; }
}

/// Switches output to `syslog(3)` under the given program identity, appending `suffix`
/// (e.g. a hub instance name) to every message. Calling this again replaces the sink.
pub fn use_syslog(ident: &str, suffix: &str) {
    if let Ok(mut agent) = LOG_AGENT.lock() {
        let ident = CString::new(ident).unwrap_or_else(|_| CString::new("dchubd").unwrap());
        unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_DAEMON); }
        agent.sink = Sink::Syslog { ident, suffix: suffix.to_string() };
    }
}

#[doc(hidden)]
pub fn __write(level: Level, file: &'static str, line: u32, msg: &str) {
    if let Ok(agent) = LOG_AGENT.lock() { agent.write(level, file, line, msg); }
}

fn write_syslog(level: Level, msg: &str) {
    let priority = match level {
        Level::Error => libc::LOG_ERR,
        Level::Warning => libc::LOG_WARNING,
        Level::Info => libc::LOG_INFO,
        Level::Debug => libc::LOG_DEBUG
    };
    if let Ok(cmsg) = CString::new(msg) {
        unsafe { libc::syslog(priority, cmsg.as_ptr()); }
    }
}

#[macro_export]
macro_rules! hublog_error {
    ($($arg:tt)*) => {
        $crate::logging::__write($crate::logging::Level::Error, file!(), line!(),
                                  &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! hublog_warn {
    ($($arg:tt)*) => {
        $crate::logging::__write($crate::logging::Level::Warning, file!(), line!(),
                                  &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! hublog_info {
    ($($arg:tt)*) => {
        $crate::logging::__write($crate::logging::Level::Info, file!(), line!(),
                                  &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! hublog_debug {
    ($($arg:tt)*) => {
        $crate::logging::__write($crate::logging::Level::Debug, file!(), line!(),
                                  &format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_orders_error_strictest() {
        assert!(Level::Error < Level::Warning);
        assert!(Level::Warning < Level::Info);
        assert!(Level::Info < Level::Debug);
    }

    #[test]
    fn macros_compile_and_run_without_panicking() {
        set_threshold(Level::Debug);
        hublog_error!("bind failed on {}", "0.0.0.0:411");
        hublog_warn!("peer {} sent malformed frame", "1.2.3.4:5");
        hublog_info!("hub listening on port {}", 411);
        hublog_debug!("descriptor {} readable", 7);
        set_threshold(Level::Info);
    }
}
