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

//! Process entry point: parses arguments, resolves the configuration directory, wires up
//! logging, constructs the hub and runs it until a shutdown signal arrives.

use std::env;
use std::process::ExitCode;
use dchub::cli::{self, EXIT_OK, EXIT_STARTUP_FAILURE};
use dchub::config;
use dchub::logging::{self, Level};
use dchub::Hub;

fn main() -> ExitCode {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = match cli::parse(&argv) {
        Ok(args) => args,
        Err(e) => { eprintln!("{}", e); return ExitCode::from(EXIT_STARTUP_FAILURE as u8) }
    };

    let threshold = match args.verbosity {
        0 => Level::Warning,
        1 => Level::Info,
        _ => Level::Debug
    };
    logging::set_threshold(threshold);
    if args.syslog {
        logging::use_syslog("dchubd", args.syslog_suffix.as_deref().unwrap_or(""));
    }

    let config_dir = match config::resolve_config_dir(args.config_dir.as_deref()) {
        Ok(dir) => dir,
        Err(e) => { eprintln!("{}", e); return ExitCode::from(EXIT_STARTUP_FAILURE as u8) }
    };

    let mut hub = match Hub::new(&config_dir, &args) {
        Ok(hub) => hub,
        Err(e) => { eprintln!("{}", e); return ExitCode::from(EXIT_STARTUP_FAILURE as u8) }
    };

    let result = hub.run();
    hub.shutdown();

    match result {
        Ok(()) => ExitCode::from(EXIT_OK as u8),
        Err(e) => { eprintln!("{}", e); ExitCode::from(EXIT_STARTUP_FAILURE as u8) }
    }
}
