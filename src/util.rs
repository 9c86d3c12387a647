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

//! Small utility functions shared across modules.

#[cfg(unix)]
extern crate libc;

use regex::Regex;

/// Converts a string containing a size specification to an integer value.
/// The string must contain digits only plus an optional unit specifier character at the end.
/// Allowed unit specifier are k, m or g for Kilobyte, Megabyte or Gigabyte.
pub(crate) fn parse_size_str(size_str: &str) -> Option<usize> {
    let pattern = Regex::new(SIZE_STR_PATTERN).unwrap();
    if ! pattern.is_match(size_str) { return None }
    let mut num: usize = 0;
    for ch in size_str.chars() {
        match ch {
            '0' ..= '9' => {
                num *= 10;
                num += char::to_digit(ch, 10).unwrap() as usize;
            },
            'k' | 'K' => num *= 1024,
            'm' | 'M' => num *= 1024 * 1024,
            'g' | 'G' => num *= 1024 * 1024 * 1024,
            _ => ()
        }
    }
    Some(num)
}

/// Returns the ID of the calling OS thread, used to tag log lines.
#[cfg(unix)]
#[inline]
pub(crate) fn current_thread_id() -> u64 {
    unsafe { libc::pthread_self() as u64 }
}

const SIZE_STR_PATTERN: &str = "^[0-9]+\\s*[kKmMgG]{0,1}$";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_number() {
        assert_eq!(parse_size_str("512"), Some(512));
    }

    #[test]
    fn parses_unit_suffixes() {
        assert_eq!(parse_size_str("4k"), Some(4 * 1024));
        assert_eq!(parse_size_str("2M"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size_str("1g"), Some(1024 * 1024 * 1024));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_size_str("abc"), None);
        assert_eq!(parse_size_str("4kb"), None);
    }
}
