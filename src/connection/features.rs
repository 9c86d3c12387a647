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

//! The closed enumeration of DC feature tokens negotiated during handshake.

/// One feature flag a client may advertise support for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    OpPlus,
    NoHello,
    NoGetINFO,
    QuickList,
    BotINFO,
    ZPipe,
    ChatOnly,
    MCTo,
    UserCommand,
    BotList,
    HubTopic,
    UserIP2,
    TTHSearch,
    Feed,
    TTHS,
    IN,
    BanMsg,
    TLS,
    DHT0
}

impl Feature {
    const ALL: [Feature; 19] = [
        Feature::OpPlus, Feature::NoHello, Feature::NoGetINFO, Feature::QuickList,
        Feature::BotINFO, Feature::ZPipe, Feature::ChatOnly, Feature::MCTo,
        Feature::UserCommand, Feature::BotList, Feature::HubTopic, Feature::UserIP2,
        Feature::TTHSearch, Feature::Feed, Feature::TTHS, Feature::IN, Feature::BanMsg,
        Feature::TLS, Feature::DHT0
    ];

    fn bit(self) -> u32 { 1 << (self as u32) }

    /// Maps a textual support token to a feature flag. `ZPipe0` is an alias for `ZPipe`,
    /// the two tokens are treated as identical. `DHT0` is NOT aliased to anything
    /// further; no other token doubles up without a concrete reason to believe it should.
    fn from_token(token: &str) -> Option<Feature> {
        match token {
            "OpPlus" => Some(Feature::OpPlus),
            "NoHello" => Some(Feature::NoHello),
            "NoGetINFO" => Some(Feature::NoGetINFO),
            "QuickList" => Some(Feature::QuickList),
            "BotINFO" => Some(Feature::BotINFO),
            "ZPipe" | "ZPipe0" => Some(Feature::ZPipe),
            "ChatOnly" => Some(Feature::ChatOnly),
            "MCTo" => Some(Feature::MCTo),
            "UserCommand" => Some(Feature::UserCommand),
            "BotList" => Some(Feature::BotList),
            "HubTopic" => Some(Feature::HubTopic),
            "UserIP2" => Some(Feature::UserIP2),
            "TTHSearch" => Some(Feature::TTHSearch),
            "Feed" => Some(Feature::Feed),
            "TTHS" => Some(Feature::TTHS),
            "IN" => Some(Feature::IN),
            "BanMsg" => Some(Feature::BanMsg),
            "TLS" => Some(Feature::TLS),
            "DHT0" => Some(Feature::DHT0),
            _ => None
        }
    }
}

/// Bitset of negotiated feature flags, stored on the connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureSet(u32);

impl FeatureSet {
    pub fn empty() -> FeatureSet { FeatureSet(0) }

    pub fn set(&mut self, f: Feature) { self.0 |= f.bit(); }

    pub fn has(&self, f: Feature) -> bool { self.0 & f.bit() != 0 }

    /// Parses a whitespace-separated support-token list as sent in a `$Supports` line.
    /// Unknown tokens are simply ignored here; the decimal-bitmask fallback lives in
    /// `InUserSupports`, since it is a query-time compatibility quirk, not a parse rule.
    pub fn from_tokens(tokens: &str) -> FeatureSet {
        let mut set = FeatureSet::empty();
        for tok in tokens.split_whitespace() {
            if let Some(f) = Feature::from_token(tok) { set.set(f); }
        }
        set
    }

    /// Evaluates an `InUserSupports(nick, flag)` query against this bitset.
    ///
    /// A named token resolves normally. A token that does not name a known feature falls
    /// back to being parsed as a decimal bitmask; the query is true iff that bitmask
    /// intersects the connection's feature bits. This fallback is a reproduced
    /// compatibility quirk and only applies when `allow_numeric_fallback` is set.
    pub fn supports(&self, token: &str, allow_numeric_fallback: bool) -> bool {
        if let Some(f) = Feature::from_token(token) { return self.has(f) }
        if allow_numeric_fallback {
            if let Ok(mask) = token.parse::<u32>() { return self.0 & mask != 0 }
        }
        false
    }
}
