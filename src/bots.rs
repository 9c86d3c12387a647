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

//! Bots: synthetic users with no underlying Connection, sharing the user-list namespace.

use std::collections::HashMap;
use crate::error::*;
use crate::hubxe;
use crate::users::fold_nick;

/// Where bot registration events go. A higher layer (the lobby) implements this to fan
/// the records out to connected clients; the registry itself has no knowledge of who is
/// listening.
pub trait BotSink {
    fn broadcast_myinfo(&mut self, line: &str);
    fn broadcast_removal(&mut self, nick: &str);
    fn refresh_operator_list(&mut self);
}

/// A synthetic user: no descriptor, no Connection, just a MyINFO record the hub maintains
/// on its behalf.
#[derive(Clone, Debug, PartialEq)]
pub struct Bot {
    pub nick: String,
    pub description: String,
    pub speed: String,
    pub email: String,
    pub share_size: u64,
    pub class: i64
}

impl Bot {
    pub fn new(nick: &str, description: &str, speed: &str, email: &str, share_size: u64,
               class: i64) -> Bot {
        Bot {
            nick: nick.to_string(), description: description.to_string(),
            speed: speed.to_string(), email: email.to_string(), share_size, class
        }
    }

    pub fn is_operator(&self) -> bool { self.class >= 3 }

    /// Builds the MyINFO frame body (without the trailing sentinel, which framing adds).
    pub fn my_info_line(&self) -> String {
        format!("$MyINFO $ALL {} {}$ ${}\u{1}$ {}${}$", self.nick, self.description,
                self.speed, self.email, self.share_size)
    }
}

#[derive(Default)]
pub struct BotRegistry {
    bots: HashMap<String, Bot>
}

impl BotRegistry {
    pub fn new() -> BotRegistry { BotRegistry { bots: HashMap::new() } }

    pub fn get(&self, nick: &str) -> Option<&Bot> { self.bots.get(&fold_nick(nick)) }

    /// Registers a new bot, broadcasting its MyINFO and, for class >= 3, an operator-list
    /// refresh. Fails if the nick is already taken, by a bot or otherwise.
    pub fn register(&mut self, bot: Bot, sink: &mut dyn BotSink) -> Result<(), HubError> {
        let key = fold_nick(&bot.nick);
        if self.bots.contains_key(&key) {
            return Err(hubxe!(W_NICK_ALREADY_REGISTERED, bot.nick.clone()))
        }
        sink.broadcast_myinfo(&bot.my_info_line());
        if bot.is_operator() { sink.refresh_operator_list(); }
        self.bots.insert(key, bot);
        Ok(())
    }

    /// Republishes a bot's MyINFO (and operator list, if it is or was class >= 3).
    pub fn edit(&mut self, nick: &str, updated: Bot, sink: &mut dyn BotSink)
        -> Result<(), HubError> {
        let key = fold_nick(nick);
        let previously_operator = self.bots.get(&key)
            .ok_or_else(|| hubxe!(E_DESCR_UNKNOWN, nick.to_string()))?
            .is_operator();
        sink.broadcast_myinfo(&updated.my_info_line());
        if updated.is_operator() || previously_operator { sink.refresh_operator_list(); }
        self.bots.insert(key, updated);
        Ok(())
    }

    /// Unregisters a bot, broadcasting its removal.
    pub fn unregister(&mut self, nick: &str, sink: &mut dyn BotSink) -> Result<(), HubError> {
        let key = fold_nick(nick);
        if self.bots.remove(&key).is_none() {
            return Err(hubxe!(E_DESCR_UNKNOWN, nick.to_string()))
        }
        sink.broadcast_removal(nick);
        Ok(())
    }

    pub fn len(&self) -> usize { self.bots.len() }
    pub fn is_empty(&self) -> bool { self.bots.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        myinfo_lines: Vec<String>,
        removals: Vec<String>,
        operator_refreshes: u32
    }
    impl BotSink for RecordingSink {
        fn broadcast_myinfo(&mut self, line: &str) { self.myinfo_lines.push(line.to_string()); }
        fn broadcast_removal(&mut self, nick: &str) { self.removals.push(nick.to_string()); }
        fn refresh_operator_list(&mut self) { self.operator_refreshes += 1; }
    }

    #[test]
    fn registering_plain_bot_broadcasts_myinfo_only() {
        let mut registry = BotRegistry::new();
        let mut sink = RecordingSink::default();
        registry.register(Bot::new("HubBot", "hub helper", "DSL", "", 0, 0), &mut sink).unwrap();
        assert_eq!(sink.myinfo_lines.len(), 1);
        assert_eq!(sink.operator_refreshes, 0);
    }

    #[test]
    fn registering_operator_bot_also_refreshes_operator_list() {
        let mut registry = BotRegistry::new();
        let mut sink = RecordingSink::default();
        registry.register(Bot::new("OpBot", "watcher", "LAN", "", 0, 3), &mut sink).unwrap();
        assert_eq!(sink.operator_refreshes, 1);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = BotRegistry::new();
        let mut sink = RecordingSink::default();
        registry.register(Bot::new("HubBot", "d", "s", "e", 0, 0), &mut sink).unwrap();
        assert!(registry.register(Bot::new("hubbot", "d2", "s", "e", 0, 0), &mut sink).is_err());
    }

    #[test]
    fn edit_republishes_myinfo() {
        let mut registry = BotRegistry::new();
        let mut sink = RecordingSink::default();
        registry.register(Bot::new("HubBot", "d", "s", "e", 0, 0), &mut sink).unwrap();
        registry.edit("hubbot", Bot::new("HubBot", "d2", "s", "e", 0, 0), &mut sink).unwrap();
        assert_eq!(sink.myinfo_lines.len(), 2);
        assert_eq!(sink.operator_refreshes, 0);
    }

    #[test]
    fn unregister_broadcasts_removal() {
        let mut registry = BotRegistry::new();
        let mut sink = RecordingSink::default();
        registry.register(Bot::new("HubBot", "d", "s", "e", 0, 0), &mut sink).unwrap();
        registry.unregister("HubBot", &mut sink).unwrap();
        assert_eq!(sink.removals, vec![String::from("HubBot")]);
        assert!(registry.is_empty());
    }
}
