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

//! Registered-user table: nick-keyed CRUD over a local SQLite file, schema reproduced
//! verbatim for interoperability with existing installations.

use rusqlite::{params, Connection as DbConnection};
use crate::error::*;
use crate::hubxe;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    nick          TEXT PRIMARY KEY,
    class         INTEGER NOT NULL DEFAULT 0,
    pwd_hash      TEXT NOT NULL DEFAULT '',
    pwd_method    TEXT NOT NULL DEFAULT 'plain',
    pwd_change    INTEGER NOT NULL DEFAULT 1,
    enabled       INTEGER NOT NULL DEFAULT 1,
    hide_kick     INTEGER NOT NULL DEFAULT 0,
    hide_share    INTEGER NOT NULL DEFAULT 0,
    reg_date      INTEGER NOT NULL DEFAULT 0,
    login_last    INTEGER NOT NULL DEFAULT 0,
    logout_last   INTEGER NOT NULL DEFAULT 0,
    login_count   INTEGER NOT NULL DEFAULT 0,
    last_ip       TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_users_login_last  ON users(login_last);
CREATE INDEX IF NOT EXISTS idx_users_logout_last ON users(logout_last);

CREATE TABLE IF NOT EXISTS bans (
    ip_pattern TEXT PRIMARY KEY,
    reason     TEXT NOT NULL DEFAULT '',
    set_by     TEXT NOT NULL DEFAULT '',
    set_at     INTEGER NOT NULL DEFAULT 0,
    expires_at INTEGER NOT NULL DEFAULT 0
);
";

/// One row of the `users` table.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisteredUser {
    pub nick: String,
    pub class: i64,
    pub pwd_hash: String,
    pub pwd_method: String,
    pub pwd_change: bool,
    pub enabled: bool,
    pub hide_kick: bool,
    pub hide_share: bool,
    pub reg_date: i64,
    pub login_last: i64,
    pub logout_last: i64,
    pub login_count: i64,
    pub last_ip: String
}

/// Folds a nickname to its canonical lookup form. Primary-key comparisons always go
/// through this, so `Alice` and `alice` name the same account.
pub fn fold_nick(nick: &str) -> String { nick.to_lowercase() }

pub struct UserStore {
    db: DbConnection
}

impl UserStore {
    pub fn open(path: &str) -> Result<UserStore, HubError> {
        let db = DbConnection::open(path)
            .map_err(|e| hubxe!(E_DB_OPEN_ERR, path.to_string(), e.to_string()))?;
        db.execute_batch(SCHEMA)
            .map_err(|e| hubxe!(E_DB_OPEN_ERR, path.to_string(), e.to_string()))?;
        Ok(UserStore { db })
    }

    pub fn find(&self, nick: &str) -> Result<Option<RegisteredUser>, HubError> {
        let folded = fold_nick(nick);
        let mut stmt = self.db.prepare(
            "SELECT nick, class, pwd_hash, pwd_method, pwd_change, enabled, hide_kick, \
             hide_share, reg_date, login_last, logout_last, login_count, last_ip \
             FROM users WHERE nick = ?1")
            .map_err(|e| hubxe!(E_DB_QUERY_ERR, e.to_string()))?;
        let mut rows = stmt.query(params![folded])
            .map_err(|e| hubxe!(E_DB_QUERY_ERR, e.to_string()))?;
        match rows.next().map_err(|e| hubxe!(E_DB_QUERY_ERR, e.to_string()))? {
            Some(row) => Ok(Some(row_to_user(row)?)),
            None => Ok(None)
        }
    }

    /// Inserts a new account or overwrites an existing one under the same folded nick.
    pub fn upsert(&self, user: &RegisteredUser) -> Result<(), HubError> {
        let folded = fold_nick(&user.nick);
        self.db.execute(
            "INSERT INTO users (nick, class, pwd_hash, pwd_method, pwd_change, enabled, \
             hide_kick, hide_share, reg_date, login_last, logout_last, login_count, last_ip) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) \
             ON CONFLICT(nick) DO UPDATE SET \
             class=excluded.class, pwd_hash=excluded.pwd_hash, pwd_method=excluded.pwd_method, \
             pwd_change=excluded.pwd_change, enabled=excluded.enabled, \
             hide_kick=excluded.hide_kick, hide_share=excluded.hide_share, \
             last_ip=excluded.last_ip",
            params![folded, user.class, user.pwd_hash, user.pwd_method,
                    user.pwd_change as i64, user.enabled as i64, user.hide_kick as i64,
                    user.hide_share as i64, user.reg_date, user.login_last, user.logout_last,
                    user.login_count, user.last_ip])
            .map_err(|e| hubxe!(E_DB_QUERY_ERR, e.to_string()))?;
        Ok(())
    }

    pub fn remove(&self, nick: &str) -> Result<(), HubError> {
        let folded = fold_nick(nick);
        self.db.execute("DELETE FROM users WHERE nick = ?1", params![folded])
            .map_err(|e| hubxe!(E_DB_QUERY_ERR, e.to_string()))?;
        Ok(())
    }

    /// Records a login: bumps `login_count`, sets `login_last` and `last_ip`.
    pub fn record_login(&self, nick: &str, now: i64, peer_ip: &str) -> Result<(), HubError> {
        let folded = fold_nick(nick);
        self.db.execute(
            "UPDATE users SET login_last = ?1, last_ip = ?2, login_count = login_count + 1 \
             WHERE nick = ?3",
            params![now, peer_ip, folded])
            .map_err(|e| hubxe!(E_DB_QUERY_ERR, e.to_string()))?;
        Ok(())
    }

    pub fn record_logout(&self, nick: &str, now: i64) -> Result<(), HubError> {
        let folded = fold_nick(nick);
        self.db.execute("UPDATE users SET logout_last = ?1 WHERE nick = ?2",
                         params![now, folded])
            .map_err(|e| hubxe!(E_DB_QUERY_ERR, e.to_string()))?;
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row) -> Result<RegisteredUser, HubError> {
    (|| -> rusqlite::Result<RegisteredUser> {
        Ok(RegisteredUser {
            nick: row.get(0)?,
            class: row.get(1)?,
            pwd_hash: row.get(2)?,
            pwd_method: row.get(3)?,
            pwd_change: row.get::<_, i64>(4)? != 0,
            enabled: row.get::<_, i64>(5)? != 0,
            hide_kick: row.get::<_, i64>(6)? != 0,
            hide_share: row.get::<_, i64>(7)? != 0,
            reg_date: row.get(8)?,
            login_last: row.get(9)?,
            logout_last: row.get(10)?,
            login_count: row.get(11)?,
            last_ip: row.get(12)?
        })
    })().map_err(|e| hubxe!(E_DB_QUERY_ERR, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_user(nick: &str) -> RegisteredUser {
        RegisteredUser {
            nick: nick.to_string(), class: 1, pwd_hash: String::new(),
            pwd_method: String::from("plain"), pwd_change: true, enabled: true,
            hide_kick: false, hide_share: false, reg_date: 1000, login_last: 0,
            logout_last: 0, login_count: 0, last_ip: String::new()
        }
    }

    #[test]
    fn nick_folding_is_case_insensitive() {
        assert_eq!(fold_nick("Alice"), fold_nick("alice"));
    }

    #[test]
    fn upsert_then_find_round_trips() {
        let store = UserStore::open(":memory:").unwrap();
        store.upsert(&blank_user("Alice")).unwrap();
        let found = store.find("alice").unwrap().unwrap();
        assert_eq!(found.nick, "alice");
        assert_eq!(found.class, 1);
    }

    #[test]
    fn upsert_twice_overwrites_same_account() {
        let store = UserStore::open(":memory:").unwrap();
        store.upsert(&blank_user("Bob")).unwrap();
        let mut updated = blank_user("Bob");
        updated.class = 3;
        store.upsert(&updated).unwrap();
        let found = store.find("bob").unwrap().unwrap();
        assert_eq!(found.class, 3);
    }

    #[test]
    fn remove_deletes_account() {
        let store = UserStore::open(":memory:").unwrap();
        store.upsert(&blank_user("Carol")).unwrap();
        store.remove("carol").unwrap();
        assert!(store.find("carol").unwrap().is_none());
    }

    #[test]
    fn record_login_bumps_count_and_stamps_ip() {
        let store = UserStore::open(":memory:").unwrap();
        store.upsert(&blank_user("Dave")).unwrap();
        store.record_login("dave", 5000, "1.2.3.4").unwrap();
        let found = store.find("dave").unwrap().unwrap();
        assert_eq!(found.login_count, 1);
        assert_eq!(found.login_last, 5000);
        assert_eq!(found.last_ip, "1.2.3.4");
    }

    #[test]
    fn unknown_nick_returns_none() {
        let store = UserStore::open(":memory:").unwrap();
        assert!(store.find("nobody").unwrap().is_none());
    }
}
