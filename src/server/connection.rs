//! Per-connection state: the NTLM server challenge, and the UID/TID
//! tables the dispatcher and handlers consult. Owned by exactly one
//! connection's scheduler; never shared across connections.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ntlm::generate_server_challenge;
use crate::server::session::Session;
use crate::share::Tree;

pub struct Connection {
    pub challenge: [u8; 8],
    pub sessions: HashMap<u16, Session>,
    pub trees: HashMap<u16, Arc<dyn Tree>>,
    next_uid: u16,
    next_tid: u16,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            // Generated fresh per connection from a cryptographic RNG;
            // never reused across connections.
            challenge: generate_server_challenge(),
            sessions: HashMap::new(),
            trees: HashMap::new(),
            next_uid: 1,
            next_tid: 1,
        }
    }

    pub fn allocate_uid(&mut self) -> u16 {
        let uid = self.next_uid;
        self.next_uid = self.next_uid.wrapping_add(1).max(1);
        uid
    }

    pub fn allocate_tid(&mut self) -> u16 {
        let tid = self.next_tid;
        self.next_tid = self.next_tid.wrapping_add(1).max(1);
        tid
    }

    /// On disconnect every open file's Rectifier must be closed.
    /// Tree/File own their Rectifiers, so disconnecting every tree is
    /// sufficient to cascade the close.
    pub async fn teardown(&mut self) {
        for (_, tree) in self.trees.drain() {
            let _ = tree.disconnect().await;
        }
        self.sessions.clear();
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
