//! The server-wide tables (shares, registered users) and the builder
//! that assembles a runnable `SMBServer` from them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::server::config::ServerConfig;
use crate::share::ipc::{IpcShare, IPC_SHARE_NAME};
use crate::share::Share;
use crate::util::auth::User;

pub struct Server {
    pub config: ServerConfig,
    pub shares: HashMap<String, Arc<dyn Share>>,
    pub users: HashMap<String, User>,
}

impl Server {
    pub fn find_user(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username.eq_ignore_ascii_case(username))
    }
}

pub struct ServerBuilder {
    config: ServerConfig,
    shares: HashMap<String, Arc<dyn Share>>,
    users: HashMap<String, User>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        let mut shares: HashMap<String, Arc<dyn Share>> = HashMap::new();
        // Always present so `smbclient -L`/share-enumeration clients have
        // something to TREE_CONNECT to; it carries no file I/O.
        shares.insert(IPC_SHARE_NAME.to_string(), Arc::new(IpcShare));
        Self {
            config: ServerConfig::default(),
            shares,
            users: HashMap::new(),
        }
    }
}

impl ServerBuilder {
    pub fn anonymous_access(mut self, allowed: bool) -> Self {
        self.config.anonymous_access = allowed;
        self
    }

    pub fn bind_address(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_address = addr.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn max_frame_size(mut self, max: usize) -> Self {
        self.config.max_frame_size = max;
        self
    }

    pub fn add_share(mut self, name: impl Into<String>, share: Arc<dyn Share>) -> Self {
        self.shares.insert(name.into(), share);
        self
    }

    pub fn add_user(mut self, user: User) -> Self {
        self.users.insert(user.username.clone(), user);
        self
    }

    pub fn build(self) -> Server {
        Server {
            config: self.config,
            shares: self.shares,
            users: self.users,
        }
    }
}
