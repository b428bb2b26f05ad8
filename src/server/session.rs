//! A per-UID authenticated session.

#[derive(Debug, Clone)]
pub struct Session {
    pub uid: u16,
    pub username: String,
    pub domain: String,
    pub authenticated: bool,
}

impl Session {
    pub fn new(uid: u16, username: String, domain: String) -> Self {
        Self { uid, username, domain, authenticated: false }
    }
}
