//! `ServerConfig`: bind address, port, share table knobs, and the CLI's
//! `--config` TOML shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub anonymous_access: bool,
    /// Message signing is not implemented; kept as an explicit,
    /// always-false field so it's visible in the config shape rather
    /// than silently absent.
    pub require_message_signing: bool,
    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 50122,
            anonymous_access: false,
            require_message_signing: false,
            max_frame_size: crate::message::codec::SMB_MAX_LENGTH,
        }
    }
}

/// Shape of the optional `--config <path>` TOML file: share definitions
/// beyond what env vars can express.
#[derive(Debug, Deserialize, Serialize)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub shares: Vec<ShareConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ShareConfig {
    Http {
        name: String,
        base_url: String,
        #[serde(default)]
        headers: Vec<(String, String)>,
        #[serde(default)]
        entries: Vec<HttpEntryConfig>,
    },
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HttpEntryConfig {
    pub name: String,
    pub url: String,
    pub size: u64,
    #[serde(default)]
    pub last_modified_ms: i64,
}

impl FileConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}
