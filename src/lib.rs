//! Read-only CIFS/SMB1 file server: binary codec, NTLM authentication, the
//! command dispatcher, and an HTTP-backed share implementation fronted by a
//! ranged-read prefetcher ([`rectifier`]).

pub mod dispatch;
pub mod error;
pub mod message;
pub mod ntlm;
pub mod rectifier;
pub mod server;
pub mod share;
pub mod util;

pub use error::{SMBError, SMBResult};
pub use server::{ServerConfig, ServerBuilder, SMBServer};
