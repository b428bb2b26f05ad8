//! Components A and B: binary codec utilities and the SMB1 message codec.

pub mod bytes;
pub mod codec;
pub mod command;
pub mod header;

pub use codec::Message;
pub use command::Command;
pub use header::SMBHeader;
