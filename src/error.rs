//! Error taxonomy (component H): maps system/OS errors to NTSTATUS codes
//! and wraps callbacks to translate them.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

use crate::message::header::NTStatus;

pub type SMBResult<T> = Result<T, SMBError>;

/// An error produced anywhere in the core. Every variant carries enough
/// information to be turned into a wire NTSTATUS by [`SMBError::to_nt_status`].
#[derive(Debug)]
pub enum SMBError {
    /// An error that already knows its wire status (bad TID/FID, no such
    /// file, unsupported operation, ...). This is how most handler
    /// preconditions report failure.
    Status(NTStatus, String),
    ParseError(SMBParseError),
    CryptoError(SMBCryptoError),
    IOError(SMBIOError),
    ServerError(SMBServerError),
}

impl SMBError {
    pub fn status<T: Into<String>>(status: NTStatus, message: T) -> Self {
        Self::Status(status, message.into())
    }

    pub fn parse_error<T: Into<SMBParseError>>(error: T) -> Self {
        Self::ParseError(error.into())
    }

    pub fn crypto_error<T: Into<SMBCryptoError>>(error: T) -> Self {
        Self::CryptoError(error.into())
    }

    pub fn io_error<T: Into<SMBIOError>>(error: T) -> Self {
        Self::IOError(error.into())
    }

    pub fn server_error<T: Into<SMBServerError>>(error: T) -> Self {
        Self::ServerError(error.into())
    }

    pub fn bad_tid() -> Self {
        Self::status(NTStatus::SmbBadTid, "TID does not resolve to a tree")
    }

    pub fn bad_fid() -> Self {
        Self::status(NTStatus::SmbBadFid, "FID does not resolve to a file")
    }

    pub fn not_supported<T: Into<String>>(message: T) -> Self {
        Self::status(NTStatus::NotSupported, message)
    }

    /// Maps this error to the NTSTATUS value placed in the response
    /// header. Framing/crypto/server errors degrade to
    /// `STATUS_UNSUCCESSFUL`; a `Status` error passes its code through.
    pub fn to_nt_status(&self) -> NTStatus {
        match self {
            Self::Status(status, _) => *status,
            Self::ParseError(_) | Self::CryptoError(_) | Self::ServerError(_) => {
                NTStatus::Unsuccessful
            }
            Self::IOError(e) => from_io_error_kind(e.error.kind()),
        }
    }

    /// Maps an OS error (`std::io::Error`) to an NTSTATUS per the §4.H table.
    pub fn from_system_error(err: io::Error) -> Self {
        let status = from_io_error_kind(err.kind());
        Self::IOError(SMBIOError { error: err, status })
    }
}

fn from_io_error_kind(kind: io::ErrorKind) -> NTStatus {
    match kind {
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => NTStatus::NotImplemented,
        io::ErrorKind::NotFound => NTStatus::NoSuchFile,
        io::ErrorKind::PermissionDenied => NTStatus::AccessDenied,
        io::ErrorKind::AlreadyExists => NTStatus::ObjectNameCollision,
        io::ErrorKind::UnexpectedEof => NTStatus::EndOfFile,
        _ => NTStatus::Unsuccessful,
    }
}

#[derive(Debug)]
pub struct SMBParseError {
    error: Box<dyn Error + Send + Sync>,
}

impl<T: Into<Box<dyn Error + Send + Sync>>> From<T> for SMBParseError {
    fn from(value: T) -> Self {
        Self { error: value.into() }
    }
}

impl Display for SMBParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "message parse failed: {}", self.error)
    }
}

#[derive(Debug)]
pub struct SMBCryptoError {
    message: String,
}

impl<T: Into<String>> From<T> for SMBCryptoError {
    fn from(value: T) -> Self {
        Self { message: value.into() }
    }
}

impl Display for SMBCryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "crypto operation failed: {}", self.message)
    }
}

#[derive(Debug)]
pub struct SMBIOError {
    error: io::Error,
    status: NTStatus,
}

impl From<io::Error> for SMBIOError {
    fn from(value: io::Error) -> Self {
        let status = from_io_error_kind(value.kind());
        Self { error: value, status }
    }
}

impl Display for SMBIOError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "I/O operation failed ({:?}): {}", self.status, self.error)
    }
}

#[derive(Debug)]
pub struct SMBServerError {
    error: Box<dyn Error + Send + Sync>,
}

impl<T: Into<Box<dyn Error + Send + Sync>>> From<T> for SMBServerError {
    fn from(value: T) -> Self {
        Self { error: value.into() }
    }
}

impl Display for SMBServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "server error: {}", self.error)
    }
}

impl Display for SMBError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(status, message) => write!(f, "{:?}: {}", status, message),
            Self::ParseError(x) => write!(f, "{}", x),
            Self::CryptoError(x) => write!(f, "{}", x),
            Self::IOError(x) => write!(f, "{}", x),
            Self::ServerError(x) => write!(f, "{}", x),
        }
    }
}

impl Error for SMBError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_errno_kinds() {
        assert_eq!(
            SMBError::from_system_error(io::Error::from(io::ErrorKind::NotFound)).to_nt_status(),
            NTStatus::NoSuchFile
        );
        assert_eq!(
            SMBError::from_system_error(io::Error::from(io::ErrorKind::PermissionDenied))
                .to_nt_status(),
            NTStatus::AccessDenied
        );
        assert_eq!(
            SMBError::from_system_error(io::Error::from(io::ErrorKind::AlreadyExists))
                .to_nt_status(),
            NTStatus::ObjectNameCollision
        );
    }

    #[test]
    fn unknown_errno_defaults_to_unsuccessful() {
        assert_eq!(
            SMBError::from_system_error(io::Error::from(io::ErrorKind::Other)).to_nt_status(),
            NTStatus::Unsuccessful
        );
    }

    #[test]
    fn status_error_passes_code_through() {
        assert_eq!(SMBError::bad_tid().to_nt_status(), NTStatus::SmbBadTid);
    }
}
