//! The fixed 32-byte SMB1 header.

use bitflags::bitflags;

use crate::error::{SMBError, SMBResult};
use crate::message::bytes::{read_u16_le, read_u32_le, write_u16_le, write_u32_le};

pub const SMB_MAGIC: [u8; 4] = [0xFF, b'S', b'M', b'B'];
pub const HEADER_LENGTH: usize = 32;

bitflags! {
    pub struct SMBFlags: u8 {
        const REPLY               = 0b1000_0000;
        const REQUEST_BATCH_OPLOCK = 0b0100_0000;
        const REQUEST_OPLOCK       = 0b0010_0000;
        const CANONICAL_PATHNAMES  = 0b0001_0000;
        const CASELESS_PATHNAMES   = 0b0000_1000;
        const CLIENT_BUF_AVAIL     = 0b0000_0100;
        const SUPPORT_LOCKREAD     = 0b0000_0001;
    }
}

bitflags! {
    pub struct SMBFlags2: u16 {
        const UNICODE_STRINGS          = 0b1000_0000_0000_0000;
        const NT_STATUS                = 0b0100_0000_0000_0000;
        const READ_IF_EXECUTE          = 0b0010_0000_0000_0000;
        const DFS_PATHNAMES            = 0b0001_0000_0000_0000;
        const EXTENDED_SECURITY        = 0b0000_1000_0000_0000;
        const LONG_NAMES_SUPPORTED     = 0b0000_0000_0100_0000;
        const SECURITY_SIGNATURE       = 0b0000_0000_0000_0100;
        const EXTENDED_ATTRIBUTES      = 0b0000_0000_0000_0010;
        const KNOWS_LONG_NAMES         = 0b0000_0000_0000_0001;
    }
}

/// NTSTATUS values the core needs to place in the header or compare
/// against. Not exhaustive of MS-ERREF; values used by this server only.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NTStatus {
    Success = 0x0000_0000,
    MoreProcessingRequired = 0xC000_0016,
    NoSuchFile = 0xC000_000F,
    Unsuccessful = 0xC000_0001,
    NotImplemented = 0xC000_0002,
    InvalidParameter = 0xC000_000D,
    AccessDenied = 0xC000_0022,
    EndOfFile = 0xC000_0011,
    ObjectNameCollision = 0xC000_0035,
    NetworkAccessDenied = 0xC000_0061,
    NotSupported = 0xC000_00BB,
    FileIsADirectory = 0xC000_00BA,
    SmbBadTid = 0x0005_0002,
    SmbBadFid = 0x0006_0001,
    SmbBadCommand = 0x0016_0001,
}

impl NTStatus {
    pub fn from_raw(raw: u32) -> Option<Self> {
        use NTStatus::*;
        Some(match raw {
            0x0000_0000 => Success,
            0xC000_0016 => MoreProcessingRequired,
            0xC000_000F => NoSuchFile,
            0xC000_0001 => Unsuccessful,
            0xC000_0002 => NotImplemented,
            0xC000_000D => InvalidParameter,
            0xC000_0022 => AccessDenied,
            0xC000_0011 => EndOfFile,
            0xC000_0035 => ObjectNameCollision,
            0xC000_0061 => NetworkAccessDenied,
            0xC000_00BB => NotSupported,
            0xC000_00BA => FileIsADirectory,
            0x0005_0002 => SmbBadTid,
            0x0006_0001 => SmbBadFid,
            0x0016_0001 => SmbBadCommand,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SMBHeader {
    pub command: u8,
    pub status: NTStatus,
    pub flags: SMBFlags,
    pub flags2: SMBFlags2,
    pub pid_high: u16,
    pub security_signature: [u8; 8],
    pub tid: u16,
    pub pid: u16,
    pub uid: u16,
    pub mid: u16,
}

impl SMBHeader {
    pub fn decode(buf: &[u8]) -> SMBResult<Self> {
        if buf.len() < HEADER_LENGTH {
            return Err(SMBError::parse_error("buffer shorter than SMB header"));
        }
        if buf[0..4] != SMB_MAGIC {
            return Err(SMBError::parse_error("bad SMB protocol magic"));
        }
        let status = NTStatus::from_raw(read_u32_le(buf, 5)).unwrap_or(NTStatus::Success);
        let mut security_signature = [0u8; 8];
        security_signature.copy_from_slice(&buf[14..22]);
        Ok(Self {
            command: buf[4],
            status,
            flags: SMBFlags::from_bits_truncate(buf[9]),
            flags2: SMBFlags2::from_bits_truncate(read_u16_le(buf, 10)),
            pid_high: read_u16_le(buf, 12),
            security_signature,
            tid: read_u16_le(buf, 24),
            pid: read_u16_le(buf, 26),
            uid: read_u16_le(buf, 28),
            mid: read_u16_le(buf, 30),
        })
    }

    pub fn encode(&self) -> [u8; HEADER_LENGTH] {
        let mut out = [0u8; HEADER_LENGTH];
        out[0..4].copy_from_slice(&SMB_MAGIC);
        out[4] = self.command;
        out[5..9].copy_from_slice(&write_u32_le(self.status as u32));
        out[9] = self.flags.bits();
        out[10..12].copy_from_slice(&write_u16_le(self.flags2.bits()));
        out[12..14].copy_from_slice(&write_u16_le(self.pid_high));
        out[14..22].copy_from_slice(&self.security_signature);
        // out[22..24] reserved
        out[24..26].copy_from_slice(&write_u16_le(self.tid));
        out[26..28].copy_from_slice(&write_u16_le(self.pid));
        out[28..30].copy_from_slice(&write_u16_le(self.uid));
        out[30..32].copy_from_slice(&write_u16_le(self.mid));
        out
    }

    /// Applies the response flag policy before a reply is encoded.
    pub fn apply_response_flags(&mut self) {
        self.flags.insert(SMBFlags::REPLY);
        self.flags2.insert(SMBFlags2::NT_STATUS);
        self.flags2.insert(SMBFlags2::UNICODE_STRINGS);
        self.flags2.insert(SMBFlags2::LONG_NAMES_SUPPORTED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> SMBHeader {
        SMBHeader {
            command: 0x72,
            status: NTStatus::Success,
            flags: SMBFlags::CASELESS_PATHNAMES,
            flags2: SMBFlags2::UNICODE_STRINGS,
            pid_high: 0,
            security_signature: [0; 8],
            tid: 1,
            pid: 2,
            uid: 3,
            mid: 4,
        }
    }

    #[test]
    fn decode_encode_round_trips() {
        let header = sample_header();
        let encoded = header.encode();
        let decoded = SMBHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut encoded = sample_header().encode();
        encoded[1] = b'X';
        assert!(SMBHeader::decode(&encoded).is_err());
    }

    #[test]
    fn response_flag_policy_sets_required_bits() {
        let mut header = sample_header();
        header.apply_response_flags();
        assert!(header.flags.contains(SMBFlags::REPLY));
        assert!(header.flags2.contains(SMBFlags2::NT_STATUS));
        assert!(header.flags2.contains(SMBFlags2::UNICODE_STRINGS));
        assert!(header.flags2.contains(SMBFlags2::LONG_NAMES_SUPPORTED));
    }
}
