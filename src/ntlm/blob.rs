//! NTLMv2 "blob": the client-generated structure embedded in an NTLMv2
//! response and covered by the HMAC-MD5.

use crate::error::{SMBError, SMBResult};
use crate::message::bytes::{read_u16_le, read_u32_le, read_u64_le, write_u16_le, write_u32_le, write_u64_le};

const BLOB_SIGNATURE: u32 = 0x0001_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfoItem {
    pub item_type: u16,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtlmV2Blob {
    pub timestamp: u64,
    pub client_nonce: [u8; 8],
    pub target_info: Vec<TargetInfoItem>,
    /// Bytes after the terminating `unknown2` field; preserved verbatim so
    /// a parsed blob can be re-serialised byte-identically.
    pub trailing: Vec<u8>,
}

impl NtlmV2Blob {
    pub fn parse(buf: &[u8]) -> SMBResult<Self> {
        if buf.len() < 28 {
            return Err(SMBError::parse_error("NTLMv2 blob shorter than fixed prefix"));
        }
        let signature = read_u32_le(buf, 0);
        if signature != BLOB_SIGNATURE {
            return Err(SMBError::parse_error("bad NTLMv2 blob signature"));
        }
        let timestamp = read_u64_le(buf, 8);
        let mut client_nonce = [0u8; 8];
        client_nonce.copy_from_slice(&buf[16..24]);

        let mut offset = 28;
        let mut target_info = Vec::new();
        loop {
            if offset + 4 > buf.len() {
                return Err(SMBError::parse_error("truncated target-info header"));
            }
            let item_type = read_u16_le(buf, offset);
            let len = read_u16_le(buf, offset + 2) as usize;
            offset += 4;
            if item_type == 0 && len == 0 {
                break;
            }
            if offset + len > buf.len() {
                return Err(SMBError::parse_error("truncated target-info value"));
            }
            target_info.push(TargetInfoItem {
                item_type,
                value: buf[offset..offset + len].to_vec(),
            });
            offset += len;
        }
        if offset + 4 > buf.len() {
            return Err(SMBError::parse_error("truncated blob unknown2 field"));
        }
        offset += 4;
        let trailing = buf[offset..].to_vec();

        Ok(Self {
            timestamp,
            client_nonce,
            target_info,
            trailing,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&write_u32_le(BLOB_SIGNATURE));
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&write_u64_le(self.timestamp));
        out.extend_from_slice(&self.client_nonce);
        out.extend_from_slice(&[0u8; 4]);
        for item in &self.target_info {
            out.extend_from_slice(&write_u16_le(item.item_type));
            out.extend_from_slice(&write_u16_le(item.value.len() as u16));
            out.extend_from_slice(&item.value);
        }
        out.extend_from_slice(&write_u16_le(0));
        out.extend_from_slice(&write_u16_le(0));
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&self.trailing);
        out
    }
}
