//! NEGOTIATE (0x72): picks a dialect off the client's offered list and
//! returns capabilities, the NTLM server challenge, and the server time.

use crate::dispatch::{Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::{system_to_smb_time, write_u16_le, write_u32_le, write_u64_le};
use crate::message::header::NTStatus;

const DIALECT_NT_LM_0_12: &str = "NT LM 0.12";

const SECURITY_MODE_USER_LEVEL: u8 = 0x01;
const SECURITY_MODE_ENCRYPT_PASSWORDS: u8 = 0x02;

const CAP_UNICODE: u32 = 0x0000_0004;
const CAP_LARGE_FILES: u32 = 0x0000_0008;
const CAP_NT_SMBS: u32 = 0x0000_0010;
const CAP_STATUS32: u32 = 0x0000_0040;
const CAP_NT_FIND: u32 = 0x0000_0200;

pub struct NegotiateHandler;

fn parse_dialects(data: &[u8]) -> Vec<String> {
    let mut dialects = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        if data[offset] != 0x02 {
            break;
        }
        offset += 1;
        let start = offset;
        while offset < data.len() && data[offset] != 0 {
            offset += 1;
        }
        if let Ok(s) = std::str::from_utf8(&data[start..offset]) {
            dialects.push(s.to_string());
        }
        offset += 1; // skip terminator
    }
    dialects
}

#[async_trait::async_trait]
impl Handler for NegotiateHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        let dialects = parse_dialects(ctx.data);
        let dialect_index = match dialects.iter().position(|d| d == DIALECT_NT_LM_0_12) {
            Some(i) => i as u16,
            None => return HandlerOutcome::error(NTStatus::NotSupported, "no supported dialect offered"),
        };

        let security_mode = SECURITY_MODE_USER_LEVEL | SECURITY_MODE_ENCRYPT_PASSWORDS;
        let capabilities = CAP_UNICODE | CAP_LARGE_FILES | CAP_NT_SMBS | CAP_STATUS32 | CAP_NT_FIND;
        let now_ms = epoch_ms_now();
        let smb_time = system_to_smb_time(now_ms);

        let mut params = Vec::with_capacity(34);
        params.extend_from_slice(&write_u16_le(dialect_index));
        params.push(security_mode);
        params.extend_from_slice(&write_u16_le(16)); // MaxMpxCount
        params.extend_from_slice(&write_u16_le(1)); // MaxNumberVcs
        params.extend_from_slice(&write_u32_le(ctx.server.config.max_frame_size as u32)); // MaxBufferSize
        params.extend_from_slice(&write_u32_le(0)); // MaxRawSize (raw mode unsupported)
        params.extend_from_slice(&write_u32_le(0)); // SessionKey
        params.extend_from_slice(&write_u32_le(capabilities));
        params.extend_from_slice(&write_u64_le(smb_time));
        params.extend_from_slice(&write_u16_le(0)); // ServerTimeZone: UTC
        params.push(ctx.connection.challenge.len() as u8); // ChallengeLength (EncryptionKeyLength)

        let mut data = Vec::new();
        data.extend_from_slice(&ctx.connection.challenge);

        HandlerOutcome::reply(params, data)
    }
}

fn epoch_ms_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dialect_list() {
        let mut data = Vec::new();
        data.push(0x02);
        data.extend_from_slice(b"PC NETWORK PROGRAM 1.0\0");
        data.push(0x02);
        data.extend_from_slice(b"NT LM 0.12\0");
        let dialects = parse_dialects(&data);
        assert_eq!(dialects, vec!["PC NETWORK PROGRAM 1.0".to_string(), "NT LM 0.12".to_string()]);
    }
}
