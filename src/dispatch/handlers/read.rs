//! READ_ANDX (0x2E): the hot path — reads up to `maxCount` bytes from an
//! open file (ultimately through the Rectifier for HTTP-backed files) and
//! packs them at the fixed `DATA_OFFSET`.

use crate::dispatch::{resolve_tree, Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::{read_u16_le, read_u32_le, write_u16_le, write_u32_le};
use crate::message::header::NTStatus;

/// Fixed absolute offset (from the SMB header start) of the payload in a
/// READ_ANDX response. Only correct when READ_ANDX is the sole command in
/// its message, which is the only shape this server emits.
const DATA_OFFSET: u16 = 60;

pub struct ReadHandler;

#[async_trait::async_trait]
impl Handler for ReadHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        let tree = match resolve_tree(ctx.connection, ctx.header_tid) {
            Ok(t) => t,
            Err(outcome) => return outcome,
        };

        if ctx.params.len() < 20 {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "READ_ANDX params too short");
        }
        let fid = read_u16_le(ctx.params, 4);
        let mut offset = read_u32_le(ctx.params, 6) as u64;
        if ctx.params.len() >= 24 {
            let offset_high = read_u32_le(ctx.params, 20) as u64;
            offset |= offset_high << 32;
        }
        let max_count_low = read_u16_le(ctx.params, 10) as u32;
        let max_count = if tree.is_named_pipe() {
            max_count_low
        } else {
            let max_count_high = read_u16_le(ctx.params, 14) as u32;
            max_count_low | (max_count_high << 16)
        } as usize;

        let file = match tree.get_file(fid) {
            Some(f) => f,
            None => return HandlerOutcome::error(NTStatus::SmbBadFid, "FID does not resolve to a file"),
        };
        if file.is_directory() {
            return HandlerOutcome::error(NTStatus::FileIsADirectory, "READ_ANDX on a directory");
        }

        let mut buf = vec![0u8; max_count];
        let read_len = match file.read(&mut buf, offset, max_count).await {
            Ok(n) => n,
            Err(e) => return HandlerOutcome::error(e.to_nt_status(), e.to_string()),
        };
        buf.truncate(read_len);

        let mut params = Vec::with_capacity(24);
        params.extend_from_slice(&[0, 0, 0, 0]); // AndX header, patched by the message codec
        params.extend_from_slice(&write_u16_le(0)); // Remaining
        params.extend_from_slice(&write_u16_le(0)); // DataCompactionMode
        params.extend_from_slice(&write_u16_le(0)); // reserved
        params.extend_from_slice(&write_u16_le((read_len & 0xFFFF) as u16)); // DataLength
        params.extend_from_slice(&write_u16_le(DATA_OFFSET)); // DataOffset
        params.extend_from_slice(&write_u32_le((read_len >> 16) as u32)); // DataLengthHigh
        params.extend_from_slice(&[0u8; 6]); // reserved

        let mut data = Vec::with_capacity(1 + buf.len());
        data.push(0); // pad byte so the payload lands exactly at DATA_OFFSET
        data.extend_from_slice(&buf);

        HandlerOutcome::reply(params, data)
    }
}
