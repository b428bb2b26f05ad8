//! CLOSE (0x04): optionally stamps a last-modified time, then releases the
//! file handle.

use crate::dispatch::{resolve_tree, Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::{read_u16_le, read_u32_le};
use crate::message::header::NTStatus;

pub struct CloseHandler;

#[async_trait::async_trait]
impl Handler for CloseHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        let tree = match resolve_tree(ctx.connection, ctx.header_tid) {
            Ok(t) => t,
            Err(outcome) => return outcome,
        };

        if ctx.params.len() < 6 {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "CLOSE params too short");
        }
        let fid = read_u16_le(ctx.params, 0);
        let last_time_modified = read_u32_le(ctx.params, 2);

        if last_time_modified != 0 && last_time_modified != 0xFFFF_FFFF {
            if let Some(file) = tree.get_file(fid) {
                let epoch_ms = last_time_modified as i64 * 1000;
                if let Err(e) = file.set_last_modified_time(epoch_ms).await {
                    if e.to_nt_status() != NTStatus::NotSupported {
                        return HandlerOutcome::error(e.to_nt_status(), e.to_string());
                    }
                }
            }
        }

        if let Err(e) = tree.close_file(fid).await {
            return HandlerOutcome::error(e.to_nt_status(), e.to_string());
        }

        HandlerOutcome::reply(vec![], vec![])
    }
}
