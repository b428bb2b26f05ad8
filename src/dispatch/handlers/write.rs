//! WRITE_ANDX (0x2F): this server only ever backs read-only content
//! sources, so every write is rejected rather than silently accepted.

use crate::dispatch::{resolve_tree, Handler, HandlerContext, HandlerOutcome};
use crate::message::header::NTStatus;

pub struct WriteHandler;

#[async_trait::async_trait]
impl Handler for WriteHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        if resolve_tree(ctx.connection, ctx.header_tid).is_err() {
            return HandlerOutcome::error(NTStatus::SmbBadTid, "TID does not resolve to a tree");
        }
        HandlerOutcome::error(NTStatus::AccessDenied, "this share is read-only")
    }
}
