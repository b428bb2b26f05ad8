//! DELETE (0x06): resolves a wildcard pattern against the tree and removes
//! every match, stopping at the first failure.

use crate::dispatch::{resolve_tree, Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::{decode_utf16le, extract_unicode_string, pad_to_align};
use crate::message::header::NTStatus;

pub struct DeleteHandler;

#[async_trait::async_trait]
impl Handler for DeleteHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        let tree = match resolve_tree(ctx.connection, ctx.header_tid) {
            Ok(t) => t,
            Err(outcome) => return outcome,
        };

        if ctx.data.is_empty() {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "DELETE data missing filename buffer");
        }
        let mut offset = 1; // skip the buffer-format byte (0x04)
        offset += pad_to_align(ctx.data_offset as usize + offset, 2);
        let (pattern_bytes, _) = extract_unicode_string(ctx.data, offset);
        let pattern = decode_utf16le(&pattern_bytes);

        let matches = match tree.list(&pattern).await {
            Ok(files) => files,
            Err(e) => return HandlerOutcome::error(e.to_nt_status(), e.to_string()),
        };
        if matches.is_empty() {
            return HandlerOutcome::error(NTStatus::NoSuchFile, format!("no file matches {pattern}"));
        }

        for file in &matches {
            if let Err(e) = tree.delete(file.name()).await {
                return HandlerOutcome::error(e.to_nt_status(), e.to_string());
            }
        }

        HandlerOutcome::reply(vec![], vec![])
    }
}
