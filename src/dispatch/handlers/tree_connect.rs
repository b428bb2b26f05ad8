//! TREE_CONNECT_ANDX (0x75) and TREE_DISCONNECT (0x71): resolves a UNC path
//! against the server's share table and hands back a TID bound to the
//! connected `Tree`.

use crate::dispatch::{resolve_tree, Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::{decode_utf16le, extract_unicode_string, pad_to_align, read_u16_le, write_u16_le};
use crate::message::header::NTStatus;

pub struct TreeConnectHandler;

fn share_name_from_unc(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

#[async_trait::async_trait]
impl Handler for TreeConnectHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        if ctx.params.len() < 10 {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "TREE_CONNECT_ANDX params too short");
        }
        let password_len = read_u16_le(ctx.params, 6) as usize;
        if ctx.data.len() < password_len {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "password exceeds data length");
        }
        let share_password = if password_len > 0 {
            Some(String::from_utf8_lossy(&ctx.data[0..password_len]).into_owned())
        } else {
            None
        };

        let mut offset = password_len;
        offset += pad_to_align(ctx.data_offset as usize + offset, 2);
        let (path_bytes, _) = extract_unicode_string(ctx.data, offset);
        let path = decode_utf16le(&path_bytes);
        let share_name = share_name_from_unc(&path);

        let share = match ctx.server.shares.get(share_name) {
            Some(s) => s.clone(),
            None => return HandlerOutcome::error(NTStatus::NoSuchFile, format!("unknown share {share_name}")),
        };

        let tree = match share.connect(ctx.header_uid, share_password.as_deref()).await {
            Ok(t) => t,
            Err(e) => return HandlerOutcome::error(e.to_nt_status(), e.to_string()),
        };

        let is_named_pipe = tree.is_named_pipe();
        let tid = ctx.connection.allocate_tid();
        ctx.connection.trees.insert(tid, tree);

        let mut params = Vec::with_capacity(6);
        params.extend_from_slice(&[0, 0, 0, 0]); // AndX header, patched by the message codec
        params.extend_from_slice(&write_u16_le(if is_named_pipe { 0x0005 } else { 0x0000 })); // OptionalSupport

        let mut data = Vec::new();
        data.extend_from_slice(if is_named_pipe { b"IPC" } else { b"A:" });
        data.push(0);
        data.extend_from_slice(share_name.as_bytes());
        data.push(0);

        HandlerOutcome::reply(params, data).with_tid(tid)
    }
}

pub struct TreeDisconnectHandler;

#[async_trait::async_trait]
impl Handler for TreeDisconnectHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        if resolve_tree(ctx.connection, ctx.header_tid).is_err() {
            return HandlerOutcome::error(NTStatus::SmbBadTid, "TID does not resolve to a tree");
        }
        if let Some(tree) = ctx.connection.trees.remove(&ctx.header_tid) {
            if let Err(e) = tree.disconnect().await {
                return HandlerOutcome::error(e.to_nt_status(), e.to_string());
            }
        }
        HandlerOutcome::reply(vec![], vec![])
    }
}
