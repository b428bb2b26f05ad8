//! ECHO (0x2B): bounces the request data back with a sequence number.
//! Classic SMB1 servers repeat the reply `EchoCount` times; this one always
//! sends a single reply with sequence number 1 (undocumented feature gap,
//! harmless for the liveness-check use ECHO is actually put to).

use crate::dispatch::{Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::write_u16_le;
use crate::message::header::NTStatus;

pub struct EchoHandler;

#[async_trait::async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        if ctx.params.len() < 2 {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "ECHO params too short");
        }
        let params = write_u16_le(1).to_vec(); // SequenceNumber
        HandlerOutcome::reply(params, ctx.data.to_vec())
    }
}
