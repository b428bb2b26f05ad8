//! SESSION_SETUP_ANDX (0x73): classic (non-extended-security) NTLM/NTLMv2
//! authentication. Recomputes the expected response from the stored user
//! hash and the connection's challenge, and compares in constant time.

use crate::dispatch::{Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::{encode_utf16le, extract_unicode_string, pad_to_align, read_u16_le, write_u16_le};
use crate::message::header::NTStatus;
use crate::ntlm::hash::{ntlm_hash, ntlm_v2_hash};
use crate::ntlm::response::{validate_lm_v2_response, validate_ntlm_response, validate_ntlm_v2_response};
use crate::server::session::Session;

pub struct SessionSetupHandler;

#[async_trait::async_trait]
impl Handler for SessionSetupHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        if ctx.params.len() < 26 {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "SESSION_SETUP_ANDX params too short");
        }
        let oem_password_len = read_u16_le(ctx.params, 14) as usize;
        let unicode_password_len = read_u16_le(ctx.params, 16) as usize;

        if ctx.data.len() < oem_password_len + unicode_password_len {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "password blob exceeds data length");
        }
        let oem_password = &ctx.data[0..oem_password_len];
        let unicode_password = &ctx.data[oem_password_len..oem_password_len + unicode_password_len];

        let mut offset = oem_password_len + unicode_password_len;
        offset += pad_to_align(ctx.data_offset as usize + offset, 2);
        let (account_bytes, consumed) = extract_unicode_string(ctx.data, offset);
        offset += consumed;
        let account_name = crate::message::bytes::decode_utf16le(&account_bytes);
        let (domain_bytes, _) = extract_unicode_string(ctx.data, offset);
        let domain = crate::message::bytes::decode_utf16le(&domain_bytes);

        let authenticated = if oem_password_len == 0 && unicode_password_len == 0 {
            ctx.server.config.anonymous_access
        } else {
            match ctx.server.find_user(&account_name) {
                Some(user) => {
                    let nt_hash = ntlm_hash(&user.password);
                    if unicode_password_len == 24 {
                        validate_ntlm_response(&nt_hash, &ctx.connection.challenge, unicode_password)
                    } else if unicode_password_len > 24 {
                        match ntlm_v2_hash(&nt_hash, &account_name, &domain) {
                            Ok(v2_hash) => {
                                validate_ntlm_v2_response(&v2_hash, &ctx.connection.challenge, unicode_password)
                                    || validate_lm_v2_response(&v2_hash, &ctx.connection.challenge, oem_password)
                            }
                            Err(_) => false,
                        }
                    } else {
                        false
                    }
                }
                None => false,
            }
        };

        if !authenticated {
            return HandlerOutcome::error(NTStatus::AccessDenied, "NTLM response did not validate");
        }

        let uid = ctx.connection.allocate_uid();
        ctx.connection
            .sessions
            .insert(uid, Session::new(uid, account_name, domain));

        let mut params = Vec::with_capacity(6);
        params.extend_from_slice(&[0, 0, 0, 0]); // AndX header, patched by the message codec
        params.extend_from_slice(&write_u16_le(0)); // Action: not guest

        let mut data = Vec::new();
        data.extend_from_slice(&encode_utf16le("Unix"));
        data.extend_from_slice(&[0, 0]);
        data.extend_from_slice(&encode_utf16le("smb_reader"));
        data.extend_from_slice(&[0, 0]);

        HandlerOutcome::reply(params, data).with_uid(uid)
    }
}
