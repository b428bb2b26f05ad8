//! NT_CREATE_ANDX (0xA2): opens or creates a file/directory and reports its
//! handle, timestamps, and size back to the client.

use crate::dispatch::{resolve_tree, Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::{decode_utf16le, extract_unicode_string, pad_to_align, read_u16_le, read_u32_le, write_u16_le, write_u32_le, write_u64_le};
use crate::message::header::NTStatus;
use crate::share::CreateDisposition;

const FILE_DIRECTORY_FILE: u32 = 0x0000_0001;
const OPBATCH: u32 = 0x0000_0004;
const EXTENDED_RESPONSE: u32 = 0x0000_0010;

const FILE_TYPE_DISK: u16 = 0x0000;
const FILE_TYPE_MESSAGEMODEPIPE: u16 = 0x0005;

const NO_EAS: u32 = 0x1;
const NO_SUBSTREAMS: u32 = 0x2;
const NO_REPARSETAG: u32 = 0x4;

pub struct CreateHandler;

#[async_trait::async_trait]
impl Handler for CreateHandler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        let tree = match resolve_tree(ctx.connection, ctx.header_tid) {
            Ok(t) => t,
            Err(outcome) => return outcome,
        };

        if ctx.params.len() < 54 {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "NT_CREATE_ANDX params too short");
        }
        let flags = read_u32_le(ctx.params, 4);
        let name_length = read_u16_le(ctx.params, 8) as usize;
        let create_options = read_u32_le(ctx.params, 28);
        let create_disposition_raw = read_u32_le(ctx.params, 24);

        let mut name_offset = 52;
        name_offset += pad_to_align(ctx.params_offset as usize + name_offset, 2);
        if ctx.params.len() < name_offset + name_length {
            return HandlerOutcome::error(NTStatus::InvalidParameter, "NT_CREATE_ANDX filename out of bounds");
        }
        let name = decode_utf16le(&ctx.params[name_offset..name_offset + name_length]);

        let disposition = match CreateDisposition::from_wire(create_disposition_raw) {
            Some(d) => d,
            None => return HandlerOutcome::error(NTStatus::InvalidParameter, "unknown createDisposition"),
        };
        let is_directory = create_options & FILE_DIRECTORY_FILE != 0;

        let file = match tree.open_or_create(&name, disposition, is_directory).await {
            Ok(f) => f,
            Err(e) => return HandlerOutcome::error(e.to_nt_status(), e.to_string()),
        };

        let op_lock_level: u8 = if flags & OPBATCH != 0 { 2 } else { 0 };
        let resource_type = if tree.is_named_pipe() { FILE_TYPE_MESSAGEMODEPIPE } else { FILE_TYPE_DISK };
        let times = file.times();

        let mut params = Vec::with_capacity(100);
        params.extend_from_slice(&[0, 0, 0, 0]); // AndX header, patched by the message codec
        params.push(op_lock_level);
        params.push(0);
        params.extend_from_slice(&write_u16_le(file.fid()));
        params.extend_from_slice(&write_u32_le(file.create_action()));
        params.extend_from_slice(&write_u64_le(crate::message::bytes::system_to_smb_time(times.created_ms)));
        params.extend_from_slice(&write_u64_le(crate::message::bytes::system_to_smb_time(times.last_accessed_ms)));
        params.extend_from_slice(&write_u64_le(crate::message::bytes::system_to_smb_time(times.last_modified_ms)));
        params.extend_from_slice(&write_u64_le(crate::message::bytes::system_to_smb_time(times.last_changed_ms)));
        params.extend_from_slice(&write_u32_le(file.attributes().bits()));
        params.extend_from_slice(&write_u64_le(file.allocation_size()));
        params.extend_from_slice(&write_u64_le(file.size()));
        params.extend_from_slice(&write_u16_le(resource_type));

        if flags & EXTENDED_RESPONSE != 0 {
            params.extend_from_slice(&write_u16_le((NO_EAS | NO_SUBSTREAMS | NO_REPARSETAG) as u16));
            params.push(if is_directory { 1 } else { 0 });
            params.push(0);
            params.extend_from_slice(&[0u8; 16]); // ZERO_GUID
            params.extend_from_slice(&write_u64_le(0)); // FileId
            params.extend_from_slice(&write_u32_le(0x001F_01FF)); // MaximalAccessRights
            params.extend_from_slice(&write_u32_le(0x0012_0089)); // GuestMaximalAccessRights
        } else {
            params.extend_from_slice(&write_u16_le(0)); // NMPipeStatus2
            params.push(if is_directory { 1 } else { 0 });
            params.push(0);
        }

        // Interop quirk: some clients choke if wordCount exceeds 0x2a. Only
        // the serialized wordCount byte is clamped; the full extended-response
        // param payload above still goes out on the wire.
        let word_count = if params.len() / 2 > 0x2a { Some(0x2a) } else { None };

        HandlerOutcome::Reply {
            params,
            data: vec![],
            word_count,
            byte_count: None,
            more_processing: false,
            new_uid: None,
            new_tid: None,
        }
    }
}
