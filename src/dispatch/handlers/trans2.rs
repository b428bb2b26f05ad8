//! TRANS2 (0x32): the generic "transaction" container. Sub-dispatches on
//! the Setup[0] word to FIND_FIRST2, FIND_NEXT2, QUERY_PATH_INFORMATION,
//! and SET_FILE_INFORMATION, the sub-commands this server's backends need.

use crate::dispatch::{resolve_tree, Handler, HandlerContext, HandlerOutcome};
use crate::message::bytes::{
    decode_utf16le, encode_utf16le, extract_unicode_string, pad_to_align, read_u16_le, read_u32_le, read_u64_le,
    system_to_smb_time, write_u16_le, write_u32_le, write_u64_le,
};
use crate::message::command::trans2_sub;
use crate::message::header::NTStatus;
use crate::share::{File, Tree};
use std::sync::Arc;

/// NT-passthrough information levels start here (Windows `FileInformationClass`
/// values offset by 1000, per the CIFS/Samba convention).
const INFO_PASSTHROUGH: u16 = 0x03E8;
const FILE_RENAME_INFORMATION: u16 = 1010;
const FILE_DISPOSITION_INFORMATION: u16 = 1013;
const FILE_ALLOCATION_INFORMATION: u16 = 1019;
const FILE_END_OF_FILE_INFORMATION: u16 = 1020;

pub struct Trans2Handler;

/// Locates the trans2 parameter/data sub-buffers inside the outer command's
/// `data` blob using the absolute offsets carried in the outer params.
struct Trans2Request<'a> {
    sub_command: u16,
    trans_params: &'a [u8],
    trans_data: &'a [u8],
}

fn parse_trans2_request<'a>(ctx: &HandlerContext<'a>) -> Result<Trans2Request<'a>, HandlerOutcome> {
    if ctx.params.len() < 30 {
        return Err(HandlerOutcome::error(NTStatus::InvalidParameter, "TRANS2 params too short"));
    }
    let parameter_count = read_u16_le(ctx.params, 18) as usize;
    let parameter_offset_abs = read_u16_le(ctx.params, 20) as usize;
    let data_count = read_u16_le(ctx.params, 22) as usize;
    let data_offset_abs = read_u16_le(ctx.params, 24) as usize;
    let sub_command = read_u16_le(ctx.params, 28);

    let base = ctx.data_offset as usize;
    let param_start = parameter_offset_abs.checked_sub(base).ok_or_else(|| {
        HandlerOutcome::error(NTStatus::InvalidParameter, "TRANS2 parameterOffset precedes data blob")
    })?;
    let data_start = data_offset_abs.checked_sub(base).ok_or_else(|| {
        HandlerOutcome::error(NTStatus::InvalidParameter, "TRANS2 dataOffset precedes data blob")
    })?;
    if param_start + parameter_count > ctx.data.len() || data_start + data_count > ctx.data.len() {
        return Err(HandlerOutcome::error(NTStatus::InvalidParameter, "TRANS2 sub-buffer out of bounds"));
    }

    Ok(Trans2Request {
        sub_command,
        trans_params: &ctx.data[param_start..param_start + parameter_count],
        trans_data: &ctx.data[data_start..data_start + data_count],
    })
}

/// Packs a TRANS2 response: fixed 10-word outer params plus an outer data
/// blob of `pad1 + trans_params + pad2 + trans_data`. Assumes TRANS2 is the
/// only command in its message (it never AndX-chains), so the absolute
/// layout is fixed and can be computed up front the way READ_ANDX's
/// `DATA_OFFSET` is.
fn pack_trans2_reply(trans_params: &[u8], trans_data: &[u8]) -> HandlerOutcome {
    const HEADER_LENGTH: usize = 32;
    const OUTER_WORD_COUNT: usize = 10;
    let outer_data_start_abs = HEADER_LENGTH + 1 + OUTER_WORD_COUNT * 2 + 2;
    let pad1 = pad_to_align(outer_data_start_abs, 2);
    let param_offset_abs = outer_data_start_abs + pad1;
    let pad2 = pad_to_align(param_offset_abs + trans_params.len(), 4);
    let data_offset_abs = param_offset_abs + trans_params.len() + pad2;

    let mut params = Vec::with_capacity(OUTER_WORD_COUNT * 2);
    params.extend_from_slice(&write_u16_le(trans_params.len() as u16)); // TotalParameterCount
    params.extend_from_slice(&write_u16_le(trans_data.len() as u16)); // TotalDataCount
    params.extend_from_slice(&write_u16_le(0)); // Reserved
    params.extend_from_slice(&write_u16_le(trans_params.len() as u16)); // ParameterCount
    params.extend_from_slice(&write_u16_le(param_offset_abs as u16)); // ParameterOffset
    params.extend_from_slice(&write_u16_le(0)); // ParameterDisplacement
    params.extend_from_slice(&write_u16_le(trans_data.len() as u16)); // DataCount
    params.extend_from_slice(&write_u16_le(data_offset_abs as u16)); // DataOffset
    params.extend_from_slice(&write_u16_le(0)); // DataDisplacement
    params.push(0); // SetupCount
    params.push(0); // Reserved

    let mut data = vec![0u8; pad1];
    data.extend_from_slice(trans_params);
    data.extend(std::iter::repeat(0u8).take(pad2));
    data.extend_from_slice(trans_data);

    HandlerOutcome::reply(params, data)
}

#[async_trait::async_trait]
impl Handler for Trans2Handler {
    async fn handle(&self, ctx: &mut HandlerContext<'_>) -> HandlerOutcome {
        let tree = match resolve_tree(ctx.connection, ctx.header_tid) {
            Ok(t) => t,
            Err(outcome) => return outcome,
        };
        let tree = tree.clone();

        let request = match parse_trans2_request(ctx) {
            Ok(r) => r,
            Err(outcome) => return outcome,
        };

        match request.sub_command {
            trans2_sub::FIND_FIRST2 => handle_find_first2(&*tree, &request).await,
            trans2_sub::FIND_NEXT2 => handle_find_next2(),
            trans2_sub::QUERY_PATH_INFORMATION => handle_query_path_information(&*tree, &request).await,
            trans2_sub::SET_FILE_INFORMATION => handle_set_file_information(&*tree, &request).await,
            _ => HandlerOutcome::error(NTStatus::NotImplemented, "unsupported TRANS2 sub-command"),
        }
    }
}

fn encode_find_entry(file: &Arc<dyn File>, next_entry_offset: u32) -> Vec<u8> {
    let times = file.times();
    let mut out = Vec::new();
    out.extend_from_slice(&write_u32_le(next_entry_offset));
    out.extend_from_slice(&write_u32_le(0)); // FileIndex
    out.extend_from_slice(&write_u64_le(system_to_smb_time(times.created_ms)));
    out.extend_from_slice(&write_u64_le(system_to_smb_time(times.last_accessed_ms)));
    out.extend_from_slice(&write_u64_le(system_to_smb_time(times.last_modified_ms)));
    out.extend_from_slice(&write_u64_le(system_to_smb_time(times.last_changed_ms)));
    out.extend_from_slice(&write_u64_le(file.size()));
    out.extend_from_slice(&write_u64_le(file.allocation_size()));
    out.extend_from_slice(&write_u32_le(file.attributes().bits()));
    let name = encode_utf16le(file.name());
    out.extend_from_slice(&write_u32_le(name.len() as u32)); // FileNameLength
    out.extend_from_slice(&[0u8; 26]); // EA size, short name fields (unused)
    out.extend_from_slice(&name);
    out
}

async fn handle_find_first2(tree: &dyn Tree, request: &Trans2Request<'_>) -> HandlerOutcome {
    if request.trans_params.len() < 12 {
        return HandlerOutcome::error(NTStatus::InvalidParameter, "FIND_FIRST2 params too short");
    }
    let search_count = read_u16_le(request.trans_params, 2) as usize;
    let mut offset = 12;
    offset += pad_to_align(offset, 2);
    let (pattern_bytes, _) = extract_unicode_string(request.trans_params, offset);
    let pattern = decode_utf16le(&pattern_bytes);

    let mut files = match tree.list(&pattern).await {
        Ok(f) => f,
        Err(e) => return HandlerOutcome::error(e.to_nt_status(), e.to_string()),
    };
    files.truncate(search_count.max(1));

    let mut trans_data = Vec::new();
    for (i, file) in files.iter().enumerate() {
        let is_last = i + 1 == files.len();
        let entry = encode_find_entry(file, 0);
        if !is_last {
            let entry_len = entry.len() as u32;
            trans_data.extend_from_slice(&write_u32_le(entry_len));
            trans_data.extend_from_slice(&entry[4..]);
        } else {
            trans_data.extend_from_slice(&entry);
        }
    }

    let mut trans_params = Vec::with_capacity(10);
    trans_params.extend_from_slice(&write_u16_le(1)); // SearchId (sid)
    trans_params.extend_from_slice(&write_u16_le(files.len() as u16)); // SearchCount
    trans_params.extend_from_slice(&write_u16_le(1)); // EndOfSearch: always true (no continuation state kept)
    trans_params.extend_from_slice(&write_u16_le(0)); // EaErrorOffset
    trans_params.extend_from_slice(&write_u16_le(0)); // LastNameOffset

    pack_trans2_reply(&trans_params, &trans_data)
}

/// FIND_NEXT2 continuation: this server does not keep per-search cursor
/// state (every FIND_FIRST2 already returns EndOfSearch=true), so a
/// FIND_NEXT2 always reports an empty, exhausted search.
fn handle_find_next2() -> HandlerOutcome {
    let mut trans_params = Vec::with_capacity(8);
    trans_params.extend_from_slice(&write_u16_le(0)); // SearchCount
    trans_params.extend_from_slice(&write_u16_le(1)); // EndOfSearch
    trans_params.extend_from_slice(&write_u16_le(0)); // EaErrorOffset
    trans_params.extend_from_slice(&write_u16_le(0)); // LastNameOffset
    pack_trans2_reply(&trans_params, &[])
}

async fn handle_query_path_information(tree: &dyn Tree, request: &Trans2Request<'_>) -> HandlerOutcome {
    if request.trans_params.len() < 6 {
        return HandlerOutcome::error(NTStatus::InvalidParameter, "QUERY_PATH_INFORMATION params too short");
    }
    let mut offset = 6;
    offset += pad_to_align(offset, 2);
    let (name_bytes, _) = extract_unicode_string(request.trans_params, offset);
    let path = decode_utf16le(&name_bytes);

    let file = match tree.open(&path).await {
        Ok(f) => f,
        Err(e) => return HandlerOutcome::error(e.to_nt_status(), e.to_string()),
    };

    let times = file.times();
    let mut trans_data = Vec::new();
    trans_data.extend_from_slice(&write_u64_le(system_to_smb_time(times.created_ms)));
    trans_data.extend_from_slice(&write_u64_le(system_to_smb_time(times.last_accessed_ms)));
    trans_data.extend_from_slice(&write_u64_le(system_to_smb_time(times.last_modified_ms)));
    trans_data.extend_from_slice(&write_u64_le(system_to_smb_time(times.last_changed_ms)));
    trans_data.extend_from_slice(&write_u32_le(file.attributes().bits()));
    trans_data.extend_from_slice(&[0u8; 4]); // reserved
    trans_data.extend_from_slice(&write_u64_le(file.allocation_size()));
    trans_data.extend_from_slice(&write_u64_le(file.size()));
    trans_data.extend_from_slice(&write_u32_le(0)); // hard link count
    trans_data.push(0); // delete pending
    trans_data.push(if file.is_directory() { 1 } else { 0 });

    pack_trans2_reply(&[], &trans_data)
}

fn parent_of(path: &str) -> String {
    match path.rfind(['\\', '/']) {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

async fn handle_set_file_information(tree: &dyn Tree, request: &Trans2Request<'_>) -> HandlerOutcome {
    if request.trans_params.len() < 4 {
        return HandlerOutcome::error(NTStatus::InvalidParameter, "SET_FILE_INFORMATION params too short");
    }
    let fid = read_u16_le(request.trans_params, 0);
    let information_level = read_u16_le(request.trans_params, 2);

    if information_level < INFO_PASSTHROUGH {
        return HandlerOutcome::error(NTStatus::NotSupported, "only NT-passthrough information levels are supported");
    }

    let file = match tree.get_file(fid) {
        Some(f) => f,
        None => return HandlerOutcome::error(NTStatus::SmbBadFid, "FID does not resolve to a file"),
    };

    let result = match information_level {
        FILE_DISPOSITION_INFORMATION => {
            if request.trans_data.first().copied().unwrap_or(0) != 0 {
                file.set_delete_on_close();
            }
            Ok(())
        }
        FILE_END_OF_FILE_INFORMATION => {
            if request.trans_data.len() < 8 {
                return HandlerOutcome::error(NTStatus::InvalidParameter, "FILE_END_OF_FILE_INFORMATION too short");
            }
            file.set_length(read_u64_le(request.trans_data, 0)).await
        }
        FILE_ALLOCATION_INFORMATION => {
            // Documented feature gap: a non-zero allocation request on a
            // non-empty file silently reports success without truncating.
            if request.trans_data.len() < 8 {
                return HandlerOutcome::error(NTStatus::InvalidParameter, "FILE_ALLOCATION_INFORMATION too short");
            }
            let allocation = read_u64_le(request.trans_data, 0);
            if allocation == 0 && file.size() > 0 {
                file.set_length(0).await
            } else {
                Ok(())
            }
        }
        FILE_RENAME_INFORMATION => {
            if request.trans_data.len() < 12 {
                return HandlerOutcome::error(NTStatus::InvalidParameter, "FILE_RENAME_INFORMATION too short");
            }
            let name_length = read_u32_le(request.trans_data, 8) as usize;
            if request.trans_data.len() < 12 + name_length {
                return HandlerOutcome::error(NTStatus::InvalidParameter, "FILE_RENAME_INFORMATION name out of bounds");
            }
            let target_name = decode_utf16le(&request.trans_data[12..12 + name_length]);
            let new_path = format!("{}\\{}", parent_of(file.path()), target_name);
            tree.rename(&*file, &new_path).await
        }
        _ => return HandlerOutcome::error(NTStatus::NotImplemented, "unsupported SET_FILE_INFORMATION level"),
    };

    match result {
        Ok(()) => pack_trans2_reply(&[], &[]),
        Err(e) => HandlerOutcome::error(e.to_nt_status(), e.to_string()),
    }
}
