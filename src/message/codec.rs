//! Message codec (component B): decode a raw SMB1 message buffer into
//! `{header, commands[]}` understanding AndX chaining; encode a mutated
//! message back to bytes, patching `nextOffset` fields as it goes.

use crate::error::{SMBError, SMBResult};
use crate::message::bytes::{read_u16_le, write_u16_le};
use crate::message::command::{id, is_andx, Command};
use crate::message::header::{SMBHeader, HEADER_LENGTH};

pub const SMB_MIN_LENGTH: usize = 35;
/// Upper bound on a decoded message; the transport's MTU in production,
/// generous here since framing is out of this core's scope.
pub const SMB_MAX_LENGTH: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: SMBHeader,
    pub commands: Vec<Command>,
    /// Set by a handler that sent its own response (e.g. ECHO); tells the
    /// dispatcher to skip `encode`.
    pub processed: bool,
}

impl Message {
    pub fn decode(buf: &[u8]) -> SMBResult<Self> {
        if buf.len() < SMB_MIN_LENGTH || buf.len() > SMB_MAX_LENGTH {
            return Err(SMBError::parse_error(format!(
                "message length {} out of bounds [{}, {}]",
                buf.len(),
                SMB_MIN_LENGTH,
                SMB_MAX_LENGTH
            )));
        }
        let header = SMBHeader::decode(buf)?;

        let mut commands = Vec::new();
        let mut offset = HEADER_LENGTH;
        let mut current_command_id = header.command;

        loop {
            if offset >= buf.len() {
                return Err(SMBError::parse_error("truncated command at word count"));
            }
            let word_count = buf[offset] as usize;
            offset += 1;
            let params_len = word_count * 2;
            if offset + params_len > buf.len() {
                return Err(SMBError::parse_error("truncated command params"));
            }
            let params = buf[offset..offset + params_len].to_vec();
            let params_offset = offset as u32;
            offset += params_len;

            if offset + 2 > buf.len() {
                return Err(SMBError::parse_error("truncated command byte count"));
            }
            let byte_count = read_u16_le(buf, offset) as usize;
            offset += 2;
            if offset + byte_count > buf.len() {
                return Err(SMBError::parse_error("truncated command data"));
            }
            let data = buf[offset..offset + byte_count].to_vec();
            let data_offset = offset as u32;
            offset += byte_count;

            let mut next_command_id = None;
            let mut next_offset_abs = None;
            if is_andx(current_command_id) && params.len() >= 4 {
                let candidate_id = params[0];
                if candidate_id != id::NONE {
                    next_command_id = Some(candidate_id);
                    next_offset_abs = Some(read_u16_le(&params, 2) as usize);
                }
            }

            commands.push(Command {
                command_id: current_command_id,
                params,
                data,
                params_offset,
                data_offset,
                next_command_id,
                word_count_override: None,
            });

            match (next_command_id, next_offset_abs) {
                (Some(next_id), Some(next_offset)) => {
                    if next_offset < HEADER_LENGTH || next_offset >= buf.len() {
                        return Err(SMBError::parse_error("AndX nextOffset out of bounds"));
                    }
                    offset = next_offset;
                    current_command_id = next_id;
                }
                _ => break,
            }
        }

        if commands.is_empty() {
            return Err(SMBError::parse_error("message has no commands"));
        }

        Ok(Message {
            header,
            commands,
            processed: false,
        })
    }

    /// Serialises the header followed by every command in order, patching
    /// each AndX command's `nextOffset` to the absolute start of the
    /// command that follows it. Recomputes `params_offset`/`data_offset`
    /// on every command to reflect where it actually landed.
    pub fn encode(&mut self) -> Vec<u8> {
        let mut starts = Vec::with_capacity(self.commands.len());
        let mut offset = HEADER_LENGTH;
        for cmd in &self.commands {
            starts.push(offset);
            offset += 1 + cmd.params.len() + 2 + cmd.data.len();
        }

        let mut out = Vec::with_capacity(offset);
        out.extend_from_slice(&self.header.encode());

        let command_count = self.commands.len();
        for i in 0..command_count {
            let start = starts[i];
            let is_last = i + 1 == command_count;
            let next_start = if is_last { 0 } else { starts[i + 1] };
            let next_id = if is_last {
                id::NONE
            } else {
                self.commands[i + 1].command_id
            };

            let cmd = &mut self.commands[i];
            cmd.params_offset = (start + 1) as u32;
            if is_andx(cmd.command_id) && cmd.params.len() >= 4 {
                cmd.params[0] = next_id;
                cmd.params[1] = 0;
                cmd.params[2..4].copy_from_slice(&write_u16_le(next_start as u16));
            }

            out.push(cmd.word_count());
            out.extend_from_slice(&cmd.params);
            out.extend_from_slice(&write_u16_le(cmd.byte_count()));
            cmd.data_offset = out.len() as u32;
            out.extend_from_slice(&cmd.data);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::header::{NTStatus, SMBFlags, SMBFlags2};

    fn blank_header(command: u8) -> SMBHeader {
        SMBHeader {
            command,
            status: NTStatus::Success,
            flags: SMBFlags::empty(),
            flags2: SMBFlags2::empty(),
            pid_high: 0,
            security_signature: [0; 8],
            tid: 1,
            pid: 2,
            uid: 3,
            mid: 4,
        }
    }

    fn andx_command(command_id: u8, extra_params: &[u8], next_id: u8) -> Command {
        let mut params = vec![next_id, 0, 0, 0];
        params.extend_from_slice(extra_params);
        Command {
            command_id,
            params,
            data: vec![],
            params_offset: 0,
            data_offset: 0,
            next_command_id: if next_id == id::NONE { None } else { Some(next_id) },
            word_count_override: None,
        }
    }

    #[test]
    fn andx_chain_of_three_round_trips() {
        let mut msg = Message {
            header: blank_header(id::SESSION_SETUP_ANDX),
            commands: vec![
                andx_command(id::SESSION_SETUP_ANDX, &[9, 9], id::TREE_CONNECT_ANDX),
                andx_command(id::TREE_CONNECT_ANDX, &[1, 2, 3, 4], id::NT_CREATE_ANDX),
                andx_command(id::NT_CREATE_ANDX, &[], id::NONE),
            ],
            processed: false,
        };
        let encoded = msg.encode();
        let mut decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded.commands.len(), 3);
        assert_eq!(decoded.commands[0].command_id, id::SESSION_SETUP_ANDX);
        assert_eq!(decoded.commands[1].command_id, id::TREE_CONNECT_ANDX);
        assert_eq!(decoded.commands[2].command_id, id::NT_CREATE_ANDX);

        // zero the ephemeral scratch offsets before comparing structurally
        for cmd in decoded.commands.iter_mut().chain(msg.commands.iter_mut()) {
            cmd.params_offset = 0;
            cmd.data_offset = 0;
        }
        let re_encoded = decoded.encode();
        assert_eq!(re_encoded, msg.encode());
    }

    #[test]
    fn andx_next_offset_points_at_next_command_start() {
        let mut msg = Message {
            header: blank_header(id::READ_ANDX),
            commands: vec![
                andx_command(id::READ_ANDX, &[0; 20], id::NONE),
                andx_command(id::READ_ANDX, &[0; 20], id::NONE),
            ],
            processed: false,
        };
        msg.commands[0].next_command_id = Some(id::READ_ANDX);
        let encoded = msg.encode();
        let first_next_offset = read_u16_le(&encoded, msg.commands[0].params_offset as usize + 2);
        assert_eq!(first_next_offset as usize, msg.commands[1].params_offset as usize - 1);
    }

    #[test]
    fn rejects_too_short_message() {
        assert!(Message::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn unknown_command_chain_terminator_stops_decode() {
        let mut msg = Message {
            header: blank_header(id::NEGOTIATE),
            commands: vec![Command {
                command_id: id::NEGOTIATE,
                params: vec![],
                data: vec![],
                params_offset: 0,
                data_offset: 0,
                next_command_id: None,
                word_count_override: None,
            }],
            processed: false,
        };
        let encoded = msg.encode();
        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded.commands.len(), 1);
    }
}
