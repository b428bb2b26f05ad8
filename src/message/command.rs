//! SMB1 command ids and the `Command` record.

/// Command ids used by this server. Not exhaustive of MS-CIFS; only the
/// ones the dispatcher and handlers reference by name.
pub mod id {
    pub const CREATE_DIRECTORY: u8 = 0x00;
    pub const CLOSE: u8 = 0x04;
    pub const DELETE: u8 = 0x06;
    pub const RENAME: u8 = 0x07;
    pub const QUERY_INFORMATION: u8 = 0x08;
    pub const WRITE_ANDX: u8 = 0x2F;
    pub const READ_ANDX: u8 = 0x2E;
    pub const TRANS2: u8 = 0x32;
    pub const TRANS2_SECONDARY: u8 = 0x33;
    pub const TREE_DISCONNECT: u8 = 0x71;
    pub const NEGOTIATE: u8 = 0x72;
    pub const SESSION_SETUP_ANDX: u8 = 0x73;
    pub const TREE_CONNECT_ANDX: u8 = 0x75;
    pub const ECHO: u8 = 0x2B;
    pub const NT_CREATE_ANDX: u8 = 0xA2;
    pub const NONE: u8 = 0xFF;
}

/// TRANS2 sub-command ids (carried in the Trans2 request `Setup[0]` word).
pub mod trans2_sub {
    pub const FIND_FIRST2: u16 = 0x0001;
    pub const FIND_NEXT2: u16 = 0x0002;
    pub const QUERY_PATH_INFORMATION: u16 = 0x0005;
    pub const SET_PATH_INFORMATION: u16 = 0x0006;
    pub const QUERY_FILE_INFORMATION: u16 = 0x0007;
    pub const SET_FILE_INFORMATION: u16 = 0x0008;
}

/// Commands that support AndX chaining, per MS-CIFS.
/// A command not in this table never carries a `nextCommand`/`nextOffset`
/// pair even if one happens to be requested.
pub fn is_andx(command_id: u8) -> bool {
    matches!(
        command_id,
        id::READ_ANDX | id::WRITE_ANDX | id::SESSION_SETUP_ANDX | id::TREE_CONNECT_ANDX | id::NT_CREATE_ANDX
    )
}

/// Every command id MS-CIFS defines, whether or not this server registers
/// a handler for it. Distinguishes "the client named a command that
/// doesn't exist" (`STATUS_SMB_BAD_COMMAND`) from "the client named a real
/// command this server doesn't implement" (`STATUS_NOT_IMPLEMENTED`), per
/// spec.md §4.D steps 2-3.
pub fn is_known_command(command_id: u8) -> bool {
    matches!(
        command_id,
        0x00 // CREATE_DIRECTORY
            | 0x01 // DELETE_DIRECTORY
            | 0x02 // OPEN
            | 0x03 // CREATE
            | 0x04 // CLOSE
            | 0x05 // FLUSH
            | 0x06 // DELETE
            | 0x07 // RENAME
            | 0x08 // QUERY_INFORMATION
            | 0x09 // SET_INFORMATION
            | 0x0A // READ
            | 0x0B // WRITE
            | 0x0C // LOCK_BYTE_RANGE
            | 0x0D // UNLOCK_BYTE_RANGE
            | 0x0E // CREATE_TEMPORARY
            | 0x0F // CREATE_NEW
            | 0x10 // CHECK_DIRECTORY
            | 0x11 // PROCESS_EXIT
            | 0x12 // SEEK
            | 0x13 // LOCK_AND_READ
            | 0x14 // WRITE_AND_UNLOCK
            | 0x1A // READ_RAW
            | 0x1B // READ_MPX
            | 0x1C // READ_MPX_SECONDARY
            | 0x1D // WRITE_RAW
            | 0x1E // WRITE_MPX
            | 0x1F // WRITE_MPX_SECONDARY
            | 0x20 // WRITE_COMPLETE
            | 0x22 // SET_INFORMATION2
            | 0x23 // QUERY_INFORMATION2
            | 0x24 // LOCKING_ANDX
            | 0x25 // TRANS
            | 0x26 // TRANS_SECONDARY
            | 0x27 // IOCTL
            | 0x28 // IOCTL_SECONDARY
            | 0x29 // COPY
            | 0x2A // MOVE
            | id::ECHO
            | 0x2C // WRITE_AND_CLOSE
            | 0x2D // OPEN_ANDX
            | id::READ_ANDX
            | id::WRITE_ANDX
            | 0x31 // CLOSE_AND_TREE_DISC
            | id::TRANS2
            | id::TRANS2_SECONDARY
            | 0x34 // FIND_CLOSE2
            | 0x35 // FIND_NOTIFY_CLOSE
            | 0x70 // TREE_CONNECT
            | id::TREE_DISCONNECT
            | id::NEGOTIATE
            | id::SESSION_SETUP_ANDX
            | 0x74 // LOGOFF_ANDX
            | id::TREE_CONNECT_ANDX
            | 0x80 // QUERY_INFORMATION_DISK
            | 0x81 // SEARCH
            | 0x82 // FIND
            | 0x83 // FIND_UNIQUE
            | 0x84 // FIND_CLOSE
            | 0xA0 // NT_TRANSACT
            | 0xA1 // NT_TRANSACT_SECONDARY
            | id::NT_CREATE_ANDX
            | 0xA4 // NT_CANCEL
            | 0xA5 // NT_RENAME
            | 0xC0 // OPEN_PRINT_FILE
            | 0xC1 // WRITE_PRINT_FILE
            | 0xC2 // CLOSE_PRINT_FILE
            | 0xC3 // GET_PRINT_QUEUE
            | 0xD8 // READ_BULK
            | 0xD9 // WRITE_BULK
            | 0xDA // WRITE_BULK_DATA
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub command_id: u8,
    pub params: Vec<u8>,
    pub data: Vec<u8>,
    /// Absolute offset (from header start) of `params` in the encoded
    /// message; handlers that embed absolute offsets in their payload
    /// (e.g. `DATA_OFFSET` in the READ_ANDX response) rely on this.
    pub params_offset: u32,
    pub data_offset: u32,
    /// AndX-chained next command id, if any; `None` for the chain
    /// terminator (`nextCommandId == 0xFF`) or non-AndX commands.
    pub next_command_id: Option<u8>,
    /// Overrides the serialized `wordCount` byte without touching `params`
    /// itself (NT_CREATE_ANDX's `wordCount=0x2a` interop quirk: the field
    /// is clamped but the full extended-response param payload still goes
    /// out on the wire).
    pub word_count_override: Option<u8>,
}

impl Command {
    pub fn word_count(&self) -> u8 {
        self.word_count_override.unwrap_or((self.params.len() / 2) as u8)
    }

    pub fn byte_count(&self) -> u16 {
        self.data.len() as u16
    }
}
