//! Component F: the abstract Tree/File/Share contract the command handlers
//! consume. The core never implements this beyond the HTTP-backed share in
//! [`http`] (plus a tiny in-memory share used by the test suite); any other
//! backend is someone else's problem.

pub mod http;
pub mod ipc;

use std::sync::Arc;

use bitflags::bitflags;

use crate::error::SMBResult;

bitflags! {
    pub struct FileAttributes: u32 {
        const READONLY  = 0x0001;
        const HIDDEN    = 0x0002;
        const SYSTEM    = 0x0004;
        const DIRECTORY = 0x0010;
        const ARCHIVE   = 0x0020;
        const NORMAL    = 0x0080;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CreateDisposition {
    Supersede,
    Open,
    Create,
    OpenIf,
    Overwrite,
    OverwriteIf,
}

impl CreateDisposition {
    pub fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Supersede,
            1 => Self::Open,
            2 => Self::Create,
            3 => Self::OpenIf,
            4 => Self::Overwrite,
            5 => Self::OverwriteIf,
            _ => return None,
        })
    }
}

/// Action codes returned in NT_CREATE_ANDX's response (MS-SMB 2.2.4.9.2).
pub mod create_action {
    pub const SUPERSEDED: u32 = 0;
    pub const OPENED: u32 = 1;
    pub const CREATED: u32 = 2;
    pub const OVERWRITTEN: u32 = 3;
}

#[derive(Debug, Copy, Clone, Default)]
pub struct FileTimes {
    pub created_ms: i64,
    pub last_modified_ms: i64,
    pub last_changed_ms: i64,
    pub last_accessed_ms: i64,
}

/// An open file or directory handle. Implementations are read-only
/// backends in this server's scope; every mutating method's default
/// returns `STATUS_NOT_SUPPORTED` so a new backend only has to override
/// what it actually supports. Unsupported mutations surface through the
/// same error taxonomy as any other failure; a read-only backend is a
/// valid, complete implementation of this trait.
#[async_trait::async_trait]
pub trait File: Send + Sync {
    fn name(&self) -> &str;
    fn path(&self) -> &str;
    fn fid(&self) -> u16;
    fn is_directory(&self) -> bool;
    fn size(&self) -> u64;
    fn allocation_size(&self) -> u64;
    fn times(&self) -> FileTimes;
    fn attributes(&self) -> FileAttributes;
    fn create_action(&self) -> u32;

    async fn read(&self, buf: &mut [u8], pos: u64, len: usize) -> SMBResult<usize>;

    async fn set_length(&self, _new_len: u64) -> SMBResult<()> {
        Err(crate::error::SMBError::not_supported("setLength"))
    }

    async fn delete(&self) -> SMBResult<()> {
        Err(crate::error::SMBError::not_supported("delete"))
    }

    async fn close(&self) -> SMBResult<()> {
        Ok(())
    }

    fn set_delete_on_close(&self) {}

    async fn set_last_modified_time(&self, _epoch_ms: i64) -> SMBResult<()> {
        Err(crate::error::SMBError::not_supported("setLastModifiedTime"))
    }
}

/// A connected share instance: owns the `FID -> File` mapping for one
/// TREE_CONNECT session.
#[async_trait::async_trait]
pub trait Tree: Send + Sync {
    async fn open(&self, name: &str) -> SMBResult<Arc<dyn File>>;

    async fn open_or_create(
        &self,
        name: &str,
        disposition: CreateDisposition,
        is_directory: bool,
    ) -> SMBResult<Arc<dyn File>>;

    async fn list(&self, pattern: &str) -> SMBResult<Vec<Arc<dyn File>>>;

    async fn rename(&self, _file: &dyn File, _new_path: &str) -> SMBResult<()> {
        Err(crate::error::SMBError::not_supported("rename"))
    }

    async fn delete(&self, _name: &str) -> SMBResult<()> {
        Err(crate::error::SMBError::not_supported("delete"))
    }

    fn get_file(&self, fid: u16) -> Option<Arc<dyn File>>;

    async fn close_file(&self, fid: u16) -> SMBResult<()>;

    async fn disconnect(&self) -> SMBResult<()> {
        Ok(())
    }

    fn is_named_pipe(&self) -> bool {
        false
    }
}

/// A share definition: what `Share.connect` hands back once a client
/// TREE_CONNECTs, and whether it is a named pipe (affects READ_ANDX's
/// maxCount field layout).
#[async_trait::async_trait]
pub trait Share: Send + Sync {
    fn name(&self) -> &str;
    fn is_named_pipe(&self) -> bool;
    async fn connect(&self, session_uid: u16, share_password: Option<&str>) -> SMBResult<Arc<dyn Tree>>;
}
