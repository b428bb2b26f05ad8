//! `IPC$`: the always-present named-pipe share that lets `smbclient -L`
//! and friends enumerate shares without ever touching file I/O. Carries
//! no content; every file operation reports `STATUS_NOT_SUPPORTED` via
//! the `Tree`/`File` trait defaults.

use std::sync::Arc;

use crate::error::{SMBError, SMBResult};
use crate::message::header::NTStatus;
use crate::share::{CreateDisposition, File, Share, Tree};

pub const IPC_SHARE_NAME: &str = "IPC$";

pub struct IpcShare;

#[async_trait::async_trait]
impl Share for IpcShare {
    fn name(&self) -> &str {
        IPC_SHARE_NAME
    }

    fn is_named_pipe(&self) -> bool {
        true
    }

    async fn connect(&self, _session_uid: u16, _share_password: Option<&str>) -> SMBResult<Arc<dyn Tree>> {
        Ok(Arc::new(IpcTree))
    }
}

struct IpcTree;

#[async_trait::async_trait]
impl Tree for IpcTree {
    async fn open(&self, _name: &str) -> SMBResult<Arc<dyn File>> {
        Err(SMBError::status(NTStatus::NoSuchFile, "IPC$ carries no files"))
    }

    async fn open_or_create(
        &self,
        _name: &str,
        _disposition: CreateDisposition,
        _is_directory: bool,
    ) -> SMBResult<Arc<dyn File>> {
        Err(SMBError::status(NTStatus::NoSuchFile, "IPC$ carries no files"))
    }

    async fn list(&self, _pattern: &str) -> SMBResult<Vec<Arc<dyn File>>> {
        Ok(vec![])
    }

    fn get_file(&self, _fid: u16) -> Option<Arc<dyn File>> {
        None
    }

    async fn close_file(&self, _fid: u16) -> SMBResult<()> {
        Ok(())
    }

    fn is_named_pipe(&self) -> bool {
        true
    }
}
