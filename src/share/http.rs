//! The concrete backend of interest: a read-only share whose files
//! live behind plain HTTP URLs, fetched on demand through the
//! [`Rectifier`](crate::rectifier::Rectifier) ranged-GET prefetcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::Mutex;

use crate::error::{SMBError, SMBResult};
use crate::rectifier::Rectifier;
use crate::share::{CreateDisposition, File, FileAttributes, FileTimes, Share, Tree};

/// One entry in the virtual file tree: a name the client will see mapped
/// to an HTTP-addressable resource.
#[derive(Debug, Clone)]
pub struct HttpFileEntry {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub last_modified_ms: i64,
}

pub struct HttpShare {
    name: String,
    entries: Vec<HttpFileEntry>,
    client: reqwest::Client,
    extra_headers: Vec<(String, String)>,
}

impl HttpShare {
    pub fn new(name: String, entries: Vec<HttpFileEntry>, extra_headers: Vec<(String, String)>) -> Self {
        Self {
            name,
            entries,
            client: reqwest::Client::new(),
            extra_headers,
        }
    }

    fn header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in &self.extra_headers {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(k.as_str()), HeaderValue::from_str(v)) {
                headers.insert(name, value);
            }
        }
        headers
    }
}

#[async_trait::async_trait]
impl Share for HttpShare {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_named_pipe(&self) -> bool {
        false
    }

    async fn connect(&self, _session_uid: u16, _share_password: Option<&str>) -> SMBResult<Arc<dyn Tree>> {
        Ok(Arc::new(HttpTree {
            entries: self.entries.clone(),
            client: self.client.clone(),
            headers: self.header_map(),
            files: Mutex::new(HashMap::new()),
            next_fid: AtomicU16::new(1),
        }))
    }
}

pub struct HttpTree {
    entries: Vec<HttpFileEntry>,
    client: reqwest::Client,
    headers: HeaderMap,
    files: Mutex<HashMap<u16, Arc<HttpFile>>>,
    next_fid: AtomicU16,
}

impl HttpTree {
    fn find_entry(&self, name: &str) -> Option<&HttpFileEntry> {
        let normalized = name.trim_start_matches(['\\', '/']);
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(normalized))
    }

    async fn open_entry(&self, entry: &HttpFileEntry) -> Arc<HttpFile> {
        let fid = self.next_fid.fetch_add(1, Ordering::SeqCst);
        let file = Arc::new(HttpFile {
            fid,
            name: entry.name.clone(),
            url: entry.url.clone(),
            size: entry.size,
            last_modified_ms: entry.last_modified_ms,
            client: self.client.clone(),
            headers: self.headers.clone(),
            rectifier: Mutex::new(None),
            delete_on_close: AtomicBool::new(false),
        });
        self.files.lock().await.insert(fid, file.clone());
        file
    }
}

#[async_trait::async_trait]
impl Tree for HttpTree {
    async fn open(&self, name: &str) -> SMBResult<Arc<dyn File>> {
        let entry = self
            .find_entry(name)
            .ok_or_else(|| SMBError::status(crate::message::header::NTStatus::NoSuchFile, name))?
            .clone();
        Ok(self.open_entry(&entry).await)
    }

    async fn open_or_create(
        &self,
        name: &str,
        disposition: CreateDisposition,
        is_directory: bool,
    ) -> SMBResult<Arc<dyn File>> {
        if is_directory {
            return Err(SMBError::not_supported("directory creation on an HTTP share"));
        }
        match disposition {
            CreateDisposition::Open | CreateDisposition::OpenIf => self.open(name).await,
            _ => Err(SMBError::not_supported("write-disposition create on a read-only HTTP share")),
        }
    }

    async fn list(&self, pattern: &str) -> SMBResult<Vec<Arc<dyn File>>> {
        let mut out = Vec::new();
        for entry in self.entries.iter().filter(|e| matches_pattern(&e.name, pattern)) {
            out.push(self.open_entry(entry).await as Arc<dyn File>);
        }
        Ok(out)
    }

    fn get_file(&self, fid: u16) -> Option<Arc<dyn File>> {
        // Mutex::try_lock: the dispatcher never calls this concurrently
        // with a close_file/open on the same connection, so a
        // blocking-free try_lock is sufficient here.
        self.files
            .try_lock()
            .ok()
            .and_then(|files| files.get(&fid).cloned())
            .map(|f| f as Arc<dyn File>)
    }

    async fn close_file(&self, fid: u16) -> SMBResult<()> {
        let file = self.files.lock().await.remove(&fid);
        if let Some(file) = file {
            file.close().await?;
        }
        Ok(())
    }
}

pub struct HttpFile {
    fid: u16,
    name: String,
    url: String,
    size: u64,
    last_modified_ms: i64,
    client: reqwest::Client,
    headers: HeaderMap,
    rectifier: Mutex<Option<Arc<Rectifier>>>,
    delete_on_close: AtomicBool,
}

impl HttpFile {
    async fn rectifier(&self) -> Arc<Rectifier> {
        let mut guard = self.rectifier.lock().await;
        if let Some(r) = &*guard {
            return r.clone();
        }
        let r = Arc::new(Rectifier::new(
            self.client.clone(),
            self.url.clone(),
            self.headers.clone(),
            self.size,
            0,
        ));
        *guard = Some(r.clone());
        r
    }
}

#[async_trait::async_trait]
impl File for HttpFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.name
    }

    fn fid(&self) -> u16 {
        self.fid
    }

    fn is_directory(&self) -> bool {
        false
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn allocation_size(&self) -> u64 {
        // Round up to the next 4096-byte cluster, matching what Windows
        // clients expect from a disk-backed share.
        (self.size + 4095) & !4095
    }

    fn times(&self) -> FileTimes {
        FileTimes {
            created_ms: self.last_modified_ms,
            last_modified_ms: self.last_modified_ms,
            last_changed_ms: self.last_modified_ms,
            last_accessed_ms: self.last_modified_ms,
        }
    }

    fn attributes(&self) -> FileAttributes {
        FileAttributes::READONLY | FileAttributes::NORMAL
    }

    fn create_action(&self) -> u32 {
        crate::share::create_action::OPENED
    }

    async fn read(&self, buf: &mut [u8], pos: u64, len: usize) -> SMBResult<usize> {
        let rectifier = self.rectifier().await;
        rectifier.when(pos + len as u64).await?;
        rectifier.read(buf, 0, len).await
    }

    fn set_delete_on_close(&self) {
        self.delete_on_close.store(true, Ordering::SeqCst);
    }
}

/// DOS-style `*`/`?` wildcard match (case-insensitive), used by FIND_FIRST2
/// / DELETE's pattern argument.
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    if pattern == "*" || pattern.is_empty() {
        return true;
    }
    let name: Vec<char> = name.to_ascii_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_ascii_lowercase().chars().collect();
    matches_recursive(&name, &pattern)
}

fn matches_recursive(name: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some('*') => {
            matches_recursive(name, &pattern[1..])
                || (!name.is_empty() && matches_recursive(&name[1..], pattern))
        }
        Some('?') => !name.is_empty() && matches_recursive(&name[1..], &pattern[1..]),
        Some(c) => !name.is_empty() && name[0] == *c && matches_recursive(&name[1..], &pattern[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matching() {
        assert!(matches_pattern("readme.txt", "*.txt"));
        assert!(matches_pattern("readme.txt", "read??.txt"));
        assert!(!matches_pattern("readme.md", "*.txt"));
        assert!(matches_pattern("anything", "*"));
    }
}
