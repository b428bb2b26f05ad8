//! Rectifier (component G): a single-producer, many-waiter prefetcher that
//! turns sequential SMB reads into one long-running ranged HTTP GET.
//!
//! Coordinates are always "bytes since the requested start offset". If the
//! origin honours the Range header (206) the first byte of the body is
//! already at that offset. If it falls back to a whole-body 200, the first
//! `start_offset` bytes of the body are discarded internally so callers
//! never have to special-case the fallback.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, RANGE};
use tokio::sync::{oneshot, Mutex, Notify};

use crate::error::{SMBError, SMBResult};

const MIN_CACHE_SIZE: u64 = 2 * 1024 * 1024;

struct Task {
    target: u64,
    waiter: oneshot::Sender<SMBResult<()>>,
}

struct State {
    buffers: VecDeque<Bytes>,
    length: usize,
    position: u64,
    skip_remaining: u64,
    tasks: Vec<Task>,
    loaded: bool,
    running: bool,
    paused: bool,
    closed: bool,
    failure: Option<String>,
    /// Highest absolute position ever requested via `read`/`when`; used to
    /// enforce the documented sequential-access precondition.
    last_requested: Option<u64>,
}

pub struct Rectifier {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
    size: u64,
    start_offset: u64,
    cache_size: u64,
    state: Arc<Mutex<State>>,
    pause_notify: Arc<Notify>,
}

impl Rectifier {
    pub fn new(client: reqwest::Client, url: String, headers: HeaderMap, size: u64, start_offset: u64) -> Self {
        let cache_size = (size / 10).max(MIN_CACHE_SIZE);
        Self {
            client,
            url,
            headers,
            size,
            start_offset,
            cache_size,
            state: Arc::new(Mutex::new(State {
                buffers: VecDeque::new(),
                length: 0,
                position: 0,
                skip_remaining: 0,
                tasks: Vec::new(),
                loaded: false,
                running: false,
                paused: false,
                closed: false,
                failure: None,
                last_requested: None,
            })),
            pause_notify: Arc::new(Notify::new()),
        }
    }

    pub fn cache_size(&self) -> u64 {
        self.cache_size
    }

    /// Registers interest in bytes up to `target` (relative to
    /// `start_offset`) becoming available, starting the upstream GET on the
    /// very first call. Resolves once the bytes are buffered, or once the
    /// stream is known to have ended before reaching that target.
    pub async fn when(&self, target: u64) -> SMBResult<()> {
        let (tx, rx) = oneshot::channel();
        let mut start_stream = false;
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(SMBError::server_error("rectifier is closed"));
            }
            if let Some(msg) = &state.failure {
                return Err(SMBError::server_error(msg.clone()));
            }
            self.check_sequential(&mut state, target)?;
            if !state.running {
                state.running = true;
                start_stream = true;
            }
            state.tasks.push(Task { target, waiter: tx });
            update_tasks(&mut state, self.size, self.cache_size, &self.pause_notify);
        }
        if start_stream {
            self.spawn_stream();
        }
        rx.await.map_err(|_| SMBError::server_error("rectifier task dropped"))?
    }

    fn check_sequential(&self, state: &mut State, target: u64) -> SMBResult<()> {
        if let Some(last) = state.last_requested {
            if target < last {
                return Err(SMBError::status(
                    crate::message::header::NTStatus::Unsuccessful,
                    "non-sequential read requested from Rectifier",
                ));
            }
        }
        state.last_requested = Some(target);
        Ok(())
    }

    fn spawn_stream(&self) {
        let client = self.client.clone();
        let url = self.url.clone();
        let mut headers = self.headers.clone();
        let start_offset = self.start_offset;
        let size = self.size;
        let cache_size = self.cache_size;
        let state = self.state.clone();
        let pause_notify = self.pause_notify.clone();

        headers.insert(
            RANGE,
            HeaderValue::from_str(&format!("bytes={}-", start_offset)).expect("valid range header"),
        );

        tokio::spawn(async move {
            let response = match client.get(&url).headers(headers).send().await {
                Ok(resp) => resp,
                Err(err) => {
                    fail_all(&state, err.to_string()).await;
                    return;
                }
            };

            {
                let mut guard = state.lock().await;
                guard.skip_remaining = if response.status().as_u16() == 206 { 0 } else { start_offset };
            }

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(err) => {
                        fail_all(&state, err.to_string()).await;
                        return;
                    }
                };
                if !ingest_chunk(&state, chunk, size, cache_size, &pause_notify).await {
                    return; // closed mid-stream
                }
                wait_if_paused(&state, &pause_notify).await;
            }

            let mut guard = state.lock().await;
            guard.loaded = true;
            update_tasks(&mut guard, size, cache_size, &pause_notify);
        });
    }

    /// Serves up to `len` bytes from the head of the buffered stream into
    /// `buffer[dst_off..]`. Clamps to however many bytes are actually
    /// buffered and returns the number written.
    pub async fn read(&self, buffer: &mut [u8], dst_off: usize, len: usize) -> SMBResult<usize> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(SMBError::server_error("rectifier is closed"));
        }
        let n = len.min(state.length);
        let mut written = 0;
        while written < n {
            let chunk = state
                .buffers
                .pop_front()
                .ok_or_else(|| SMBError::server_error("rectifier buffer underflow"))?;
            let take = (n - written).min(chunk.len());
            buffer[dst_off + written..dst_off + written + take].copy_from_slice(&chunk[..take]);
            written += take;
            if take < chunk.len() {
                state.buffers.push_front(chunk.slice(take..));
            }
        }
        state.length -= n;
        Ok(n)
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        state.tasks.clear();
        self.pause_notify.notify_waiters();
    }
}

async fn wait_if_paused(state: &Arc<Mutex<State>>, notify: &Notify) {
    loop {
        {
            let guard = state.lock().await;
            if !guard.paused || guard.closed {
                return;
            }
        }
        notify.notified().await;
    }
}

async fn ingest_chunk(
    state: &Arc<Mutex<State>>,
    mut chunk: Bytes,
    size: u64,
    cache_size: u64,
    notify: &Notify,
) -> bool {
    let mut guard = state.lock().await;
    if guard.closed {
        return false;
    }
    if guard.skip_remaining > 0 {
        let skip = (guard.skip_remaining as usize).min(chunk.len());
        chunk = chunk.slice(skip..);
        guard.skip_remaining -= skip as u64;
    }
    if !chunk.is_empty() {
        guard.position += chunk.len() as u64;
        guard.length += chunk.len();
        guard.buffers.push_back(chunk);
    }
    update_tasks(&mut guard, size, cache_size, notify);
    true
}

async fn fail_all(state: &Arc<Mutex<State>>, message: String) {
    let mut guard = state.lock().await;
    guard.failure = Some(message.clone());
    guard.closed = true;
    for task in guard.tasks.drain(..) {
        let _ = task.waiter.send(Err(SMBError::server_error(message.clone())));
    }
}

/// Pauses/resumes the upstream based on how far the farthest outstanding
/// waiter has fallen behind `position`, and delivers any waiter whose
/// bytes are now available (or whose target is unreachable because the
/// stream has ended).
fn update_tasks(state: &mut State, size: u64, cache_size: u64, notify: &Notify) {
    let farthest = state.tasks.iter().map(|t| t.target).max().unwrap_or(state.position);
    let lead = state.position.saturating_sub(farthest);
    if lead > cache_size {
        state.paused = true;
    } else if lead < cache_size / 5 {
        if state.paused {
            state.paused = false;
            notify.notify_waiters();
        }
    }

    let mut remaining = Vec::new();
    for task in state.tasks.drain(..) {
        if task.target <= state.position || (task.target > size && state.loaded) {
            let _ = task.waiter.send(Ok(()));
        } else {
            remaining.push(task);
        }
    }
    state.tasks = remaining;
}
