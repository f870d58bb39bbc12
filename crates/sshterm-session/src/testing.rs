//! Scripted in-memory channel for exercising the session engine.
//!
//! [`MockChannel::pair`] returns the channel and a [`MockRemote`] that plays
//! the remote end: it queues output, ends the process, injects failures and
//! records everything the session wrote.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use sshterm_core::{Credentials, Dimensions, Error, Result};
use sshterm_stream::{
    Channel, Connector, PtyRequest, ShellControl, ShellHandle, ShellReader, ShellWriter,
};

use crate::lock;

#[derive(Debug, Default)]
struct Script {
    output: VecDeque<Vec<u8>>,
    exit_code: Option<i32>,
    read_error: Option<String>,
    write_error: Option<String>,
    resize_fails: bool,
    writes_blocked: bool,
    shell_failures: usize,

    shell_requests: Vec<PtyRequest>,
    writes: Vec<Vec<u8>>,
    resizes: Vec<Dimensions>,
    reads: usize,
    exit_reported: bool,
    reads_after_exit: usize,
    writes_after_exit: usize,
    closes: usize,
    blocked_writers: usize,
    live_handles: usize,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    changed: Condvar,
}

impl Shared {
    fn update(&self, f: impl FnOnce(&mut Script)) {
        f(&mut lock(&self.script));
        self.changed.notify_all();
    }
}

/// Channel half handed to the session.
#[derive(Debug)]
pub struct MockChannel {
    shared: Arc<Shared>,
}

/// Test-side handle playing the remote end.
#[derive(Debug, Clone)]
pub struct MockRemote {
    shared: Arc<Shared>,
}

impl MockChannel {
    /// Create a connected channel/remote pair.
    pub fn pair() -> (Self, MockRemote) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockRemote { shared },
        )
    }
}

impl Channel for MockChannel {
    fn request_shell(&mut self, request: &PtyRequest) -> Result<ShellHandle> {
        let mut script = lock(&self.shared.script);
        script.shell_requests.push(request.clone());
        if script.shell_failures > 0 {
            script.shell_failures -= 1;
            return Err(Error::SessionStart("pty request denied".to_string()));
        }
        script.live_handles += 2;
        drop(script);

        Ok(ShellHandle {
            reader: Box::new(MockReader {
                shared: Arc::clone(&self.shared),
            }),
            writer: Box::new(MockWriter {
                shared: Arc::clone(&self.shared),
            }),
            control: Box::new(MockControl {
                shared: Arc::clone(&self.shared),
            }),
        })
    }
}

struct MockReader {
    shared: Arc<Shared>,
}

impl ShellReader for MockReader {
    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut script = lock(&self.shared.script);
        script.reads += 1;
        if script.exit_reported {
            script.reads_after_exit += 1;
        }

        if script.output.is_empty() && script.read_error.is_none() {
            script = match self.shared.changed.wait_timeout(script, timeout) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }

        if let Some(message) = &script.read_error {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                message.clone(),
            )));
        }

        let Some(mut chunk) = script.output.pop_front() else {
            return Ok(0);
        };
        let n = buf.len().min(chunk.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            script.output.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn exit_status_ready(&mut self) -> bool {
        let mut script = lock(&self.shared.script);
        let ready = script.exit_code.is_some() && script.output.is_empty();
        if ready {
            script.exit_reported = true;
        }
        ready
    }

    fn exit_status(&mut self) -> Result<i32> {
        lock(&self.shared.script)
            .exit_code
            .ok_or_else(|| Error::Transport("process still running".to_string()))
    }
}

impl Drop for MockReader {
    fn drop(&mut self) {
        self.shared.update(|s| s.live_handles -= 1);
    }
}

struct MockWriter {
    shared: Arc<Shared>,
}

impl ShellWriter for MockWriter {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut script = lock(&self.shared.script);
        if script.writes_blocked {
            script.blocked_writers += 1;
            self.shared.changed.notify_all();
            while script.writes_blocked {
                script = match self.shared.changed.wait(script) {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
            }
            script.blocked_writers -= 1;
        }
        if script.exit_reported {
            script.writes_after_exit += 1;
        }
        if let Some(message) = &script.write_error {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                message.clone(),
            )));
        }
        script.writes.push(data.to_vec());
        drop(script);
        self.shared.changed.notify_all();
        Ok(())
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        self.shared.update(|s| s.live_handles -= 1);
    }
}

struct MockControl {
    shared: Arc<Shared>,
}

impl ShellControl for MockControl {
    fn resize(&self, dimensions: Dimensions) -> Result<()> {
        let mut script = lock(&self.shared.script);
        if script.resize_fails {
            return Err(Error::Transport("window change rejected".to_string()));
        }
        script.resizes.push(dimensions);
        Ok(())
    }

    fn close(&self) {
        self.shared.update(|s| s.closes += 1);
    }
}

impl MockRemote {
    /// Queue bytes for the session to read; each call is one read.
    pub fn output(&self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref().to_vec();
        self.shared.update(|s| s.output.push_back(bytes));
    }

    /// End the remote process once queued output is drained.
    pub fn exit(&self, code: i32) {
        self.shared.update(|s| s.exit_code = Some(code));
    }

    /// Make every following read fail.
    pub fn fail_reads(&self, message: &str) {
        let message = message.to_string();
        self.shared.update(|s| s.read_error = Some(message));
    }

    /// Make every following write fail.
    pub fn fail_writes(&self, message: &str) {
        let message = message.to_string();
        self.shared.update(|s| s.write_error = Some(message));
    }

    /// Make resize requests fail.
    pub fn fail_resizes(&self) {
        self.shared.update(|s| s.resize_fails = true);
    }

    /// Hold every following write until [`MockRemote::unblock_writes`].
    pub fn block_writes(&self) {
        self.shared.update(|s| s.writes_blocked = true);
    }

    /// Release held writes.
    pub fn unblock_writes(&self) {
        self.shared.update(|s| s.writes_blocked = false);
    }

    /// Wait until a write is being held.
    pub fn wait_for_blocked_write(&self, timeout: Duration) -> bool {
        self.wait_until(timeout, |s| s.blocked_writers > 0)
    }

    /// Deny the next `count` shell requests.
    pub fn fail_shell_requests(&self, count: usize) {
        self.shared.update(|s| s.shell_failures = count);
    }

    /// Every buffer written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.shared.script).writes.clone()
    }

    /// Everything written so far, concatenated.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.shared.script).writes.concat()
    }

    /// Wait until at least `len` bytes were written.
    pub fn wait_for_written(&self, len: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |s| {
            s.writes.iter().map(Vec::len).sum::<usize>() >= len
        })
    }

    fn wait_until(&self, timeout: Duration, done: impl Fn(&Script) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut script = lock(&self.shared.script);
        loop {
            if done(&script) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            script = match self.shared.changed.wait_timeout(script, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Shell requests received, including denied ones.
    pub fn shell_requests(&self) -> Vec<PtyRequest> {
        lock(&self.shared.script).shell_requests.clone()
    }

    /// Successful resizes.
    pub fn resizes(&self) -> Vec<Dimensions> {
        lock(&self.shared.script).resizes.clone()
    }

    /// Read attempts so far.
    pub fn reads(&self) -> usize {
        lock(&self.shared.script).reads
    }

    /// Read attempts after the exit status was reported ready.
    pub fn reads_after_exit(&self) -> usize {
        lock(&self.shared.script).reads_after_exit
    }

    /// Write attempts after the exit status was reported ready.
    pub fn writes_after_exit(&self) -> usize {
        lock(&self.shared.script).writes_after_exit
    }

    /// How often the channel was released.
    pub fn closes(&self) -> usize {
        lock(&self.shared.script).closes
    }

    /// Shell readers and writers not yet dropped.
    pub fn live_handles(&self) -> usize {
        lock(&self.shared.script).live_handles
    }
}

/// Connector that hands out one prepared channel, or rejects the credentials.
#[derive(Debug)]
pub struct MockConnector {
    channel: Mutex<Option<MockChannel>>,
    reject: Option<String>,
}

impl MockConnector {
    /// Hand out `channel` on the first `open`.
    pub fn new(channel: MockChannel) -> Self {
        Self {
            channel: Mutex::new(Some(channel)),
            reject: None,
        }
    }

    /// Fail every `open` with an authentication error.
    pub fn rejecting(message: &str) -> Self {
        Self {
            channel: Mutex::new(None),
            reject: Some(message.to_string()),
        }
    }
}

impl Connector for MockConnector {
    fn open(&self, _credentials: &Credentials) -> Result<Box<dyn Channel>> {
        if let Some(message) = &self.reject {
            return Err(Error::Auth(message.clone()));
        }
        lock(&self.channel)
            .take()
            .map(|channel| Box::new(channel) as Box<dyn Channel>)
            .ok_or_else(|| Error::Transport("channel already opened".to_string()))
    }
}
