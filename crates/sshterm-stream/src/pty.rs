//! PTY-backed channel using portable-pty.
//!
//! The system `ssh` client (or a local program) runs under a pseudo-terminal;
//! the PTY master is the byte channel. Authentication, host-key checks and
//! protocol negotiation are left to the ssh client itself.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tracing::{debug, error, info, warn};

use sshterm_core::{Credentials, Dimensions, Error, Result};

use crate::channel::{
    Channel, Connector, PtyRequest, ShellControl, ShellHandle, ShellReader, ShellWriter,
};

/// Bytes moved from the PTY per read on the reader thread.
const READ_CHUNK: usize = 4096;

/// Longest sleep of a read after end of output while waiting for the exit status.
const EXIT_POLL: Duration = Duration::from_millis(20);

/// How long a failed read waits for the child to exit before it counts as an error.
const EXIT_GRACE: Duration = Duration::from_secs(1);

type SharedChild = Arc<Mutex<Box<dyn Child + Send + Sync>>>;

/// What a [`PtyConnector`] runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    /// The system ssh client, connecting with the given credentials
    Ssh {
        /// Program name or path (usually "ssh")
        program: String,
    },
    /// A local program; credentials are ignored
    Local {
        /// Program name or path
        program: String,
        /// Arguments
        args: Vec<String>,
    },
}

/// Opens [`PtyChannel`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyConnector {
    launch: Launch,
}

impl PtyConnector {
    /// Connect through the given ssh client program.
    pub fn ssh(program: impl Into<String>) -> Self {
        Self {
            launch: Launch::Ssh {
                program: program.into(),
            },
        }
    }

    /// Run the user's shell locally instead of connecting anywhere.
    pub fn local_shell() -> Self {
        let shell = if cfg!(windows) {
            "cmd.exe".to_string()
        } else {
            std::env::var("SHELL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "/bin/sh".to_string())
        };
        Self::command(shell, Vec::<String>::new())
    }

    /// Run an arbitrary local program.
    pub fn command<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            launch: Launch::Local {
                program: program.into(),
                args: args.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// What this connector runs.
    pub fn launch(&self) -> &Launch {
        &self.launch
    }
}

impl Connector for PtyConnector {
    fn open(&self, credentials: &Credentials) -> Result<Box<dyn Channel>> {
        let (program, args) = match &self.launch {
            Launch::Ssh { program } => {
                if let Some(key_file) = &credentials.key_file {
                    check_key_file(&expand_home(key_file))?;
                }
                (program, ssh_arguments(credentials))
            }
            Launch::Local { program, args } => (program, args.clone()),
        };

        let resolved = resolve_program(program).ok_or_else(|| {
            error!("Transport program not found: '{}'", program);
            Error::Transport(format!("program not found: '{program}'"))
        })?;

        info!("Opened PTY channel: program={} target={}", resolved.display(), credentials);

        Ok(Box::new(PtyChannel {
            program: resolved,
            args,
        }))
    }
}

/// Arguments for the ssh client: forced tty, port, timeout, identity, login, host.
pub fn ssh_arguments(credentials: &Credentials) -> Vec<String> {
    let mut args = vec![
        "-tt".to_string(),
        "-p".to_string(),
        credentials.port.to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", credentials.connect_timeout.as_secs().max(1)),
    ];
    if let Some(key_file) = &credentials.key_file {
        args.push("-i".to_string());
        args.push(expand_home(key_file).display().to_string());
    }
    if let Some(user) = &credentials.username {
        args.push("-l".to_string());
        args.push(user.clone());
    }
    args.push(credentials.host.clone());
    args
}

fn check_key_file(path: &Path) -> Result<()> {
    std::fs::File::open(path).map(drop).map_err(|e| {
        error!("Cannot read private key {}: {}", path.display(), e);
        Error::Auth(format!("cannot read private key '{}': {e}", path.display()))
    })
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Find `program` on PATH, or check it directly when it is a path.
fn resolve_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let extensions: &[&str] = if cfg!(windows) { &["exe", ""] } else { &[""] };
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .flat_map(|dir| {
            extensions
                .iter()
                .map(move |ext| dir.join(program).with_extension(ext))
        })
        .find(|candidate| candidate.is_file())
}

fn pty_size(dimensions: Dimensions) -> PtySize {
    PtySize {
        rows: dimensions.rows,
        cols: dimensions.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// A program ready to be started under a PTY.
#[derive(Debug)]
pub struct PtyChannel {
    program: PathBuf,
    args: Vec<String>,
}

impl PtyChannel {
    /// Program that will be run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Its arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Channel for PtyChannel {
    fn request_shell(&mut self, request: &PtyRequest) -> Result<ShellHandle> {
        info!(
            "Spawning PTY: program='{}' args={:?}, term={}, dimensions={}",
            self.program.display(),
            self.args,
            request.term,
            request.dimensions
        );

        let pair = native_pty_system()
            .openpty(pty_size(request.dimensions))
            .map_err(|e| {
                error!("Failed to open PTY: {}", e);
                Error::SessionStart(format!("Failed to open PTY: {e}"))
            })?;

        let mut cmd = CommandBuilder::new(&self.program);
        cmd.args(&self.args);
        cmd.env("TERM", &request.term);

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            error!("Failed to spawn '{}': {}", self.program.display(), e);
            Error::SessionStart(format!("Failed to spawn command: {e}"))
        })?;
        // Only the child may hold the slave, or the master never sees EOF.
        drop(pair.slave);

        let child: SharedChild = Arc::new(Mutex::new(child));
        let control = PtyControl {
            master: Mutex::new(None),
            child: Arc::clone(&child),
            closed: AtomicBool::new(false),
        };

        let writer = pair.master.take_writer().map_err(|e| {
            error!("Failed to take PTY writer: {}", e);
            control.close();
            Error::SessionStart(format!("Failed to take writer: {e}"))
        })?;

        let reader = pair.master.try_clone_reader().map_err(|e| {
            error!("Failed to clone PTY reader: {}", e);
            control.close();
            Error::SessionStart(format!("Failed to clone reader: {e}"))
        })?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || forward_output(reader, tx))
            .map_err(|e| {
                control.close();
                Error::SessionStart(format!("Failed to start PTY reader: {e}"))
            })?;

        if let Ok(mut master) = control.master.lock() {
            *master = Some(pair.master);
        }

        info!("PTY spawned successfully: program='{}'", self.program.display());

        Ok(ShellHandle {
            reader: Box::new(PtyReader {
                output: rx,
                pending: Vec::new(),
                eof: false,
                exit_code: None,
                child,
            }),
            writer: Box::new(PtyWriter { writer }),
            control: Box::new(control),
        })
    }
}

/// Message from the reader thread.
enum Output {
    Data(Vec<u8>),
    Eof,
    Failed(std::io::Error),
}

/// Blocking PTY reads, forwarded until end of output or until nobody listens.
fn forward_output(mut reader: Box<dyn Read + Send>, tx: Sender<Output>) {
    let mut buffer = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                let _ = tx.send(Output::Eof);
                break;
            }
            Ok(n) => {
                if tx.send(Output::Data(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = tx.send(Output::Failed(e));
                break;
            }
        }
    }
    debug!("PTY reader thread finished");
}

struct PtyReader {
    output: Receiver<Output>,
    /// Received bytes that did not fit the caller's buffer
    pending: Vec<u8>,
    eof: bool,
    exit_code: Option<i32>,
    child: SharedChild,
}

impl PtyReader {
    /// Reap the child without blocking.
    fn poll_exit(&mut self) -> Option<i32> {
        if self.exit_code.is_none() {
            let mut child = self.child.lock().ok()?;
            if let Ok(Some(status)) = child.try_wait() {
                self.exit_code = Some(status.exit_code() as i32);
            }
        }
        self.exit_code
    }

    /// Poll for the child's exit for at most `grace`.
    fn wait_exit(&mut self, grace: Duration) -> Option<i32> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(code) = self.poll_exit() {
                return Some(code);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(EXIT_POLL);
        }
    }
}

impl ShellReader for PtyReader {
    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pending.is_empty() {
            if self.eof {
                thread::sleep(timeout.min(EXIT_POLL));
                return Ok(0);
            }
            match self.output.recv_timeout(timeout) {
                Ok(Output::Data(data)) => self.pending = data,
                Ok(Output::Eof) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("PTY output ended");
                    self.eof = true;
                    return Ok(0);
                }
                Ok(Output::Failed(e)) => {
                    // Linux reports EIO once the child side is gone
                    if self.wait_exit(EXIT_GRACE).is_some() {
                        debug!("PTY read ended after child exit: {}", e);
                        self.eof = true;
                        return Ok(0);
                    }
                    error!("PTY read failed: {}", e);
                    return Err(Error::Io(e));
                }
                Err(RecvTimeoutError::Timeout) => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn exit_status_ready(&mut self) -> bool {
        self.eof && self.pending.is_empty() && self.poll_exit().is_some()
    }

    fn exit_status(&mut self) -> Result<i32> {
        if let Some(code) = self.poll_exit() {
            return Ok(code);
        }
        let mut child = self
            .child
            .lock()
            .map_err(|e| Error::Transport(format!("Lock error: {e}")))?;
        let status = child.wait()?;
        let code = status.exit_code() as i32;
        self.exit_code = Some(code);
        Ok(code)
    }
}

struct PtyWriter {
    writer: Box<dyn Write + Send>,
}

impl ShellWriter for PtyWriter {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        debug!("Writing {} bytes to PTY", data.len());
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }
}

struct PtyControl {
    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    child: SharedChild,
    closed: AtomicBool,
}

impl ShellControl for PtyControl {
    fn resize(&self, dimensions: Dimensions) -> Result<()> {
        info!("Resizing PTY to {}", dimensions);
        let master = self
            .master
            .lock()
            .map_err(|e| Error::Transport(format!("Lock error: {e}")))?;
        let master = master.as_ref().ok_or(Error::SessionClosed)?;
        master
            .resize(pty_size(dimensions))
            .map_err(|e| Error::Transport(format!("Resize failed: {e}")))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing PTY channel");

        if let Ok(mut child) = self.child.lock() {
            if matches!(child.try_wait(), Ok(None)) {
                if let Err(e) = child.kill() {
                    warn!("Failed to kill PTY child: {}", e);
                }
            }
        }
        if let Ok(mut master) = self.master.lock() {
            master.take();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ShellHandle {
        let connector = PtyConnector::command("/bin/sh", ["-c", script]);
        let mut channel = connector.open(&Credentials::new("localhost")).unwrap();
        channel
            .request_shell(&PtyRequest::new("xterm", Dimensions::new(24, 80)))
            .unwrap()
    }

    /// Read until the exit status is ready or the deadline passes.
    fn drain(reader: &mut dyn ShellReader) -> (Vec<u8>, Option<i32>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut output = Vec::new();
        let mut buf = [0u8; 256];
        while Instant::now() < deadline {
            let n = reader
                .read_available(&mut buf, Duration::from_millis(50))
                .unwrap();
            output.extend_from_slice(&buf[..n]);
            if reader.exit_status_ready() {
                return (output, Some(reader.exit_status().unwrap()));
            }
        }
        (output, None)
    }

    #[test]
    fn test_missing_program_is_transport_error() {
        let connector = PtyConnector::command("definitely-not-a-real-program-xyz", Vec::<String>::new());
        let result = connector.open(&Credentials::new("localhost"));
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let connector = PtyConnector::ssh("/bin/sh");
        let creds = Credentials::new("example.org").with_key_file("/nonexistent/id_ed25519");
        assert!(matches!(connector.open(&creds), Err(Error::Auth(_))));
    }

    #[test]
    fn test_ssh_arguments() {
        let creds = Credentials::new("example.org")
            .with_port(2222)
            .with_username("alice")
            .with_key_file("/keys/id");
        assert_eq!(
            ssh_arguments(&creds),
            vec![
                "-tt",
                "-p",
                "2222",
                "-o",
                "ConnectTimeout=10",
                "-i",
                "/keys/id",
                "-l",
                "alice",
                "example.org"
            ]
        );

        let minimal = ssh_arguments(&Credentials::new("host"));
        assert_eq!(minimal.last().map(String::as_str), Some("host"));
        assert!(!minimal.contains(&"-l".to_string()));
    }

    #[test]
    fn test_resolve_program() {
        assert_eq!(resolve_program("/bin/sh"), Some(PathBuf::from("/bin/sh")));
        assert!(resolve_program("sh").is_some());
        assert!(resolve_program("/nonexistent/sh").is_none());
    }

    #[test]
    fn test_output_and_exit_code() {
        let mut shell = sh("printf hello; exit 3");
        let (output, code) = drain(shell.reader.as_mut());
        assert!(String::from_utf8_lossy(&output).contains("hello"));
        assert_eq!(code, Some(3));
        shell.control.close();
    }

    #[test]
    fn test_exit_reported_with_background_job() {
        let mut shell = sh("sleep 20 & printf done; exit 4");
        let (output, code) = drain(shell.reader.as_mut());
        assert!(String::from_utf8_lossy(&output).contains("done"));
        assert_eq!(code, Some(4));
        shell.control.close();
    }

    #[test]
    fn test_term_is_exported() {
        let connector = PtyConnector::command("/bin/sh", ["-c", "printf \"[$TERM]\""]);
        let mut channel = connector.open(&Credentials::new("localhost")).unwrap();
        let mut shell = channel
            .request_shell(&PtyRequest::new("vt100", Dimensions::new(24, 80)))
            .unwrap();
        let (output, _) = drain(shell.reader.as_mut());
        assert!(String::from_utf8_lossy(&output).contains("[vt100]"));
    }

    #[test]
    fn test_write_is_echoed() {
        let mut shell = sh("read line; printf \"got:$line\"");
        shell.writer.write(b"ping\n").unwrap();
        let (output, code) = drain(shell.reader.as_mut());
        assert!(String::from_utf8_lossy(&output).contains("got:ping"));
        assert_eq!(code, Some(0));
    }

    #[test]
    fn test_timed_read_returns_zero_when_idle() {
        let mut shell = sh("sleep 5");
        let mut buf = [0u8; 64];
        let start = Instant::now();
        let n = shell
            .reader
            .read_available(&mut buf, Duration::from_millis(100))
            .unwrap();
        assert_eq!(n, 0);
        assert!(start.elapsed() >= Duration::from_millis(90));
        shell.control.close();
    }

    #[test]
    fn test_resize_and_close() {
        let mut shell = sh("sleep 5");
        assert!(shell.control.resize(Dimensions::new(40, 120)).is_ok());

        shell.control.close();
        shell.control.close();
        assert!(matches!(
            shell.control.resize(Dimensions::new(10, 10)),
            Err(Error::SessionClosed)
        ));

        // killed child: output ends and an exit status becomes available
        let (_, code) = drain(shell.reader.as_mut());
        assert!(code.is_some());
    }
}
