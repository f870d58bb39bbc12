//! Remote shell session engine.
//!
//! A [`Session`] owns one channel. Starting it requests a pseudo-terminal shell
//! and launches two pumps on their own threads:
//!
//! - the inbound pump reads with a bounded wait, runs the bytes through the
//!   stream interpreter and delivers `DataArrived` events
//! - the outbound pump drains the outbound queue and writes each buffer
//!
//! Whichever pump hits a terminal condition (remote exit, read or write
//! failure) tears the session down: it clears the running flag, wakes the
//! other pump and releases the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use sshterm_core::{
    Credentials, Dimensions, Error, Key, Result, SessionEvent, SessionId, SessionSettings,
    SessionState,
};
use sshterm_stream::{
    Channel, Connector, Interpreter, ParserState, PtyRequest, ShellControl, ShellReader,
    ShellWriter,
};

use crate::events::{EventEmitter, SessionEvents};
use crate::lock;
use crate::queue::{outbound_queue, Dequeued, OutboundReceiver, OutboundSender};

/// How often `close()` checks whether a pump has finished.
const JOIN_POLL: Duration = Duration::from_millis(5);

/// State shared between the session handle and its pumps.
struct Shared {
    id: SessionId,
    running: AtomicBool,
    state: Mutex<SessionState>,
    control: Mutex<Option<Arc<dyn ShellControl>>>,
    events: EventEmitter,
    outbound: OutboundSender,
}

impl Shared {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// Clear the running flag and move to `next` unless the session already
    /// finished. Both happen under the state lock, which `start` commits
    /// under too. Returns whether the session was running.
    fn halt(&self, next: SessionState) -> bool {
        let mut state = lock(&self.state);
        let was_running = self.running.swap(false, Ordering::SeqCst);
        if !state.is_finished() {
            info!(
                "Session state changed: id={}, {:?} → {:?}",
                self.id, *state, next
            );
            *state = next;
        }
        was_running
    }

    /// Release the channel. Only the first call reaches it.
    fn release_channel(&self) {
        let control = lock(&self.control).take();
        if let Some(control) = control {
            debug!("Releasing channel: id={}", self.id);
            control.close();
        }
    }

    /// Stop both pumps and release the channel after a terminal condition.
    fn teardown(&self, next: SessionState) {
        self.halt(next);
        self.outbound.shutdown();
        self.release_channel();
    }

    fn exited(&self, code: i32) {
        info!("Remote process exited: id={}, code={}", self.id, code);
        self.teardown(SessionState::Exited(code));
        self.events.finish(SessionEvent::Closed(code));
    }

    fn failed(&self, message: String) {
        error!("Session failed: id={}, {}", self.id, message);
        self.teardown(SessionState::Failed);
        self.events.finish(SessionEvent::Error(message));
    }
}

struct Pump {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// An interactive shell session over one channel.
///
/// All methods take `&self` and may be called from any thread.
pub struct Session {
    id: SessionId,
    settings: SessionSettings,
    interpreter: Interpreter,
    shared: Arc<Shared>,
    /// Held for the whole of `start`, which serializes starts
    channel: Mutex<Option<Box<dyn Channel>>>,
    outbound_rx: Mutex<Option<OutboundReceiver>>,
    pumps: Mutex<Vec<Pump>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session that owns `channel`, interpreting output with the
    /// strict terminator set.
    pub fn new(channel: Box<dyn Channel>, settings: SessionSettings) -> (Self, SessionEvents) {
        Self::with_interpreter(channel, settings, Interpreter::default())
    }

    /// Create a session with a specific interpreter.
    pub fn with_interpreter(
        channel: Box<dyn Channel>,
        settings: SessionSettings,
        interpreter: Interpreter,
    ) -> (Self, SessionEvents) {
        let id = SessionId::new();
        let (events, receiver) = EventEmitter::new();
        let (outbound, outbound_rx) = outbound_queue();

        info!(
            "Session created: id={}, poll={:?}, policy={:?}",
            id,
            settings.poll_interval(),
            interpreter.policy()
        );

        let shared = Arc::new(Shared {
            id,
            running: AtomicBool::new(false),
            state: Mutex::new(SessionState::Idle),
            control: Mutex::new(None),
            events,
            outbound,
        });

        let session = Self {
            id,
            settings,
            interpreter,
            shared,
            channel: Mutex::new(Some(channel)),
            outbound_rx: Mutex::new(Some(outbound_rx)),
            pumps: Mutex::new(Vec::new()),
        };
        (session, receiver)
    }

    /// Open a channel with `connector` and wrap it in a session.
    pub fn connect(
        connector: &dyn Connector,
        credentials: &Credentials,
        settings: SessionSettings,
        interpreter: Interpreter,
    ) -> Result<(Self, SessionEvents)> {
        info!("Connecting: {}", credentials);
        let channel = connector.open(credentials).map_err(|e| {
            error!("Failed to open channel to {}: {}", credentials, e);
            e
        })?;
        Ok(Self::with_interpreter(channel, settings, interpreter))
    }

    /// Get the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Whether the pumps are active.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Request a shell and start both pumps.
    ///
    /// A no-op on a running session. A failed request leaves the session idle,
    /// so it can be started again. Fails with `SessionClosed` once the session
    /// has finished.
    pub fn start(&self, term: &str, dimensions: Dimensions) -> Result<()> {
        let mut channel = lock(&self.channel);

        match self.shared.state() {
            SessionState::Running => {
                warn!("Session already running: id={}", self.id);
                return Ok(());
            }
            SessionState::Idle => {}
            _ => return Err(Error::SessionClosed),
        }

        let channel = channel.as_mut().ok_or(Error::SessionClosed)?;
        let dimensions = Dimensions::checked(dimensions.rows, dimensions.cols)?;

        info!(
            "Starting session: id={}, term={}, dimensions={}",
            self.id, term, dimensions
        );

        let shell = channel
            .request_shell(&PtyRequest::new(term, dimensions))
            .map_err(|e| {
                error!("Shell request failed: id={}, {}", self.id, e);
                match e {
                    Error::SessionStart(_) => e,
                    other => Error::SessionStart(other.to_string()),
                }
            })?;

        // held until both pumps are recorded, so a racing close() joins them
        let mut pumps = lock(&self.pumps);

        let outbound_rx = {
            let mut state = lock(&self.shared.state);
            // close() may have run while the shell was being requested
            if *state != SessionState::Idle {
                shell.control.close();
                return Err(Error::SessionClosed);
            }
            let Some(outbound_rx) = lock(&self.outbound_rx).take() else {
                shell.control.close();
                return Err(Error::SessionStart(
                    "outbound queue already consumed".to_string(),
                ));
            };
            *lock(&self.shared.control) = Some(Arc::from(shell.control));
            self.shared.running.store(true, Ordering::SeqCst);
            *state = SessionState::Running;
            outbound_rx
        };

        let inbound = {
            let shared = Arc::clone(&self.shared);
            let interpreter = self.interpreter;
            let settings = self.settings.clone();
            let reader = shell.reader;
            thread::Builder::new()
                .name("sshterm-inbound".to_string())
                .spawn(move || inbound_pump(shared, reader, interpreter, settings))
        };
        let inbound = match inbound {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.teardown(SessionState::Failed);
                return Err(Error::SessionStart(format!(
                    "Failed to start inbound pump: {e}"
                )));
            }
        };

        let outbound = {
            let shared = Arc::clone(&self.shared);
            let poll = self.settings.poll_interval();
            let writer = shell.writer;
            thread::Builder::new()
                .name("sshterm-outbound".to_string())
                .spawn(move || outbound_pump(shared, writer, outbound_rx, poll))
        };

        pumps.push(Pump {
            name: "inbound",
            handle: inbound,
        });
        match outbound {
            Ok(handle) => pumps.push(Pump {
                name: "outbound",
                handle,
            }),
            Err(e) => {
                self.shared.teardown(SessionState::Failed);
                return Err(Error::SessionStart(format!(
                    "Failed to start outbound pump: {e}"
                )));
            }
        }

        info!("Session started: id={}", self.id);
        Ok(())
    }

    /// Queue bytes for the remote end. Never blocks.
    ///
    /// Ignored when the session is not running or `data` is empty.
    pub fn send(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if !self.is_running() {
            debug!(
                "Dropping {} bytes, session not running: id={}",
                data.len(),
                self.id
            );
            return;
        }
        if !self.shared.outbound.enqueue(data.to_vec()) {
            debug!("Outbound queue closed: id={}", self.id);
        }
    }

    /// Send UTF-8 text.
    pub fn send_text(&self, text: &str) {
        self.send(text.as_bytes());
    }

    /// Send a key's terminal encoding.
    pub fn send_key(&self, key: &Key) {
        self.send(&key.encode());
    }

    /// Tell the remote end the window size changed. Best effort: failures are
    /// logged, never returned.
    pub fn resize(&self, dimensions: Dimensions) {
        if !self.is_running() {
            debug!("Ignoring resize, session not running: id={}", self.id);
            return;
        }
        if let Err(e) = Dimensions::checked(dimensions.rows, dimensions.cols) {
            warn!("Ignoring resize: id={}, {}", self.id, e);
            return;
        }

        let control = lock(&self.shared.control).clone();
        let Some(control) = control else {
            return;
        };
        match control.resize(dimensions) {
            Ok(()) => debug!("Resized: id={}, {}", self.id, dimensions),
            Err(e) => warn!("Resize failed: id={}, {}", self.id, e),
        }
    }

    /// Stop the session.
    ///
    /// Wakes both pumps, waits for each up to the join timeout, then releases
    /// the channel. Safe to call repeatedly and from any thread. No events are
    /// delivered after it returns.
    pub fn close(&self) {
        self.shared.events.silence();
        let was_running = self.shared.halt(SessionState::Closed);
        self.shared.outbound.shutdown();

        let pumps: Vec<Pump> = lock(&self.pumps).drain(..).collect();
        if was_running || !pumps.is_empty() {
            info!("Closing session: id={}", self.id);
        }

        let join_timeout = self.settings.join_timeout();
        for pump in pumps {
            join_with_timeout(self.id, pump, join_timeout);
        }

        self.shared.release_channel();
        lock(&self.channel).take();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Join a pump, detaching it if it does not finish in time.
fn join_with_timeout(id: SessionId, pump: Pump, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !pump.handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(
                "{} pump did not stop within {:?}, detaching: id={}",
                pump.name, timeout, id
            );
            return;
        }
        thread::sleep(JOIN_POLL);
    }
    if pump.handle.join().is_err() {
        error!("{} pump panicked: id={}", pump.name, id);
    } else {
        debug!("{} pump joined: id={}", pump.name, id);
    }
}

fn inbound_pump(
    shared: Arc<Shared>,
    mut reader: Box<dyn ShellReader>,
    interpreter: Interpreter,
    settings: SessionSettings,
) {
    let poll = settings.poll_interval();
    let mut buffer = vec![0u8; settings.read_buffer_size.max(1)];
    let mut state = ParserState::new();

    while shared.is_running() {
        match reader.read_available(&mut buffer, poll) {
            Ok(0) => {}
            Ok(n) => {
                debug!("Read {} bytes: id={}", n, shared.id);
                let (segments, next) = interpreter.interpret(&buffer[..n], state);
                state = next;
                if !segments.is_empty() {
                    shared.events.data(segments);
                }
            }
            Err(e) if !shared.is_running() => {
                debug!("Read ended during shutdown: id={}, {}", shared.id, e);
                break;
            }
            Err(e) => {
                shared.failed(format!("read failed: {e}"));
                break;
            }
        }

        if reader.exit_status_ready() {
            match reader.exit_status() {
                Ok(code) => shared.exited(code),
                Err(e) => shared.failed(format!("exit status unavailable: {e}")),
            }
            break;
        }
    }

    debug!("Inbound pump finished: id={}", shared.id);
}

fn outbound_pump(
    shared: Arc<Shared>,
    mut writer: Box<dyn ShellWriter>,
    queue: OutboundReceiver,
    poll: Duration,
) {
    loop {
        match queue.dequeue(poll) {
            Dequeued::TimedOut => {
                if !shared.is_running() {
                    break;
                }
            }
            Dequeued::Shutdown => break,
            Dequeued::Item(data) => {
                if !shared.is_running() {
                    break;
                }
                if let Err(e) = writer.write(&data) {
                    if shared.is_running() {
                        shared.failed(format!("write failed: {e}"));
                    }
                    break;
                }
                debug!("Wrote {} bytes: id={}", data.len(), shared.id);
            }
        }
    }

    debug!("Outbound pump finished: id={}", shared.id);
}
