//! Interactive client: raw terminal, keyboard forwarding, output rendering.
//!
//! ```text
//!  input thread ── crossterm events ──┐
//!                                     ├── event_loop ── send_key/resize ──> Session
//!  Session ── SessionEvents (async) ──┘        └── render ──> stdout
//! ```

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, DisableBracketedPaste, EnableBracketedPaste, Event};
use crossterm::{execute, terminal};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use sshterm_core::{ClientConfig, Credentials, Dimensions, SessionEvent};
use sshterm_session::Session;
use sshterm_stream::{Connector, Interpreter, SequencePolicy};

use crate::input::key_from_event;
use crate::render::Renderer;

/// How often the input thread checks whether it should stop.
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Exit status reported when the session failed.
const FAILURE_EXIT_CODE: i32 = 1;

/// How an interactive session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The remote process exited with this code
    Exited(i32),
    /// The channel failed
    Failed(String),
    /// Session events or local input ended without an exit status
    Closed,
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Exited(code) => *code,
            Outcome::Failed(_) => FAILURE_EXIT_CODE,
            Outcome::Closed => 0,
        }
    }
}

/// Raw mode and bracketed paste for the lifetime of the guard.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = Self;
        set_bracketed_paste(&mut io::stdout(), true)?;
        Ok(guard)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = set_bracketed_paste(&mut io::stdout(), false) {
            warn!("Failed to leave bracketed paste: {}", e);
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to leave raw mode: {}", e);
        }
    }
}

/// Pasted text then arrives as one `Event::Paste` instead of key presses.
fn set_bracketed_paste<W: Write>(out: &mut W, enabled: bool) -> io::Result<()> {
    if enabled {
        execute!(out, EnableBracketedPaste)
    } else {
        execute!(out, DisableBracketedPaste)
    }
}

/// Reads terminal events on a dedicated thread until stopped or the
/// receiver is gone.
struct InputThread {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl InputThread {
    fn spawn(tx: UnboundedSender<Event>) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("sshterm-input".to_string())
            .spawn(move || Self::run_loop(&flag, &tx))?;

        Ok(Self {
            handle: Some(handle),
            running,
        })
    }

    fn run_loop(running: &AtomicBool, tx: &UnboundedSender<Event>) {
        while running.load(Ordering::SeqCst) {
            match event::poll(INPUT_POLL) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("Input read error: {}", e),
                },
                Ok(false) => continue,
                Err(e) => {
                    warn!("Input poll failed: {}", e);
                    break;
                }
            }
        }
        debug!("Input thread finished");
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Input thread panicked");
            }
        }
    }
}

impl Drop for InputThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Route session events to the renderer and local input to the session
/// until the session ends or input stops.
pub async fn event_loop<W: Write>(
    session: &Session,
    mut events: UnboundedReceiver<SessionEvent>,
    mut input: UnboundedReceiver<Event>,
    renderer: &mut Renderer<W>,
) -> io::Result<Outcome> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::DataArrived(segments)) => renderer.render(&segments)?,
                Some(SessionEvent::Closed(code)) => return Ok(Outcome::Exited(code)),
                Some(SessionEvent::Error(message)) => return Ok(Outcome::Failed(message)),
                None => return Ok(Outcome::Closed),
            },
            ev = input.recv() => match ev {
                Some(ev) => forward_input(session, ev),
                None => return Ok(Outcome::Closed),
            },
        }
    }
}

fn forward_input(session: &Session, ev: Event) {
    match ev {
        Event::Key(key_event) => {
            if let Some(key) = key_from_event(&key_event) {
                session.send_key(&key);
            }
        }
        Event::Paste(text) => session.send_text(&text),
        Event::Resize(cols, rows) => match Dimensions::checked(rows, cols) {
            Ok(dimensions) => session.resize(dimensions),
            Err(e) => debug!("Ignoring resize: {}", e),
        },
        _ => {}
    }
}

/// Local terminal size, or the configured size when it cannot be queried.
fn initial_dimensions(config: &ClientConfig) -> Dimensions {
    terminal::size()
        .ok()
        .and_then(|(cols, rows)| Dimensions::checked(rows, cols).ok())
        .unwrap_or_else(|| config.terminal.dimensions())
}

/// Connect, run the interactive session to completion, restore the terminal.
pub async fn run(
    config: &ClientConfig,
    connector: &dyn Connector,
    credentials: &Credentials,
) -> anyhow::Result<Outcome> {
    let policy = if config.terminal.any_final_byte {
        SequencePolicy::AnyFinalByte
    } else {
        SequencePolicy::Strict
    };
    let (session, events) = Session::connect(
        connector,
        credentials,
        config.session.clone(),
        Interpreter::new(policy),
    )?;

    let dimensions = initial_dimensions(config);
    let raw_mode = RawMode::enable()?;
    session.start(&config.terminal.term, dimensions)?;

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let input_thread = InputThread::spawn(input_tx)?;

    let mut renderer = Renderer::new(io::stdout());
    let outcome = event_loop(&session, events.into_async(), input_rx, &mut renderer).await;

    session.close();
    drop(input_thread);
    if let Err(e) = renderer.reset() {
        warn!("Failed to reset colors: {}", e);
    }
    drop(raw_mode);

    let outcome = outcome?;
    info!("Session {} ended: {:?}", session.id(), outcome);
    Ok(outcome)
}
