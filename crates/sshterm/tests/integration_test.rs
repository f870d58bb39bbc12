//! Integration tests for the sshterm client: real PTY, session engine and
//! renderer wired together the way the binary does it.

#![cfg(unix)]

use std::time::Duration;

use sshterm::{event_loop, Cli, Outcome, Renderer};
use sshterm_core::{Credentials, Dimensions, SessionSettings, SessionState};
use sshterm_session::Session;
use sshterm_stream::{Interpreter, PtyConnector, SequencePolicy};
use tokio::sync::mpsc;

fn settings() -> SessionSettings {
    SessionSettings {
        poll_interval_ms: 20,
        join_timeout_ms: 1000,
        ..SessionSettings::default()
    }
}

async fn run_script(script: &str, policy: SequencePolicy) -> (Outcome, String, Session) {
    let connector = PtyConnector::command("/bin/sh", ["-c", script]);
    let (session, events) = Session::connect(
        &connector,
        &Credentials::new("localhost"),
        settings(),
        Interpreter::new(policy),
    )
    .unwrap();
    session.start("xterm", Dimensions::new(24, 80)).unwrap();

    let (_input_tx, input_rx) = mpsc::unbounded_channel();
    let mut renderer = Renderer::new(Vec::new());
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        event_loop(&session, events.into_async(), input_rx, &mut renderer),
    )
    .await
    .expect("session did not finish")
    .unwrap();

    let output = String::from_utf8(renderer.into_inner()).unwrap();
    (outcome, output, session)
}

#[tokio::test]
async fn test_colored_output_and_exit_status() {
    let (outcome, output, session) =
        run_script("printf '\\033[32mok\\033[0m done'; exit 4", SequencePolicy::Strict).await;

    assert_eq!(outcome, Outcome::Exited(4));
    assert_eq!(outcome.exit_code(), 4);
    assert!(output.contains("\x1b[38;2;0;205;0mok"), "output: {output:?}");
    assert!(output.contains(" done"));
    assert_eq!(session.state(), SessionState::Exited(4));
    session.close();
    assert_eq!(session.state(), SessionState::Exited(4));
}

#[tokio::test]
async fn test_private_modes_hidden_with_any_final_byte() {
    let (outcome, output, session) = run_script(
        "printf '\\033[?25lhidden\\033[?25h'; exit 0",
        SequencePolicy::AnyFinalByte,
    )
    .await;

    assert_eq!(outcome, Outcome::Exited(0));
    assert!(output.contains("hidden"));
    assert!(!output.contains("?25"));
    session.close();
}

#[test]
fn test_cli_local_mode_resolves() {
    use clap::Parser;

    let cli = Cli::try_parse_from(["sshterm", "--local", "--term", "vt100"]).unwrap();
    let config = cli.load_config().unwrap();
    assert_eq!(config.terminal.term, "vt100");
    assert_eq!(cli.credentials(&config).unwrap().host, "localhost");
}
