//! Operator console: the single reader of standard input.
//!
//! A background thread reads stdin line by line.  Lines starting with `/`
//! are operator commands ([`OperatorCommand`]); everything else is treated
//! as something the found person said (typed in by the operator during
//! Wizard-of-Oz runs) or as a confirmation keypress.
//!
//! [`Console`] is cheap to clone; all clones share the same channels, so the
//! keyboard listener, the WoZ confirmation prompt and the command loop can
//! each hold one.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

/// Commands an operator can type at the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    ToggleHuman,
    ToggleDebris,
    ToggleInjury,
    /// Force the mission into its next phase.
    NextPhase,
    Quit,
}

impl OperatorCommand {
    /// Parse `/h`, `/human`, `/next`, ...  Returns `None` for anything else.
    pub fn parse(line: &str) -> Option<Self> {
        let cmd = line.trim().strip_prefix('/')?.to_lowercase();
        match cmd.as_str() {
            "h" | "human" => Some(OperatorCommand::ToggleHuman),
            "d" | "debris" => Some(OperatorCommand::ToggleDebris),
            "i" | "injury" => Some(OperatorCommand::ToggleInjury),
            "n" | "next" => Some(OperatorCommand::NextPhase),
            "q" | "quit" => Some(OperatorCommand::Quit),
            _ => None,
        }
    }
}

/// The console channel was closed (stdin reached EOF or the reader died).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleClosed;

#[derive(Clone)]
pub struct Console {
    lines: Arc<Mutex<Receiver<String>>>,
    commands: Arc<Mutex<Receiver<OperatorCommand>>>,
}

impl Console {
    /// Spawn the stdin reader thread.
    pub fn stdin() -> Self {
        let (line_tx, line_rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        thread::Builder::new()
            .name("console-stdin".into())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => {
                            if !route(line, &line_tx, &cmd_tx) {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "stdin read failed");
                            break;
                        }
                    }
                }
                debug!("console reader exiting");
            })
            .map(|_| ())
            .unwrap_or_else(|e| warn!(error = %e, "could not start console reader"));
        Self::from_channels(line_rx, cmd_rx)
    }

    /// Build a console over existing channels (tests, scripted sessions).
    pub fn from_channels(lines: Receiver<String>, commands: Receiver<OperatorCommand>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
            commands: Arc::new(Mutex::new(commands)),
        }
    }

    /// Build a console fed by the returned sender, routing `/` lines to
    /// commands exactly like the stdin reader does.
    pub fn pipe() -> (ConsoleFeed, Self) {
        let (line_tx, line_rx) = mpsc::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        (
            ConsoleFeed { line_tx, cmd_tx },
            Self::from_channels(line_rx, cmd_rx),
        )
    }

    /// Wait up to `timeout` for the next non-command line.
    pub fn next_line(&self, timeout: Duration) -> Result<Option<String>, ConsoleClosed> {
        let Ok(rx) = self.lines.lock() else {
            return Err(ConsoleClosed);
        };
        match rx.recv_timeout(timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ConsoleClosed),
        }
    }

    /// Block until the next line arrives.
    pub fn wait_line(&self) -> Result<String, ConsoleClosed> {
        let rx = self.lines.lock().map_err(|_| ConsoleClosed)?;
        rx.recv().map_err(|_| ConsoleClosed)
    }

    /// Drain every pending operator command without blocking.
    pub fn drain_commands(&self) -> Vec<OperatorCommand> {
        let mut out = Vec::new();
        if let Ok(rx) = self.commands.lock() {
            loop {
                match rx.try_recv() {
                    Ok(cmd) => out.push(cmd),
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
        }
        out
    }
}

/// Writing end of [`Console::pipe`].
#[derive(Clone)]
pub struct ConsoleFeed {
    line_tx: Sender<String>,
    cmd_tx: Sender<OperatorCommand>,
}

impl ConsoleFeed {
    pub fn send(&self, line: impl Into<String>) -> bool {
        route(line.into(), &self.line_tx, &self.cmd_tx)
    }
}

/// Returns `false` once the receiving side is gone.
fn route(line: String, line_tx: &Sender<String>, cmd_tx: &Sender<OperatorCommand>) -> bool {
    if line.trim_start().starts_with('/') {
        match OperatorCommand::parse(&line) {
            Some(cmd) => cmd_tx.send(cmd).is_ok(),
            None => {
                warn!(line = line.trim(), "unknown operator command");
                true
            }
        }
    } else {
        line_tx.send(line).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_commands() {
        assert_eq!(OperatorCommand::parse("/h"), Some(OperatorCommand::ToggleHuman));
        assert_eq!(OperatorCommand::parse(" /Debris "), Some(OperatorCommand::ToggleDebris));
        assert_eq!(OperatorCommand::parse("/next"), Some(OperatorCommand::NextPhase));
        assert_eq!(OperatorCommand::parse("/dance"), None);
        assert_eq!(OperatorCommand::parse("next"), None);
    }

    #[test]
    fn commands_and_lines_are_routed_separately() {
        let (feed, console) = Console::pipe();
        feed.send("/i");
        feed.send("my arm hurts");
        feed.send("/q");

        assert_eq!(
            console.next_line(Duration::from_millis(50)).unwrap().as_deref(),
            Some("my arm hurts")
        );
        assert_eq!(
            console.drain_commands(),
            vec![OperatorCommand::ToggleInjury, OperatorCommand::Quit]
        );
        assert!(console.drain_commands().is_empty());
    }

    #[test]
    fn next_line_times_out_with_none() {
        let (_feed, console) = Console::pipe();
        assert_eq!(console.next_line(Duration::from_millis(10)), Ok(None));
    }

    #[test]
    fn dropped_feed_closes_console() {
        let (feed, console) = Console::pipe();
        drop(feed);
        assert_eq!(console.next_line(Duration::from_millis(10)), Err(ConsoleClosed));
        assert_eq!(console.wait_line(), Err(ConsoleClosed));
    }
}
