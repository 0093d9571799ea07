//! Listening for the found person's reply.
//!
//! [`Listener::listen`] blocks for at most `timeout` and returns
//! `Ok(Some(text))` for a reply, `Ok(None)` for silence, or
//! [`ListenError::Unavailable`] when the channel itself cannot be used.
//! [`FallbackListener`] tries its channels in order and moves on when one is
//! unavailable.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::console::Console;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListenError {
    #[error("listening channel unavailable: {0}")]
    Unavailable(String),
}

pub trait Listener: Send {
    fn name(&self) -> &str;

    fn listen(&mut self, timeout: Duration) -> Result<Option<String>, ListenError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Keyboard
// ────────────────────────────────────────────────────────────────────────────

/// Replies typed at the operator console.  Blank lines are ignored.
pub struct KeyboardListener {
    console: Console,
}

impl KeyboardListener {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl Listener for KeyboardListener {
    fn name(&self) -> &str {
        "keyboard"
    }

    fn listen(&mut self, timeout: Duration) -> Result<Option<String>, ListenError> {
        // No deadline when `timeout` does not fit after now.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.console.next_line(remaining) {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Ok(Some(line.trim().to_string())),
                Ok(None) => return Ok(None),
                Err(_) => return Err(ListenError::Unavailable("console closed".into())),
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted
// ────────────────────────────────────────────────────────────────────────────

/// Plays back a fixed sequence of replies; `None` entries are silence.
/// Once the sequence is exhausted the listener reports itself unavailable.
#[derive(Debug, Clone, Default)]
pub struct ScriptedListener {
    replies: VecDeque<Option<String>>,
}

impl ScriptedListener {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(|r| r.map(Into::into)).collect(),
        }
    }

    /// One reply per non-empty line; a line containing only `-` is silence.
    pub fn from_lines(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| (l != "-").then(|| l.to_string())),
        )
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl Listener for ScriptedListener {
    fn name(&self) -> &str {
        "scripted"
    }

    fn listen(&mut self, _timeout: Duration) -> Result<Option<String>, ListenError> {
        self.replies
            .pop_front()
            .ok_or_else(|| ListenError::Unavailable("scripted replies exhausted".into()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fallback chain
// ────────────────────────────────────────────────────────────────────────────

/// Tries each channel in order; an unavailable channel is skipped.  Silence
/// from an available channel is final for that call.
pub struct FallbackListener {
    channels: Vec<Box<dyn Listener>>,
}

impl FallbackListener {
    pub fn new(channels: Vec<Box<dyn Listener>>) -> Self {
        Self { channels }
    }
}

impl Listener for FallbackListener {
    fn name(&self) -> &str {
        "fallback"
    }

    fn listen(&mut self, timeout: Duration) -> Result<Option<String>, ListenError> {
        for channel in &mut self.channels {
            match channel.listen(timeout) {
                Ok(reply) => {
                    debug!(channel = channel.name(), heard = reply.is_some(), "listen finished");
                    return Ok(reply);
                }
                Err(e) => warn!(channel = channel.name(), error = %e, "listener unavailable, trying next"),
            }
        }
        Err(ListenError::Unavailable("no listening channel available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Listener for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn listen(&mut self, _timeout: Duration) -> Result<Option<String>, ListenError> {
            Err(ListenError::Unavailable("no microphone".into()))
        }
    }

    #[test]
    fn scripted_listener_plays_back_then_becomes_unavailable() {
        let mut l = ScriptedListener::new([Some("yes"), None]);
        assert_eq!(l.listen(Duration::ZERO), Ok(Some("yes".to_string())));
        assert_eq!(l.listen(Duration::ZERO), Ok(None));
        assert!(matches!(l.listen(Duration::ZERO), Err(ListenError::Unavailable(_))));
    }

    #[test]
    fn scripted_listener_from_lines() {
        let l = ScriptedListener::from_lines("my leg\n-\n\nyes\n");
        assert_eq!(l.remaining(), 3);
    }

    #[test]
    fn fallback_skips_unavailable_channels() {
        let mut l = FallbackListener::new(vec![
            Box::new(Broken),
            Box::new(ScriptedListener::new([Some("help")])),
        ]);
        assert_eq!(l.listen(Duration::ZERO), Ok(Some("help".to_string())));
    }

    #[test]
    fn fallback_fails_when_every_channel_is_down() {
        let mut l = FallbackListener::new(vec![Box::new(Broken), Box::new(Broken)]);
        assert!(l.listen(Duration::ZERO).is_err());
    }

    #[test]
    fn silence_from_first_channel_is_final() {
        let mut l = FallbackListener::new(vec![
            Box::new(ScriptedListener::new([None::<String>])),
            Box::new(ScriptedListener::new([Some("should not be heard")])),
        ]);
        assert_eq!(l.listen(Duration::ZERO), Ok(None));
    }

    #[test]
    fn keyboard_listener_skips_blank_lines() {
        let (feed, console) = Console::pipe();
        feed.send("   ");
        feed.send(" yes ");
        let mut l = KeyboardListener::new(console);
        assert_eq!(l.listen(Duration::from_millis(200)), Ok(Some("yes".to_string())));
    }

    #[test]
    fn keyboard_listener_accepts_unbounded_timeout() {
        let (feed, console) = Console::pipe();
        feed.send("still here");
        let mut l = KeyboardListener::new(console);
        assert_eq!(l.listen(Duration::MAX), Ok(Some("still here".to_string())));
    }

    #[test]
    fn keyboard_listener_times_out_to_silence() {
        let (_feed, console) = Console::pipe();
        let mut l = KeyboardListener::new(console);
        assert_eq!(l.listen(Duration::from_millis(10)), Ok(None));
    }

    #[test]
    fn keyboard_listener_unavailable_when_console_closed() {
        let (feed, console) = Console::pipe();
        drop(feed);
        let mut l = KeyboardListener::new(console);
        assert!(l.listen(Duration::from_millis(10)).is_err());
    }
}
