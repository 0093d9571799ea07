//! HTTP client for the command center.
//!
//! Every call fails soft: an unreachable server returns `false` or an empty
//! list and is logged, at most once per [`ERROR_LOG_INTERVAL`] for event
//! posts so a dead server does not flood the log.
//!
//! Endpoints used:
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | `POST` | `/event` | one telemetry event |
//! | `GET` | `/operator-messages` | messages the robot should speak |
//! | `POST` | `/operator-messages/ack` | clear messages already spoken |

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rescue_types::MissionEvent;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorMessage {
    pub text: String,
    #[serde(default)]
    pub received_at: Option<String>,
}

#[derive(Deserialize)]
struct OperatorMessages {
    #[serde(default)]
    messages: Vec<OperatorMessage>,
}

pub struct CommandCenterClient {
    base_url: String,
    http: reqwest::blocking::Client,
    last_error_log: Mutex<Option<Instant>>,
}

impl CommandCenterClient {
    /// An empty `base_url` produces a disabled client.
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            http,
            last_error_log: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST one event.  `false` when disabled or the request failed.
    pub fn post_event(&self, event: &MissionEvent) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match self.http.post(format!("{}/event", self.base_url)).json(event).send() {
            Ok(resp) => {
                debug!(status = %resp.status(), "event posted");
                resp.status().is_success()
            }
            Err(e) => {
                self.warn_unreachable(&e);
                false
            }
        }
    }

    /// Messages queued by the operator for the robot to speak.
    pub fn operator_messages(&self) -> Vec<OperatorMessage> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let result = self
            .http
            .get(format!("{}/operator-messages", self.base_url))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<OperatorMessages>());
        match result {
            Ok(body) => body.messages,
            Err(e) => {
                debug!(error = %e, "operator messages unavailable");
                Vec::new()
            }
        }
    }

    /// Acknowledge the first `spoken` messages of the last poll.  Messages
    /// that arrived after the poll stay queued on the server.
    pub fn ack_spoken(&self, spoken: usize) -> bool {
        match spoken.checked_sub(1) {
            Some(last) => self.ack_operator_messages(last),
            None => true,
        }
    }

    /// Tell the server every message up to and including `after_index`
    /// (the index of the last message spoken) can be dropped.
    pub fn ack_operator_messages(&self, after_index: usize) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.http
            .post(format!("{}/operator-messages/ack", self.base_url))
            .json(&json!({ "after_index": after_index }))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn warn_unreachable(&self, error: &reqwest::Error) {
        let Ok(mut last) = self.last_error_log.lock() else {
            return;
        };
        let now = Instant::now();
        if last.is_none_or(|t| now.duration_since(t) >= ERROR_LOG_INTERVAL) {
            warn!(url = %self.base_url, error = %error, "command center unreachable");
            *last = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use rescue_types::EventPayload;

    const DEAD_URL: &str = "http://127.0.0.1:9";

    #[test]
    fn empty_url_disables_the_client() {
        let client = CommandCenterClient::new("  ", Duration::from_millis(200));
        assert!(!client.is_enabled());
        let event = MissionEvent::new("test", EventPayload::notice("x"));
        assert!(!client.post_event(&event));
        assert!(client.operator_messages().is_empty());
        assert!(!client.ack_operator_messages(1));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = CommandCenterClient::new("http://cc.local:8000/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://cc.local:8000");
    }

    #[test]
    fn unreachable_server_fails_soft() {
        let client = CommandCenterClient::new(DEAD_URL, Duration::from_millis(200));
        let event = MissionEvent::new("test", EventPayload::notice("x"));
        assert!(!client.post_event(&event));
        assert!(!client.post_event(&event));
        assert!(client.operator_messages().is_empty());
        assert!(!client.ack_operator_messages(0));
    }

    /// Accept one HTTP request, answer 200 and hand back its body.
    fn capture_request_body() -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    return String::new();
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).into_owned();
                let Some(split) = text.find("\r\n\r\n") else {
                    continue;
                };
                let len = text[..split]
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                let start = split + 4;
                if buf.len() >= start + len {
                    stream
                        .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                        .unwrap();
                    return String::from_utf8_lossy(&buf[start..start + len]).into_owned();
                }
            }
        });
        (url, handle)
    }

    #[test]
    fn ack_names_the_last_spoken_index() {
        let (url, server) = capture_request_body();
        let client = CommandCenterClient::new(&url, Duration::from_secs(2));

        assert!(client.ack_spoken(2));

        let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(body, json!({ "after_index": 1 }));
    }

    #[test]
    fn nothing_spoken_sends_no_ack() {
        // Would fail if it tried to reach the dead server.
        let client = CommandCenterClient::new(DEAD_URL, Duration::from_millis(200));
        assert!(client.ack_spoken(0));
    }

    #[test]
    fn operator_messages_tolerate_missing_fields() {
        let body: OperatorMessages =
            serde_json::from_str(r#"{"messages":[{"text":"Help is 5 minutes out"}]}"#).unwrap();
        assert_eq!(body.messages[0].text, "Help is 5 minutes out");
        assert!(body.messages[0].received_at.is_none());

        let empty: OperatorMessages = serde_json::from_str("{}").unwrap();
        assert!(empty.messages.is_empty());
    }
}
