//! Wizard-of-Oz backend: a human operator plays the robot.
//!
//! Each call is echoed to the console as `ACTION[name](k=v, ...) reason=...`
//! and appended to `<artifacts>/action_calls.jsonl`.  With manual
//! confirmation on, the call waits for the operator to press Enter before
//! returning.  Reports are written to `<artifacts>/reports/`.
//!
//! Every result is `success = true, simulated = true`, except a report that
//! cannot be written to disk.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use colored::Colorize;
use rescue_types::{ActionResult, DebrisStrategy, Pose};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::call_ledger::CallLedger;
use crate::capability::{self, ActionCapability};
use crate::console::Console;

const BACKEND: &str = "woz";

/// Something that blocks until the operator acknowledges a prompt.
pub trait Confirmation: Send {
    fn confirm(&mut self);
}

impl Confirmation for Console {
    fn confirm(&mut self) {
        if self.wait_line().is_err() {
            warn!("console closed while waiting for operator confirmation");
        }
    }
}

pub struct WozActions {
    ledger: CallLedger,
    reports_dir: PathBuf,
    console: Box<dyn Write + Send>,
    confirmation: Option<Box<dyn Confirmation>>,
}

impl WozActions {
    /// Log to `<artifacts_dir>/action_calls.jsonl` and echo to stdout.
    pub fn new(artifacts_dir: impl AsRef<Path>) -> Self {
        let dir = artifacts_dir.as_ref();
        Self {
            ledger: CallLedger::new(dir.join("action_calls.jsonl")),
            reports_dir: dir.join("reports"),
            console: Box::new(io::stdout()),
            confirmation: None,
        }
    }

    /// Wait for the operator after every call.
    pub fn with_confirmation(mut self, confirmation: Box<dyn Confirmation>) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = console;
        self
    }

    pub fn ledger(&self) -> &CallLedger {
        &self.ledger
    }

    fn placeholder(&mut self, action: &str, args: Value, reason: &str) -> ActionResult {
        let line = format!("ACTION[{action}]({}) reason={reason}", render_args(&args));
        let _ = writeln!(self.console, "{}", line.bold().magenta());

        if let Some(confirmation) = self.confirmation.as_mut() {
            let _ = write!(self.console, "{}", "  press Enter when done ... ".dimmed());
            let _ = self.console.flush();
            confirmation.confirm();
        }

        let result = ActionResult::ok(json!({ "placeholder": true, "action": action }), true);
        self.ledger.record(BACKEND, action, args, reason, &result);
        result
    }
}

/// Write `report` as pretty JSON to `<reports_dir>/report_<timestamp>.json`.
pub(crate) fn write_report_file(reports_dir: &Path, report: &Value) -> io::Result<PathBuf> {
    fs::create_dir_all(reports_dir)?;
    let name = format!("report_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    let path = reports_dir.join(name);
    let body = serde_json::to_string_pretty(report).map_err(io::Error::other)?;
    fs::write(&path, body)?;
    Ok(path)
}

/// `k=v, k=v` rendering of a JSON object; other values render as-is.
fn render_args(args: &Value) -> String {
    match args {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s:?}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl ActionCapability for WozActions {
    fn navigate_to(&mut self, target: Pose, reason: &str) -> ActionResult {
        self.placeholder(
            capability::NAVIGATE_TO,
            json!({ "x": target.x, "y": target.y, "yaw": target.yaw }),
            reason,
        )
    }

    fn explore_step(&mut self, reason: &str) -> ActionResult {
        self.placeholder(capability::EXPLORE_STEP, json!({}), reason)
    }

    fn stop(&mut self, reason: &str) -> ActionResult {
        self.placeholder(capability::STOP, json!({}), reason)
    }

    fn speak(&mut self, text: &str, reason: &str) -> ActionResult {
        self.placeholder(capability::SPEAK, json!({ "text": text }), reason)
    }

    fn clear_debris(&mut self, strategy: DebrisStrategy, reason: &str) -> ActionResult {
        self.placeholder(capability::CLEAR_DEBRIS, json!({ "strategy": strategy.as_str() }), reason)
    }

    fn scan_injuries(&mut self, reason: &str) -> ActionResult {
        self.placeholder(capability::SCAN_INJURIES, json!({}), reason)
    }

    fn send_report(&mut self, report: &Value, reason: &str) -> ActionResult {
        let result = match write_report_file(&self.reports_dir, report) {
            Ok(path) => {
                info!(path = %path.display(), "report written");
                let _ = writeln!(
                    self.console,
                    "{} {}",
                    "REPORT".bold().green(),
                    path.display()
                );
                ActionResult::ok(json!({ "path": path.display().to_string() }), true)
            }
            Err(e) => {
                warn!(error = %e, "could not write report");
                ActionResult::failed(json!({ "error": e.to_string() }), true)
            }
        };
        self.ledger.record(
            BACKEND,
            capability::SEND_REPORT,
            json!({ "bytes": report.to_string().len() }),
            reason,
            &result,
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use tempfile::TempDir;

    fn quiet(dir: &TempDir) -> WozActions {
        WozActions::new(dir.path()).with_console(Box::new(io::sink()))
    }

    struct CountingConfirm(Arc<AtomicUsize>);

    impl Confirmation for CountingConfirm {
        fn confirm(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn every_call_is_simulated_success_and_logged() {
        let dir = TempDir::new().unwrap();
        let mut woz = quiet(&dir);

        assert!(woz.speak("Hello", "phase_announce").success);
        assert!(woz.navigate_to(Pose::new(1.0, 2.0, 0.0), "approach").simulated);
        assert!(woz.clear_debris(DebrisStrategy::MarkOnly, "debris").success);

        let records = woz.ledger().read_all().unwrap();
        let actions: Vec<_> = records.iter().map(|r| r.action.as_str()).collect();
        assert_eq!(actions, vec!["speak", "navigate_to", "clear_debris"]);
        assert_eq!(records[0].args["text"], "Hello");
        assert_eq!(records[2].args["strategy"], "mark_only");
        assert_eq!(records[1].reason, "approach");
    }

    #[test]
    fn manual_confirmation_waits_once_per_call() {
        let dir = TempDir::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let mut woz = quiet(&dir).with_confirmation(Box::new(CountingConfirm(count.clone())));

        woz.explore_step("search");
        woz.stop("shutdown");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn report_is_written_to_reports_dir() {
        let dir = TempDir::new().unwrap();
        let mut woz = quiet(&dir);

        let result = woz.send_report(&json!({ "claims": [] }), "final_report");
        assert!(result.success);

        let path = PathBuf::from(result.details["path"].as_str().unwrap());
        assert!(path.starts_with(dir.path().join("reports")));
        let body: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(body["claims"], json!([]));
    }

    #[test]
    fn args_render_as_key_value_pairs() {
        assert_eq!(render_args(&json!({ "text": "hi", "n": 2 })), "n=2, text=\"hi\"");
        assert_eq!(render_args(&json!({})), "");
    }
}
