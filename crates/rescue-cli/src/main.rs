//! `rescue-cli` – Rescue Robot Command Line Interface
//!
//! This binary is the operator's entry point for a mission.  It:
//!
//! 1. Loads `~/.rescue/config.toml` (writing defaults on first run) and
//!    applies `RESCUE_*` environment overrides.
//! 2. Probes the reasoner endpoint and, for the bridge backend, the robot
//!    bridge.
//! 3. Wires the chosen action backend, the listening channels, the evidence
//!    ledger and the event bus into a
//!    [`MissionController`][rescue_runtime::MissionController] and ticks it
//!    until the mission is done.
//! 4. Reads operator commands from the console (`/h`, `/d`, `/i` toggle
//!    detections, `/n` forces the next phase, `/q` quits) and relays
//!    command-center operator messages.
//! 5. Intercepts **Ctrl-C** so the robot is always told to `stop` before the
//!    process exits.

mod config;
mod probe;

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use rescue_hal::{
    ActionCapability, BridgeActions, BridgeCamera, BridgeClient, Camera, Console, FallbackListener,
    KeyboardListener, Listener, OperatorCommand, ScriptedListener, WozActions,
};
use rescue_kernel::Interval;
use rescue_memory::EvidenceLedger;
use rescue_middleware::{CommandCenterClient, EventBus, spawn_forwarder};
use rescue_perception::OperatorFlags;
use rescue_runtime::config::seconds;
use rescue_runtime::{LlmReasoner, MissionController, TickInput, init_tracing};

use crate::config::{Backend, Config};

const BRIDGE_TIMEOUT: Duration = Duration::from_secs(5);
const COMMAND_CENTER_TIMEOUT: Duration = Duration::from_secs(2);

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); RESCUE_LOG_FORMAT=json switches to
    // JSON lines.  User-facing output still uses println!.
    let _telemetry = init_tracing("rescue");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the robot …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; Ctrl-C will not stop the robot cleanly");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = load_config();
    println!(
        "  Backend {}  ·  script {:?}  ·  reasoner {}",
        cfg.backend.to_string().bold(),
        cfg.mission.script,
        if cfg.mission.use_reasoner { "on".green() } else { "off".dimmed() }
    );

    // ── Reachability ──────────────────────────────────────────────────────
    if cfg.mission.use_reasoner {
        print!("  Probing reasoner at {} … ", cfg.llm_url.dimmed());
        match probe::fetch_models(&cfg.llm_url) {
            Ok(models) => {
                println!("{} ({} model(s) available)", "online".green(), models.len());
                if !models.iter().any(|m| m.id == cfg.model) {
                    println!("  {} model {} not listed", "⚠".yellow(), cfg.model.bold());
                }
            }
            Err(e) => {
                println!("{}", "offline".yellow());
                println!("  {}", "Proposals will be skipped; the scripted mission still runs.".dimmed());
                info!(error = %e, "reasoner probe failed");
            }
        }
    }
    if cfg.backend == Backend::Bridge {
        print!("  Probing robot bridge at {} … ", cfg.bridge_url.dimmed());
        if probe::bridge_online(&cfg.bridge_url) {
            println!("{}", "online".green());
        } else {
            println!("{}", "offline".red());
        }
    }

    // ── Wiring ────────────────────────────────────────────────────────────
    let artifacts = cfg.artifacts_path();
    let console = Console::stdin();

    let (actions, mut camera) = match build_backend(&cfg, &artifacts, &console) {
        Ok(parts) => parts,
        Err(e) => {
            println!("{}: {}", "Backend error".red(), e);
            std::process::exit(1);
        }
    };
    let ledger = match EvidenceLedger::open(artifacts.join("evidence.jsonl")) {
        Ok(ledger) => ledger,
        Err(e) => {
            println!("{}: {}", "Evidence ledger error".red(), e);
            std::process::exit(1);
        }
    };

    let bus = EventBus::default();
    let forwarder = (!cfg.command_center_url.trim().is_empty()).then(|| {
        spawn_forwarder(
            &bus,
            CommandCenterClient::new(&cfg.command_center_url, COMMAND_CENTER_TIMEOUT),
        )
    });
    let command_center = CommandCenterClient::new(&cfg.command_center_url, COMMAND_CENTER_TIMEOUT);

    let mut mission = MissionController::new(
        cfg.mission.clone(),
        actions,
        build_listener(&cfg, &console),
        ledger,
    )
    .with_bus(bus.clone());
    if cfg.mission.use_reasoner {
        let mut reasoner = LlmReasoner::new(&cfg.llm_url, &cfg.model);
        if !cfg.llm_api_key.is_empty() {
            reasoner = reasoner.with_api_key(&cfg.llm_api_key);
        }
        mission = mission.with_reasoner(Box::new(reasoner));
    }

    println!();
    println!(
        "  Mission {} started.  Commands: {} {} {} toggle human/debris/injury, {} next phase, {} quit.\n",
        mission.session_id().to_string().dimmed(),
        "/h".bold().cyan(),
        "/d".bold().cyan(),
        "/i".bold().cyan(),
        "/n".bold().cyan(),
        "/q".bold().cyan(),
    );

    // ── Mission loop ──────────────────────────────────────────────────────
    let tick_pause = Duration::from_millis(cfg.tick_interval_ms);
    let mut poll = Interval::new(seconds(cfg.operator_poll_s));
    let mut flags = OperatorFlags::default();
    let mut quit = false;

    while !shutdown.load(Ordering::SeqCst) {
        for command in console.drain_commands() {
            match command {
                OperatorCommand::ToggleHuman => flags.human = toggle("human", flags.human),
                OperatorCommand::ToggleDebris => flags.debris = toggle("debris", flags.debris),
                OperatorCommand::ToggleInjury => flags.injury = toggle("injury", flags.injury),
                OperatorCommand::NextPhase => {
                    if !mission.force_next_phase(Instant::now()) {
                        println!("  {}", "No next phase.".yellow());
                    }
                }
                OperatorCommand::Quit => quit = true,
            }
        }
        if quit {
            break;
        }

        let now = Instant::now();
        if command_center.is_enabled() && poll.due(now) {
            relay_operator_messages(&command_center, &mut mission);
        }

        let frame = camera.as_mut().and_then(|c| match c.capture() {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(camera = c.id(), error = %e, "frame capture failed");
                None
            }
        });
        let input = TickInput {
            frame: frame.as_ref(),
            flags,
        };
        if !mission.tick(now, &input) {
            break;
        }
        thread::sleep(tick_pause);
    }

    // ── Shutdown ──────────────────────────────────────────────────────────
    if !mission.is_done() {
        let reason = if shutdown.load(Ordering::SeqCst) {
            "operator_interrupt"
        } else if quit {
            "operator_quit"
        } else {
            "tick_limit"
        };
        let result = mission.shutdown(reason);
        if result.success {
            println!("{}", "  ✓ Robot stopped.".green());
        } else {
            println!("{}", "  ✗ Stop command failed – check the robot!".red().bold());
        }
    }
    print_summary(&mission);

    drop(mission);
    drop(bus);
    if let Some(handle) = forwarder {
        match handle.join() {
            Ok(delivered) => info!(delivered, "telemetry forwarder finished"),
            Err(_) => warn!("telemetry forwarder panicked"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring helpers
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> Config {
    let path = config::config_path();
    let first_run = !path.exists();
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            return Config::default();
        }
    };
    if first_run {
        match config::save(&cfg) {
            Ok(()) => println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            ),
            Err(e) => println!("{}: {}", "Error saving config".red(), e),
        }
    } else {
        println!("  Config loaded from {}", path.display().to_string().bold());
    }
    cfg
}

type Backends = (Box<dyn ActionCapability>, Option<Box<dyn Camera>>);

fn build_backend(cfg: &Config, artifacts: &Path, console: &Console) -> Result<Backends, String> {
    match cfg.backend {
        Backend::Woz => {
            let mut woz = WozActions::new(artifacts);
            if cfg.manual_confirm {
                woz = woz.with_confirmation(Box::new(console.clone()));
            }
            Ok((Box::new(woz), None))
        }
        Backend::Bridge => {
            let client = BridgeClient::new(&cfg.bridge_url, BRIDGE_TIMEOUT)
                .map_err(|e| format!("cannot create bridge client: {e}"))?;
            let actions = BridgeActions::new(client.clone(), artifacts)
                .with_command_center(cfg.command_center_url.clone());
            Ok((Box::new(actions), Some(Box::new(BridgeCamera::new(client)))))
        }
    }
}

/// Canned replies (if configured) first, then the keyboard.
fn build_listener(cfg: &Config, console: &Console) -> Box<dyn Listener> {
    let mut channels: Vec<Box<dyn Listener>> = Vec::new();
    if let Some(path) = &cfg.responses_file {
        match std::fs::read_to_string(path) {
            Ok(text) => channels.push(Box::new(ScriptedListener::from_lines(&text))),
            Err(e) => warn!(path = %path, error = %e, "responses file unreadable; using keyboard only"),
        }
    }
    channels.push(Box::new(KeyboardListener::new(console.clone())));
    Box::new(FallbackListener::new(channels))
}

fn relay_operator_messages(client: &CommandCenterClient, mission: &mut MissionController) {
    let messages = client.operator_messages();
    if messages.is_empty() {
        return;
    }
    for message in &messages {
        println!("  {} {}", "Operator:".bold().magenta(), message.text);
        mission.relay_operator_message(&message.text);
    }
    if !client.ack_spoken(messages.len()) {
        warn!(count = messages.len(), "operator messages relayed but not acknowledged");
    }
}

fn toggle(name: &str, current: bool) -> bool {
    let next = !current;
    println!(
        "  {} {}",
        format!("{name} detection").bold(),
        if next { "ON".green() } else { "off".dimmed() }
    );
    next
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner & summary
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___                       "#.bold().cyan());
    println!("{}", r#"  / _ \___ ___ ____ __ _____ "#.bold().cyan());
    println!("{}", r#" / , _/ -_|_-</ __/ // / -_)"#.bold().cyan());
    println!("{}", r#"/_/|_|\__/___/\__/\_,_/\__/ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Rescue".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Found-person assist mission");
    println!();
}

fn print_summary(mission: &MissionController) {
    println!();
    println!("  {} {}", "Final phase:".bold(), mission.phase());
    for t in mission.phase_log() {
        println!(
            "    {:>7.1}s  {} → {}  ({})",
            t.elapsed_s,
            t.from,
            t.to.to_string().bold(),
            t.reason.dimmed()
        );
    }
    if !mission.answers().is_empty() {
        println!("  {}", "Triage answers:".bold());
        for (key, value) in mission.answers() {
            println!("    {key}: {value}");
        }
    }
    println!();
}
