//! Configuration Vault – reads/writes `~/.rescue/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use rescue_dialogue::ScriptKind;
use rescue_runtime::MissionConfig;
use rescue_types::RescueError;

/// Which action backend drives the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Wizard-of-Oz: actions are printed for a human operator.
    #[default]
    Woz,
    /// HTTP robot bridge.
    Bridge,
}

impl Backend {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "woz" => Some(Backend::Woz),
            "bridge" => Some(Backend::Bridge),
            _ => None,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Woz => write!(f, "woz"),
            Backend::Bridge => write!(f, "bridge"),
        }
    }
}

/// Persisted operator configuration stored in `~/.rescue/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,

    /// Wait for Enter after every WoZ action.
    #[serde(default)]
    pub manual_confirm: bool,

    /// Base URL of the robot bridge (bridge backend only).
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Base URL of the command center.  Empty disables telemetry forwarding
    /// and operator messages.
    #[serde(default)]
    pub command_center_url: String,

    /// Where action logs, evidence and reports are written.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,

    /// OpenAI-compatible endpoint for the reasoner.
    #[serde(default = "default_llm_url")]
    pub llm_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token for the reasoner endpoint, if it needs one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub llm_api_key: String,

    /// Optional file of canned replies, one per line (`-` for silence).
    /// Consulted before the keyboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses_file: Option<String>,

    /// Pause between mission ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How often to poll the command center for operator messages.
    #[serde(default = "default_operator_poll_s")]
    pub operator_poll_s: f64,

    #[serde(default)]
    pub mission: MissionConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("manual_confirm", &self.manual_confirm)
            .field("bridge_url", &self.bridge_url)
            .field("command_center_url", &self.command_center_url)
            .field("artifacts_dir", &self.artifacts_dir)
            .field("llm_url", &self.llm_url)
            .field("model", &self.model)
            .field(
                "llm_api_key",
                if self.llm_api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("responses_file", &self.responses_file)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("operator_poll_s", &self.operator_poll_s)
            .field("mission", &self.mission)
            .finish()
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8765".to_string()
}
fn default_artifacts_dir() -> String {
    "artifacts".to_string()
}
fn default_llm_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_tick_interval_ms() -> u64 {
    500
}
fn default_operator_poll_s() -> f64 {
    3.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            manual_confirm: false,
            bridge_url: default_bridge_url(),
            command_center_url: String::new(),
            artifacts_dir: default_artifacts_dir(),
            llm_url: default_llm_url(),
            model: default_model(),
            llm_api_key: String::new(),
            responses_file: None,
            tick_interval_ms: default_tick_interval_ms(),
            operator_poll_s: default_operator_poll_s(),
            mission: MissionConfig::default(),
        }
    }
}

impl Config {
    pub fn artifacts_path(&self) -> PathBuf {
        PathBuf::from(&self.artifacts_dir)
    }
}

/// Return the path to `~/.rescue/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rescue").join("config.toml")
}

/// Load the config from disk, falling back to defaults when the file does
/// not exist.  Environment overrides apply either way.
pub fn load() -> Result<Config, RescueError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

/// Load the config from a specific path.  `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, RescueError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| RescueError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| RescueError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `RESCUE_*` overrides looked up through `var`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RESCUE_BACKEND` | `backend` |
/// | `RESCUE_BRIDGE_URL` | `bridge_url` |
/// | `RESCUE_COMMAND_CENTER_URL` | `command_center_url` |
/// | `RESCUE_ARTIFACTS_DIR` | `artifacts_dir` |
/// | `RESCUE_LLM_URL` | `llm_url` |
/// | `RESCUE_MODEL` | `model` |
/// | `RESCUE_SCRIPT` | `mission.script` |
/// | `RESCUE_USE_REASONER` | `mission.use_reasoner` |
/// | `RESCUE_PHASE_TIMEOUT_S` | `mission.phase_timeout_s` |
/// | `RESCUE_RESPONSE_TIMEOUT_S` | `mission.response_timeout_s` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(backend) = var("RESCUE_BACKEND").as_deref().and_then(Backend::from_name) {
        cfg.backend = backend;
    }
    if let Some(v) = var("RESCUE_BRIDGE_URL") {
        cfg.bridge_url = v;
    }
    if let Some(v) = var("RESCUE_COMMAND_CENTER_URL") {
        cfg.command_center_url = v;
    }
    if let Some(v) = var("RESCUE_ARTIFACTS_DIR") {
        cfg.artifacts_dir = v;
    }
    if let Some(v) = var("RESCUE_LLM_URL") {
        cfg.llm_url = v;
    }
    if let Some(v) = var("RESCUE_MODEL") {
        cfg.model = v;
    }
    if let Some(script) = var("RESCUE_SCRIPT").as_deref().and_then(ScriptKind::from_name) {
        cfg.mission.script = script;
    }
    if let Some(v) = var("RESCUE_USE_REASONER") {
        match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" => cfg.mission.use_reasoner = true,
            "0" | "false" | "no" => cfg.mission.use_reasoner = false,
            _ => {}
        }
    }
    if let Some(secs) = var("RESCUE_PHASE_TIMEOUT_S").and_then(|v| v.trim().parse::<f64>().ok()) {
        cfg.mission.phase_timeout_s = secs;
    }
    if let Some(secs) = var("RESCUE_RESPONSE_TIMEOUT_S").and_then(|v| v.trim().parse::<f64>().ok()) {
        cfg.mission.response_timeout_s = secs;
    }
}

/// Save the config to disk, creating `~/.rescue/` if necessary.
pub fn save(cfg: &Config) -> Result<(), RescueError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path with owner-only permissions.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), RescueError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RescueError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                RescueError::Config(format!("failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RescueError::Serialization(format!("failed to serialize config: {e}")))?;
    let write_err = |e: std::io::Error| RescueError::Config(format!("failed to write {}: {e}", path.display()));
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = Config {
            llm_api_key: "sk-super-secret".to_string(),
            ..Config::default()
        };
        let debug_str = format!("{cfg:?}");
        assert!(!debug_str.contains("sk-super-secret"));
        assert!(debug_str.contains("<redacted>"));

        let debug_str = format!("{:?}", Config::default());
        assert!(debug_str.contains("<not set>"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.backend = Backend::Bridge;
        cfg.mission.script = ScriptKind::Linear;
        cfg.mission.phase_timeout_s = 45.0;
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.backend, Backend::Bridge);
        assert_eq!(loaded.model, "llama3");
        assert_eq!(loaded.mission.script, ScriptKind::Linear);
        assert_eq!(loaded.mission.phase_timeout_s, 45.0);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend = \"bridge\"\n\n[mission]\nuse_reasoner = true\n").unwrap();

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.backend, Backend::Bridge);
        assert!(cfg.mission.use_reasoner);
        assert_eq!(cfg.mission.callout_interval_s, 5.0);
        assert_eq!(cfg.tick_interval_ms, 500);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend = [").unwrap();
        assert!(matches!(load_from(&path), Err(RescueError::Config(_))));
    }

    #[test]
    fn config_path_points_to_rescue_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".rescue"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = Config::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("RESCUE_BACKEND", "Bridge"),
                ("RESCUE_MODEL", "qwen2.5"),
                ("RESCUE_SCRIPT", "linear"),
                ("RESCUE_USE_REASONER", "yes"),
                ("RESCUE_PHASE_TIMEOUT_S", "30"),
                ("RESCUE_COMMAND_CENTER_URL", "http://cc.local:9000"),
            ]),
        );
        assert_eq!(cfg.backend, Backend::Bridge);
        assert_eq!(cfg.model, "qwen2.5");
        assert_eq!(cfg.mission.script, ScriptKind::Linear);
        assert!(cfg.mission.use_reasoner);
        assert_eq!(cfg.mission.phase_timeout_s, 30.0);
        assert_eq!(cfg.command_center_url, "http://cc.local:9000");
    }

    #[test]
    fn unparsable_overrides_are_ignored() {
        let mut cfg = Config::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("RESCUE_BACKEND", "hovercraft"),
                ("RESCUE_SCRIPT", "freestyle"),
                ("RESCUE_PHASE_TIMEOUT_S", "soon"),
                ("RESCUE_USE_REASONER", "maybe"),
            ]),
        );
        assert_eq!(cfg.backend, Backend::Woz);
        assert_eq!(cfg.mission.script, ScriptKind::March);
        assert_eq!(cfg.mission.phase_timeout_s, 120.0);
        assert!(!cfg.mission.use_reasoner);
    }
}
