//! Start-up reachability checks.
//!
//! Pings the reasoner's OpenAI-compatible `/v1/models` endpoint and the
//! robot bridge's `/health` endpoint so the operator sees what is online
//! before the mission starts.  Nothing here is fatal.

use std::time::Duration;

use serde::Deserialize;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// A single model entry returned by `/v1/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

fn client() -> Result<reqwest::blocking::Client, String> {
    reqwest::blocking::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| format!("failed to build HTTP client: {e}"))
}

/// List the models served at `base_url`.
pub fn fetch_models(base_url: &str) -> Result<Vec<ModelInfo>, String> {
    let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
    let response = client()?
        .get(&url)
        .send()
        .map_err(|e| format!("reasoner unreachable at {url}: {e}"))?;
    if !response.status().is_success() {
        return Err(format!("reasoner returned HTTP {}", response.status()));
    }
    let list: ModelList = response
        .json()
        .map_err(|e| format!("failed to parse model list: {e}"))?;
    Ok(list.data)
}

/// `true` if the robot bridge answers its health check.
pub fn bridge_online(base_url: &str) -> bool {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    client()
        .ok()
        .and_then(|c| c.get(&url).send().ok())
        .is_some_and(|r| r.status().is_success())
}
