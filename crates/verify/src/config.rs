//! Runner configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::driver::DriverConfig;
use crate::error::{VerifyError, VerifyResult};
use crate::script::Browser;
use crate::visual::VisualConfig;

/// Base URL used when neither the configuration nor the scenario names one
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "wordstall-verify.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Server to verify; overrides every scenario's own base URL
    pub base_url: Option<String>,

    /// Screenshots and results land here
    pub output_dir: PathBuf,

    /// Extra scenario directory merged over the built-ins
    pub scenarios_dir: Option<PathBuf>,

    /// Per-scenario limit
    pub scenario_timeout_secs: u64,

    /// How long the preflight probe waits for the server
    pub preflight_timeout_secs: u64,

    pub browser: BrowserConfig,

    pub visual: VisualSettings,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            output_dir: PathBuf::from("verification"),
            scenarios_dir: None,
            scenario_timeout_secs: 120,
            preflight_timeout_secs: 10,
            browser: BrowserConfig::default(),
            visual: VisualSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: Browser,
    pub headless: bool,

    /// Node binary used to run generated scripts
    pub node_binary: String,

    /// NODE_PATH for resolving the playwright package
    pub node_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: Browser::Chromium,
            headless: true,
            node_binary: "node".to_string(),
            node_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    /// Defaults to `<output_dir>/baselines`
    pub baseline_dir: Option<PathBuf>,

    /// Default diff threshold in percent
    pub threshold: f64,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            baseline_dir: None,
            threshold: 0.5,
        }
    }
}

impl VerifyConfig {
    /// Load configuration from file; a missing file yields defaults
    pub fn load(path: &Path) -> VerifyResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> VerifyResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VerifyError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> VerifyResult<()> {
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(VerifyError::Config(format!("base_url must be http(s): {}", url)));
            }
        }
        if self.scenario_timeout_secs == 0 {
            return Err(VerifyError::Config("scenario_timeout_secs must be positive".to_string()));
        }
        if !(0.0..=100.0).contains(&self.visual.threshold) {
            return Err(VerifyError::Config(format!(
                "visual.threshold {} outside 0-100",
                self.visual.threshold
            )));
        }
        Ok(())
    }

    /// Base URL for a scenario: configured value, then the scenario's, then the default
    pub fn effective_base_url<'a>(&'a self, scenario_url: Option<&'a str>) -> &'a str {
        self.base_url
            .as_deref()
            .or(scenario_url)
            .unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn baseline_dir(&self) -> PathBuf {
        self.visual
            .baseline_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("baselines"))
    }

    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_secs(self.preflight_timeout_secs)
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            node_binary: self.browser.node_binary.clone(),
            node_path: self.browser.node_path.clone(),
            work_dir: None,
        }
    }

    pub fn visual_config(&self, auto_update: bool) -> VisualConfig {
        VisualConfig {
            baseline_dir: self.baseline_dir(),
            actual_dir: self.output_dir.clone(),
            diff_dir: self.output_dir.join("diffs"),
            threshold: self.visual.threshold,
            auto_update,
        }
    }
}
