//! Runs generated Playwright scripts under Node and collects their events

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{VerifyError, VerifyResult};

/// One JSON line printed by a generated script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEvent {
    Scenario {
        name: String,
    },
    StepStarted {
        id: usize,
        label: String,
    },
    StepPassed {
        id: usize,
        duration_ms: u64,
    },
    StepFailed {
        id: usize,
        duration_ms: u64,
        error: String,
        handled: bool,
    },
    Branch {
        id: usize,
        taken: bool,
    },
    Log {
        message: String,
    },
    Text {
        id: usize,
        selector: String,
        value: String,
    },
    Count {
        id: usize,
        selector: String,
        count: usize,
    },
    Cards {
        id: usize,
        selector: String,
        cards: Vec<CardInfo>,
    },
    Screenshot {
        name: String,
        path: PathBuf,
    },
    Stopped {
        id: usize,
        reason: String,
    },
    Finished {
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Summary of one element reported by an `inspect` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardInfo {
    pub id: Option<String>,
    pub class_list: String,
    pub html: String,
}

/// Parse a stdout line; anything that is not an event yields `None`
pub fn parse_event_line(line: &str) -> Option<ScriptEvent> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Everything observed while a script ran
#[derive(Debug, Clone, Default)]
pub struct ScriptRun {
    pub events: Vec<ScriptEvent>,
    pub exit_code: Option<i32>,
    pub stderr: String,
    pub timed_out: bool,
}

impl ScriptRun {
    pub fn finished(&self) -> Option<bool> {
        self.events.iter().rev().find_map(|e| match e {
            ScriptEvent::Finished { success, .. } => Some(*success),
            _ => None,
        })
    }
}

/// Configuration for the Node/Playwright driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Node binary
    pub node_binary: String,

    /// Extra module search path (NODE_PATH), e.g. a project's node_modules
    pub node_path: Option<PathBuf>,

    /// Working directory for the script process
    pub work_dir: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".to_string(),
            node_path: None,
            work_dir: None,
        }
    }
}

/// Executes generated scripts with Node
pub struct PlaywrightDriver {
    config: DriverConfig,
}

impl PlaywrightDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.node_binary);
        if let Some(node_path) = &self.config.node_path {
            cmd.env("NODE_PATH", node_path);
        }
        if let Some(dir) = &self.config.work_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Check that node can resolve the playwright package
    pub async fn ensure_installed(&self) -> VerifyResult<()> {
        let status = self
            .command()
            .args(["-e", "require.resolve('playwright')"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => Err(VerifyError::PlaywrightNotFound),
            Err(e) => Err(VerifyError::NodeSpawn {
                binary: self.config.node_binary.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Run a script to completion, or until `limit` elapses
    pub async fn run(&self, scenario: &str, script: &str, limit: Duration) -> VerifyResult<ScriptRun> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join(format!("{}.js", scenario));
        tokio::fs::write(&script_path, script).await?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut child = self
            .command()
            .arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VerifyError::NodeSpawn {
                binary: self.config.node_binary.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VerifyError::Script("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| VerifyError::Script("stderr not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut run = ScriptRun::default();
        let mut lines = BufReader::new(stdout).lines();

        let collect = async {
            while let Some(line) = lines.next_line().await? {
                match parse_event_line(&line) {
                    Some(event) => {
                        trace_event(scenario, &event);
                        run.events.push(event);
                    }
                    None => debug!(scenario, "node: {}", line),
                }
            }
            child.wait().await
        };

        let outcome = tokio::time::timeout(limit, collect).await;
        match outcome {
            Ok(status) => run.exit_code = status?.code(),
            Err(_) => {
                warn!(scenario, "Script exceeded {}s, killing node", limit.as_secs());
                run.timed_out = true;
                let _ = child.kill().await;
            }
        }

        run.stderr = stderr_task.await.unwrap_or_default();
        if !run.stderr.trim().is_empty() {
            debug!(scenario, "node stderr:\n{}", run.stderr.trim_end());
        }

        Ok(run)
    }
}

/// Mirror script output to the log the way the scripts printed it
fn trace_event(scenario: &str, event: &ScriptEvent) {
    match event {
        ScriptEvent::StepStarted { id, label } => debug!(scenario, step = id, "{}", label),
        ScriptEvent::StepFailed { id, error, handled: true, .. } => {
            warn!(scenario, step = id, "step failed, continuing: {}", error)
        }
        ScriptEvent::StepFailed { id, error, handled: false, .. } => {
            warn!(scenario, step = id, "step failed: {}", error)
        }
        ScriptEvent::Log { message } => info!(scenario, "{}", message),
        ScriptEvent::Text { selector, value, .. } => info!(scenario, "Text of {}: '{}'", selector, value),
        ScriptEvent::Count { selector, count, .. } => info!(scenario, "{} element(s) match {}", count, selector),
        ScriptEvent::Cards { selector, cards, .. } => {
            info!(scenario, "{} found: {}", selector, cards.len());
            for (i, card) in cards.iter().enumerate() {
                info!(
                    scenario,
                    "Card {}: ID='{}' Class='{}'",
                    i,
                    card.id.as_deref().unwrap_or("undefined"),
                    card.class_list
                );
            }
        }
        ScriptEvent::Screenshot { path, .. } => info!(scenario, "Screenshot taken: {}", path.display()),
        ScriptEvent::Stopped { reason, .. } => info!(scenario, "Stopped early: {}", reason),
        _ => {}
    }
}
