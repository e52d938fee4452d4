//! Scenario and suite reports built from script events

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::driver::{CardInfo, ScriptEvent, ScriptRun};
use crate::error::VerifyResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    /// A guard ended the scenario early; not a failure
    Stopped,
}

impl ScenarioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::Failed => "failed",
            ScenarioStatus::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Failed, but its policy let the scenario go on
    Continued,
    Stopped,
    /// Started and never reported back
    Incomplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub id: usize,
    pub label: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Something a step read off the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Observation {
    Text { step: usize, selector: String, value: String },
    Count { step: usize, selector: String, count: usize },
    Cards { step: usize, selector: String, cards: Vec<CardInfo> },
    Branch { step: usize, taken: bool },
    Log { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualDiffResult {
    pub name: String,
    pub matches: bool,
    pub diff_percent: f64,
    pub diff_image_path: Option<PathBuf>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub base_url: String,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
    pub observations: Vec<Observation>,
    pub screenshots: Vec<PathBuf>,
    #[serde(default)]
    pub visual_diffs: Vec<VisualDiffResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioReport {
    /// Fold the events of one script run into a report
    pub fn from_events(name: &str, base_url: &str, run: &ScriptRun, elapsed: Duration) -> Self {
        let mut steps: Vec<StepReport> = Vec::new();
        let mut observations = Vec::new();
        let mut screenshots = Vec::new();
        let mut stop_reason = None;
        let mut script_error = None;

        for event in &run.events {
            match event {
                ScriptEvent::Scenario { .. } => {}
                ScriptEvent::StepStarted { id, label } => steps.push(StepReport {
                    id: *id,
                    label: label.clone(),
                    status: StepStatus::Incomplete,
                    duration_ms: 0,
                    error: None,
                }),
                ScriptEvent::StepPassed { id, duration_ms } => {
                    if let Some(step) = steps.iter_mut().find(|s| s.id == *id) {
                        step.status = StepStatus::Passed;
                        step.duration_ms = *duration_ms;
                    }
                }
                ScriptEvent::StepFailed { id, duration_ms, error, handled } => {
                    if let Some(step) = steps.iter_mut().find(|s| s.id == *id) {
                        step.status = if *handled { StepStatus::Continued } else { StepStatus::Failed };
                        step.duration_ms = *duration_ms;
                        step.error = Some(error.clone());
                    }
                }
                ScriptEvent::Stopped { id, reason } => {
                    if let Some(step) = steps.iter_mut().find(|s| s.id == *id) {
                        step.status = StepStatus::Stopped;
                    }
                    stop_reason = Some(reason.clone());
                }
                ScriptEvent::Branch { id, taken } => {
                    observations.push(Observation::Branch { step: *id, taken: *taken })
                }
                ScriptEvent::Log { message } => {
                    observations.push(Observation::Log { message: message.clone() })
                }
                ScriptEvent::Text { id, selector, value } => observations.push(Observation::Text {
                    step: *id,
                    selector: selector.clone(),
                    value: value.clone(),
                }),
                ScriptEvent::Count { id, selector, count } => observations.push(Observation::Count {
                    step: *id,
                    selector: selector.clone(),
                    count: *count,
                }),
                ScriptEvent::Cards { id, selector, cards } => observations.push(Observation::Cards {
                    step: *id,
                    selector: selector.clone(),
                    cards: cards.clone(),
                }),
                ScriptEvent::Screenshot { path, .. } => screenshots.push(path.clone()),
                ScriptEvent::Finished { error, .. } => script_error = error.clone(),
            }
        }

        let (status, error) = if run.timed_out {
            (ScenarioStatus::Failed, Some("timed out".to_string()))
        } else {
            match (run.finished(), run.exit_code) {
                (Some(true), Some(0) | None) if stop_reason.is_some() => (ScenarioStatus::Stopped, None),
                (Some(true), Some(0) | None) => (ScenarioStatus::Passed, None),
                (Some(true), Some(code)) => (
                    ScenarioStatus::Failed,
                    Some(format!("script reported success but exited with code {}", code)),
                ),
                (Some(false), _) => (
                    ScenarioStatus::Failed,
                    Some(script_error.unwrap_or_else(|| "script failed".to_string())),
                ),
                (None, code) => (ScenarioStatus::Failed, Some(unfinished_reason(run, code))),
            }
        };

        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            status,
            duration_ms: elapsed.as_millis() as u64,
            steps,
            observations,
            screenshots,
            visual_diffs: Vec::new(),
            stop_reason,
            error,
        }
    }

    /// Report for a scenario that never produced a script run
    pub fn errored(name: &str, base_url: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            status: ScenarioStatus::Failed,
            duration_ms: 0,
            steps: Vec::new(),
            observations: Vec::new(),
            screenshots: Vec::new(),
            visual_diffs: Vec::new(),
            stop_reason: None,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == ScenarioStatus::Failed
    }

    /// Names (file stems) of the screenshots this run produced
    pub fn screenshot_names(&self) -> Vec<String> {
        self.screenshots
            .iter()
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect()
    }
}

/// First `Error:`-style line of Node's stderr. Uncaught exceptions end with
/// the `Node.js vX` banner, so the last line is only a fallback.
fn stderr_cause(stderr: &str) -> Option<String> {
    static ERROR_LINE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = ERROR_LINE.get_or_init(|| Regex::new(r"(?m)^\w*Error\b.*:.*$").ok());

    re.as_ref()
        .and_then(|re| re.find(stderr))
        .map(|m| m.as_str().trim().to_string())
        .or_else(|| {
            stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
        })
}

fn unfinished_reason(run: &ScriptRun, code: Option<i32>) -> String {
    match (stderr_cause(&run.stderr), code) {
        (Some(line), _) => line,
        (None, Some(code)) => format!("script exited with code {} before finishing", code),
        (None, None) => "script was terminated before finishing".to_string(),
    }
}

/// Result of running a batch of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub stopped: usize,
    pub duration_ms: u64,
    pub scenarios: Vec<ScenarioReport>,
}

impl SuiteReport {
    pub fn new(started_at: DateTime<Utc>, scenarios: Vec<ScenarioReport>, elapsed: Duration) -> Self {
        let count = |status| scenarios.iter().filter(|r| r.status == status).count();
        Self {
            started_at,
            total: scenarios.len(),
            passed: count(ScenarioStatus::Passed),
            failed: count(ScenarioStatus::Failed),
            stopped: count(ScenarioStatus::Stopped),
            duration_ms: elapsed.as_millis() as u64,
            scenarios,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Write results as pretty JSON into `dir`
    pub fn write_json(&self, dir: &Path) -> VerifyResult<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join("results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: usize, label: &str) -> ScriptEvent {
        ScriptEvent::StepStarted { id, label: label.to_string() }
    }

    fn passed(id: usize) -> ScriptEvent {
        ScriptEvent::StepPassed { id, duration_ms: 5 }
    }

    fn finished(success: bool) -> ScriptEvent {
        ScriptEvent::Finished { success, error: None }
    }

    fn report(events: Vec<ScriptEvent>, exit_code: Option<i32>) -> ScenarioReport {
        let run = ScriptRun { events, exit_code, ..Default::default() };
        ScenarioReport::from_events("t", "http://localhost:8080", &run, Duration::from_millis(42))
    }

    #[test]
    fn test_passed_with_continued_step() {
        let r = report(
            vec![
                started(1, "click:#start-btn"),
                ScriptEvent::StepFailed {
                    id: 1,
                    duration_ms: 2000,
                    error: "Timeout 2000ms exceeded.".to_string(),
                    handled: true,
                },
                ScriptEvent::Log { message: "No start button found or modal already closed.".to_string() },
                started(2, "screenshot:step1_buffer"),
                ScriptEvent::Screenshot {
                    name: "step1_buffer".to_string(),
                    path: PathBuf::from("verification/step1_buffer.png"),
                },
                passed(2),
                finished(true),
            ],
            Some(0),
        );

        assert_eq!(r.status, ScenarioStatus::Passed);
        assert_eq!(r.steps[0].status, StepStatus::Continued);
        assert_eq!(r.steps[1].status, StepStatus::Passed);
        assert_eq!(r.screenshot_names(), vec!["step1_buffer".to_string()]);
        assert_eq!(r.duration_ms, 42);
        assert!(r.error.is_none());
    }

    #[test]
    fn test_guard_stop_is_not_failure() {
        let r = report(
            vec![
                started(1, "guard:#debug-toggle"),
                ScriptEvent::Log { message: "Debug button not found!".to_string() },
                ScriptEvent::Stopped { id: 1, reason: "Debug button not found!".to_string() },
                finished(true),
            ],
            Some(0),
        );
        assert_eq!(r.status, ScenarioStatus::Stopped);
        assert_eq!(r.steps[0].status, StepStatus::Stopped);
        assert_eq!(r.stop_reason.as_deref(), Some("Debug button not found!"));
        assert!(!r.is_failure());
    }

    #[test]
    fn test_aborted_step_fails_scenario() {
        let r = report(
            vec![
                started(1, "wait:#hud:visible"),
                ScriptEvent::StepFailed {
                    id: 1,
                    duration_ms: 30000,
                    error: "Timeout 30000ms exceeded.".to_string(),
                    handled: false,
                },
                ScriptEvent::Finished {
                    success: false,
                    error: Some("Timeout 30000ms exceeded.".to_string()),
                },
            ],
            Some(1),
        );
        assert_eq!(r.status, ScenarioStatus::Failed);
        assert_eq!(r.steps[0].status, StepStatus::Failed);
        assert_eq!(r.error.as_deref(), Some("Timeout 30000ms exceeded."));
    }

    const NODE_MODULE_NOT_FOUND: &str = "node:internal/modules/cjs/loader:1228
  throw err;
  ^

Error: Cannot find module 'playwright'
Require stack:
- /tmp/.tmp8fLHId/help-modal.js
    at Module._resolveFilename (node:internal/modules/cjs/loader:1225:15)
    at Module._load (node:internal/modules/cjs/loader:1051:27)
    at Module.require (node:internal/modules/cjs/loader:1311:19)
    at require (node:internal/modules/helpers:179:18)
    at Object.<anonymous> (/tmp/.tmp8fLHId/help-modal.js:2:42)
    at node:internal/main/run_main_module:28:49 {
  code: 'MODULE_NOT_FOUND',
  requireStack: [ '/tmp/.tmp8fLHId/help-modal.js' ]
}

Node.js v20.20.2
";

    #[test]
    fn test_crash_without_finished_uses_stderr() {
        let run = ScriptRun {
            events: vec![started(1, "navigate:/")],
            exit_code: Some(1),
            stderr: NODE_MODULE_NOT_FOUND.to_string(),
            timed_out: false,
        };
        let r = ScenarioReport::from_events("t", "u", &run, Duration::ZERO);
        assert_eq!(r.status, ScenarioStatus::Failed);
        assert_eq!(r.steps[0].status, StepStatus::Incomplete);
        assert_eq!(r.error.as_deref(), Some("Error: Cannot find module 'playwright'"));
    }

    #[test]
    fn test_stderr_cause_prefers_error_line() {
        let stderr = "/tmp/x/s.js:40\n    await page.nope();\n               ^\n\n\
                      TypeError: page.nope is not a function\n    at /tmp/x/s.js:40:16\n\nNode.js v20.20.2\n";
        assert_eq!(stderr_cause(stderr).as_deref(), Some("TypeError: page.nope is not a function"));

        // no error line: the last non-empty line still says something
        assert_eq!(stderr_cause("Killed\n\n").as_deref(), Some("Killed"));
        assert_eq!(stderr_cause(""), None);
    }

    #[test]
    fn test_success_event_with_bad_exit_code() {
        let r = report(vec![finished(true)], Some(3));
        assert_eq!(r.status, ScenarioStatus::Failed);
    }

    #[test]
    fn test_timeout_overrides_events() {
        let run = ScriptRun {
            events: vec![finished(true)],
            exit_code: None,
            stderr: String::new(),
            timed_out: true,
        };
        let r = ScenarioReport::from_events("t", "u", &run, Duration::ZERO);
        assert_eq!(r.status, ScenarioStatus::Failed);
        assert_eq!(r.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_observations_keep_order() {
        let r = report(
            vec![
                ScriptEvent::Branch { id: 3, taken: false },
                ScriptEvent::Count { id: 5, selector: ".critic-card".to_string(), count: 0 },
                ScriptEvent::Text { id: 6, selector: "#score-display".to_string(), value: "0".to_string() },
                finished(true),
            ],
            Some(0),
        );
        assert_eq!(
            r.observations,
            vec![
                Observation::Branch { step: 3, taken: false },
                Observation::Count { step: 5, selector: ".critic-card".to_string(), count: 0 },
                Observation::Text { step: 6, selector: "#score-display".to_string(), value: "0".to_string() },
            ]
        );
    }

    #[test]
    fn test_suite_totals_and_json() {
        let ok = report(vec![finished(true)], Some(0));
        let bad = ScenarioReport::errored("broken", "u", "node missing".to_string());
        let suite = SuiteReport::new(Utc::now(), vec![ok, bad], Duration::from_secs(1));

        assert_eq!((suite.total, suite.passed, suite.failed, suite.stopped), (2, 1, 1, 0));
        assert!(!suite.is_success());

        let dir = tempfile::tempdir().unwrap();
        let path = suite.write_json(dir.path()).unwrap();
        let back: SuiteReport = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back.scenarios[1].error.as_deref(), Some("node missing"));
    }
}
