//! Generated scripts executed by node against a stand-in `playwright` package
//!
//! The package lives in a throwaway project's `node_modules`, the way a user
//! would install the real one. Page state comes from `page.json` in the same
//! project. Skipped when `node` is not on PATH.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::TempDir;

use wordstall_verify::driver::{DriverConfig, PlaywrightDriver, ScriptRun};
use wordstall_verify::report::{ScenarioReport, ScenarioStatus, StepStatus};
use wordstall_verify::script::{Browser, ScriptBuilder, ScriptOptions};
use wordstall_verify::{Catalog, Scenario};

const STUB_PACKAGE: &str = r#"{ "name": "playwright", "version": "0.0.0-stub", "main": "index.js" }"#;

const STUB_INDEX: &str = r#"const fs = require('fs');
const path = require('path');

const model = JSON.parse(fs.readFileSync(path.join(process.cwd(), 'page.json'), 'utf8'));
const visible = new Set(model.visible || []);
const texts = model.texts || {};
const cards = model.cards || {};

const timeout = (sel, ms) => new Error(`Timeout ${ms}ms exceeded waiting for ${sel}`);
const capture = async ({ path: file }) => fs.writeFileSync(file, 'png');

function locator(sel) {
  const loc = {
    first: () => loc,
    isVisible: async () => visible.has(sel),
    waitFor: async ({ state, timeout: ms } = {}) => {
      const wanted = state !== 'hidden' && state !== 'detached';
      if (visible.has(sel) !== wanted) throw timeout(sel, ms);
    },
    innerText: async () => {
      if (!(sel in texts)) throw timeout(sel, 30000);
      return texts[sel];
    },
    count: async () => (visible.has(sel) ? 1 : 0),
    evaluate: async () => {},
    press: async () => {},
    screenshot: capture,
  };
  return loc;
}

const page = {
  goto: async () => {},
  waitForSelector: async (sel, opts) => locator(sel).waitFor(opts),
  click: async (sel, { timeout: ms } = {}) => {
    if (!visible.has(sel)) throw timeout(sel, ms);
  },
  locator,
  keyboard: { type: async () => {}, press: async () => {} },
  waitForTimeout: (ms) => new Promise((resolve) => setTimeout(resolve, ms)),
  screenshot: capture,
  $$eval: async (sel, fn) => fn(cards[sel] || []),
};

const browserType = {
  launch: async () => ({
    newContext: async () => ({ newPage: async () => page }),
    close: async () => {},
  }),
};

module.exports = { chromium: browserType, firefox: browserType, webkit: browserType };
"#;

fn node_available() -> bool {
    std::process::Command::new("node")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A project directory with the stub package installed and a page model
struct Project {
    dir: TempDir,
}

impl Project {
    fn new(page: serde_json::Value) -> Self {
        let dir = TempDir::new().unwrap();
        let package = dir.path().join("node_modules/playwright");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(package.join("package.json"), STUB_PACKAGE).unwrap();
        std::fs::write(package.join("index.js"), STUB_INDEX).unwrap();
        std::fs::write(dir.path().join("page.json"), page.to_string()).unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        Self { dir }
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn driver(&self) -> PlaywrightDriver {
        PlaywrightDriver::new(DriverConfig {
            work_dir: Some(self.dir.path().to_path_buf()),
            ..DriverConfig::default()
        })
    }

    async fn run(&self, scenario: &Scenario, limit: Duration) -> (ScriptRun, ScenarioReport) {
        let options = ScriptOptions {
            base_url: "http://localhost:8080".to_string(),
            screenshot_dir: self.out(),
            browser: Browser::Chromium,
            headless: true,
        };
        let script = ScriptBuilder::new(&options).build(scenario);
        let run = self.driver().run(&scenario.name, &script, limit).await.unwrap();
        let report = ScenarioReport::from_events(&scenario.name, &options.base_url, &run, Duration::ZERO);
        (run, report)
    }
}

fn builtin(name: &str) -> Scenario {
    Catalog::builtin().unwrap().get(name).cloned().unwrap()
}

fn statuses(report: &ScenarioReport) -> Vec<StepStatus> {
    report.steps.iter().map(|s| s.status).collect()
}

fn exists(dir: &Path, name: &str) -> bool {
    dir.join(format!("{}.png", name)).exists()
}

const LIMIT: Duration = Duration::from_secs(30);

#[tokio::test]
async fn playwright_resolves_from_project_directory() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let project = Project::new(json!({ "visible": ["#help-modal"] }));

    project.driver().ensure_installed().await.unwrap();
    let (run, report) = project.run(&builtin("help-modal"), LIMIT).await;

    assert!(!run.stderr.contains("Cannot find module"), "{}", run.stderr);
    assert_eq!(run.exit_code, Some(0));
    assert_eq!(run.finished(), Some(true));
    assert_eq!(report.status, ScenarioStatus::Passed, "{:?}", report.error);
    assert_eq!(statuses(&report), vec![StepStatus::Passed; 3]);
    assert!(exists(&project.out(), "modal_verification"));
}

#[tokio::test]
async fn score_mismatch_continues_without_failure_screenshot() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let project = Project::new(json!({
        "visible": ["#start-btn", "#hud", "#score-display"],
        "texts": { "#score-display": "12" },
    }));

    let (run, report) = project.run(&builtin("score-hud"), LIMIT).await;

    assert_eq!(run.exit_code, Some(0));
    assert_eq!(report.status, ScenarioStatus::Passed);
    let read = report
        .steps
        .iter()
        .find(|s| s.label == "read_text:#score-display")
        .unwrap();
    assert_eq!(read.status, StepStatus::Continued);
    assert_eq!(report.screenshot_names(), vec!["score_hud_verification"]);
    assert!(!exists(&project.out(), "score_hud_fail"));
}

#[tokio::test]
async fn missing_customers_abort_with_error_screenshot() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let project = Project::new(json!({ "visible": [] }));

    let (run, report) = project.run(&builtin("customer-departure"), LIMIT).await;

    assert_eq!(run.exit_code, Some(1));
    assert_eq!(run.finished(), Some(false));
    assert_eq!(report.status, ScenarioStatus::Failed);
    // navigate, optional start button, then the customer wait that aborts
    assert_eq!(
        statuses(&report),
        vec![StepStatus::Passed, StepStatus::Continued, StepStatus::Failed]
    );
    assert!(report.error.as_deref().unwrap_or_default().contains("Timeout 30000ms"));
    assert_eq!(report.screenshot_names(), vec!["error"]);
    assert!(exists(&project.out(), "error"));
}

#[tokio::test]
async fn missing_debug_toggle_stops_debug_mode() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let project = Project::new(json!({ "visible": [] }));

    let (run, report) = project.run(&builtin("debug-mode"), LIMIT).await;

    assert_eq!(run.exit_code, Some(0));
    assert_eq!(report.status, ScenarioStatus::Stopped);
    assert_eq!(report.stop_reason.as_deref(), Some("Debug button not found!"));
    assert_eq!(report.steps.last().map(|s| s.status), Some(StepStatus::Stopped));
    assert!(report.screenshots.is_empty());
}

#[tokio::test]
async fn nested_guard_stops_whole_scenario() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let project = Project::new(json!({ "visible": ["#help-modal"] }));
    let scenario = Scenario::from_yaml(
        r##"
name: nested-guard
steps:
  - action: if_visible
    selector: '#help-modal'
    steps:
      - action: guard
        selector: '#debug-toggle'
        message: no debug toggle behind the modal
  - action: screenshot
    name: after
"##,
    )
    .unwrap();

    let (run, report) = project.run(&scenario, LIMIT).await;

    assert_eq!(run.exit_code, Some(0));
    assert_eq!(report.status, ScenarioStatus::Stopped);
    assert_eq!(report.stop_reason.as_deref(), Some("no debug toggle behind the modal"));
    assert_eq!(statuses(&report), vec![StepStatus::Stopped, StepStatus::Stopped]);
    assert!(!exists(&project.out(), "after"));
}

#[tokio::test]
async fn hung_script_is_killed_at_limit() {
    if !node_available() {
        eprintln!("skipping: node not found");
        return;
    }
    let project = Project::new(json!({ "visible": [] }));
    let scenario = Scenario::from_yaml(
        r#"
name: hang
steps:
  - action: sleep
    ms: 600000
"#,
    )
    .unwrap();

    let start = Instant::now();
    let (run, report) = project.run(&scenario, Duration::from_secs(2)).await;

    assert!(start.elapsed() < Duration::from_secs(20));
    assert!(run.timed_out);
    assert_eq!(run.finished(), None);
    assert_eq!(report.status, ScenarioStatus::Failed);
    assert_eq!(statuses(&report), vec![StepStatus::Incomplete]);
}
