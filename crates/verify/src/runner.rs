//! Runs scenarios one after another and collects their reports

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::VerifyConfig;
use crate::driver::PlaywrightDriver;
use crate::error::{VerifyError, VerifyResult};
use crate::probe;
use crate::report::{ScenarioReport, ScenarioStatus, SuiteReport, VisualDiffResult};
use crate::scenario::Scenario;
use crate::script::{ScriptBuilder, ScriptOptions};
use crate::visual::VisualTester;

/// Switches for a single invocation
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the HTTP reachability check before each new base URL
    pub skip_preflight: bool,

    /// Compare screenshots with baselines even if the scenario doesn't ask for it
    pub compare_baselines: bool,

    /// Copy screenshots of passing scenarios over their baselines
    pub update_baselines: bool,
}

pub struct Runner {
    config: VerifyConfig,
    driver: PlaywrightDriver,
    options: RunOptions,
}

impl Runner {
    pub fn new(config: VerifyConfig, options: RunOptions) -> Self {
        let driver = PlaywrightDriver::new(config.driver_config());
        Self { config, driver, options }
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    fn script_options(&self, scenario: &Scenario) -> ScriptOptions {
        ScriptOptions {
            base_url: self
                .config
                .effective_base_url(scenario.base_url.as_deref())
                .to_string(),
            screenshot_dir: self.config.output_dir.clone(),
            browser: self.config.browser.kind,
            headless: self.config.browser.headless,
        }
    }

    /// The Node script a scenario compiles to under this configuration
    pub fn script_for(&self, scenario: &Scenario) -> String {
        let options = self.script_options(scenario);
        ScriptBuilder::new(&options).build(scenario)
    }

    /// Run scenarios in order. Individual failures end up in the report; only
    /// problems that affect every scenario (no Playwright) are returned as errors.
    pub async fn run_all(&self, scenarios: &[Scenario]) -> VerifyResult<SuiteReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.driver.ensure_installed().await?;
        std::fs::create_dir_all(&self.config.output_dir)?;

        info!("Running {} scenario(s)...", scenarios.len());

        if self.options.compare_baselines || scenarios.iter().any(|s| s.visual_regression) {
            let removed = VisualTester::new(self.config.visual_config(false))?.clean_diffs()?;
            if removed > 0 {
                debug!("Removed {} stale diff image(s)", removed);
            }
        }

        let mut reachable: HashMap<String, Result<(), String>> = HashMap::new();
        let mut reports = Vec::with_capacity(scenarios.len());

        for scenario in scenarios {
            let base_url = self.script_options(scenario).base_url;

            if !self.options.skip_preflight {
                let check = match reachable.get(&base_url) {
                    Some(known) => known.clone(),
                    None => {
                        let result = self.preflight(&base_url).await.map_err(|e| e.to_string());
                        reachable.insert(base_url.clone(), result.clone());
                        result
                    }
                };
                if let Err(reason) = check {
                    error!("✗ {} - {}", scenario.name, reason);
                    reports.push(ScenarioReport::errored(&scenario.name, &base_url, reason));
                    continue;
                }
            }

            let report = self.run_scenario(scenario).await;
            match report.status {
                ScenarioStatus::Passed => info!("✓ {} ({} ms)", report.name, report.duration_ms),
                ScenarioStatus::Stopped => info!(
                    "○ {} stopped: {}",
                    report.name,
                    report.stop_reason.as_deref().unwrap_or("guard")
                ),
                ScenarioStatus::Failed => error!(
                    "✗ {} - {}",
                    report.name,
                    report.error.as_deref().unwrap_or("unknown error")
                ),
            }
            reports.push(report);
        }

        let suite = SuiteReport::new(started_at, reports, start.elapsed());
        info!(
            "Results: {} passed, {} failed, {} stopped ({} ms)",
            suite.passed, suite.failed, suite.stopped, suite.duration_ms
        );

        if self.options.update_baselines {
            self.update_baselines(&suite)?;
        }

        Ok(suite)
    }

    /// Check that the server behind `base_url` answers
    pub async fn preflight(&self, base_url: &str) -> VerifyResult<()> {
        probe::wait_for_page(base_url, self.config.preflight_timeout()).await?;
        Ok(())
    }

    /// Run one scenario; never fails, errors are folded into the report
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        let options = self.script_options(scenario);
        let script = ScriptBuilder::new(&options).build(scenario);
        debug!(scenario = %scenario.name, base_url = %options.base_url, "starting");

        let start = Instant::now();
        let run = match self
            .driver
            .run(&scenario.name, &script, self.config.scenario_timeout())
            .await
        {
            Ok(run) => run,
            Err(e) => return ScenarioReport::errored(&scenario.name, &options.base_url, e.to_string()),
        };

        let mut report = ScenarioReport::from_events(&scenario.name, &options.base_url, &run, start.elapsed());
        if run.timed_out {
            report.error = Some(
                VerifyError::ScriptTimeout {
                    scenario: scenario.name.clone(),
                    secs: self.config.scenario_timeout_secs,
                }
                .to_string(),
            );
        }

        if report.status == ScenarioStatus::Passed
            && (scenario.visual_regression || self.options.compare_baselines)
        {
            self.compare_screenshots(scenario, &mut report);
        }

        report
    }

    fn compare_screenshots(&self, scenario: &Scenario, report: &mut ScenarioReport) {
        let tester = match VisualTester::new(self.config.visual_config(false)) {
            Ok(t) => t,
            Err(e) => {
                report.status = ScenarioStatus::Failed;
                report.error = Some(format!("Visual comparison error: {}", e));
                return;
            }
        };

        for name in report.screenshot_names() {
            match tester.compare(&name, Some(scenario.visual_threshold)) {
                Ok(diff) => {
                    if !diff.matches {
                        report.status = ScenarioStatus::Failed;
                        report.error = Some(format!(
                            "Visual regression in '{}': {:.2}% pixels differ",
                            name, diff.diff_percent
                        ));
                    }
                    report.visual_diffs.push(VisualDiffResult {
                        name,
                        matches: diff.matches,
                        diff_percent: diff.diff_percent,
                        diff_image_path: diff.diff_image_path,
                    });
                }
                Err(VerifyError::BaselineNotFound(_)) => {
                    info!("No baseline for '{}' yet; run with --update-baselines to create it", name);
                }
                Err(e) => {
                    report.status = ScenarioStatus::Failed;
                    report.error = Some(format!("Visual comparison error: {}", e));
                }
            }
        }
    }

    /// Promote screenshots of non-failed scenarios to baselines
    pub fn update_baselines(&self, suite: &SuiteReport) -> VerifyResult<usize> {
        let tester = VisualTester::new(self.config.visual_config(true))?;
        let mut updated = 0;

        for report in suite.scenarios.iter().filter(|r| !r.is_failure()) {
            for name in report.screenshot_names() {
                tester.update_baseline(&name)?;
                updated += 1;
            }
        }
        if suite.failed > 0 {
            warn!("Skipped baselines of {} failed scenario(s)", suite.failed);
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_script_uses_scenario_base_url() {
        let runner = Runner::new(VerifyConfig::default(), RunOptions::default());
        let catalog = Catalog::builtin().unwrap();

        let score = runner.script_for(catalog.get("score-hud").unwrap());
        assert!(score.contains(r#"const baseUrl = "http://localhost:8000";"#));

        let ids = runner.script_for(catalog.get("debug-ids").unwrap());
        assert!(ids.contains(r#"const baseUrl = "http://localhost:8080";"#));
    }

    #[test]
    fn test_configured_base_url_wins() {
        let config = VerifyConfig {
            base_url: Some("http://127.0.0.1:4000".to_string()),
            ..Default::default()
        };
        let runner = Runner::new(config, RunOptions::default());
        let catalog = Catalog::builtin().unwrap();
        let script = runner.script_for(catalog.get("help-modal").unwrap());
        assert!(script.contains(r#"const baseUrl = "http://127.0.0.1:4000";"#));
        assert!(script.contains(r#"const screenshotDir = "verification";"#));
    }

    #[tokio::test]
    async fn test_missing_node_is_reported_per_scenario() {
        let mut config = VerifyConfig::default();
        config.browser.node_binary = "/nonexistent/node-binary".to_string();
        let runner = Runner::new(config, RunOptions::default());
        let catalog = Catalog::builtin().unwrap();

        let report = runner.run_scenario(catalog.get("help-modal").unwrap()).await;
        assert_eq!(report.status, ScenarioStatus::Failed);
        assert!(report.error.unwrap().contains("/nonexistent/node-binary"));
    }

    #[test]
    fn test_update_baselines_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let config = VerifyConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        image::RgbaImage::new(2, 2).save(dir.path().join("ok.png")).unwrap();

        let mut ok = ScenarioReport::errored("ok", "u", String::new());
        ok.status = ScenarioStatus::Passed;
        ok.error = None;
        ok.screenshots = vec![dir.path().join("ok.png")];
        let mut bad = ScenarioReport::errored("bad", "u", "boom".to_string());
        bad.screenshots = vec![dir.path().join("missing.png")];

        let suite = SuiteReport::new(Utc::now(), vec![ok, bad], std::time::Duration::ZERO);
        let runner = Runner::new(config, RunOptions::default());
        assert_eq!(runner.update_baselines(&suite).unwrap(), 1);
        assert!(dir.path().join("baselines/ok.png").exists());
    }
}
