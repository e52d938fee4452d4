//! Declarative YAML verification scenarios

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{VerifyError, VerifyResult};

/// A complete verification procedure parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Server this scenario was written against. Overridden by an explicit
    /// base URL in the runner configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Viewport size for the browser
    #[serde(default = "default_viewport")]
    pub viewport: Viewport,

    /// Screenshot captured when the scenario aborts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_screenshot: Option<String>,

    /// Whether screenshots are compared against baselines
    #[serde(default)]
    pub visual_regression: bool,

    /// Threshold for visual diff (0.0 - 100.0 percent)
    #[serde(default = "default_threshold")]
    pub visual_threshold: f64,

    /// Steps to execute in order
    pub steps: Vec<StepSpec>,
}

fn default_viewport() -> Viewport {
    Viewport { width: 1280, height: 720 }
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// A step together with what happens when it fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(flatten)]
    pub step: Step,

    #[serde(default, skip_serializing_if = "OnFailure::is_default")]
    pub on_failure: OnFailure,
}

impl From<Step> for StepSpec {
    fn from(step: Step) -> Self {
        Self { step, on_failure: OnFailure::default() }
    }
}

/// Failure policy for a single step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnFailure {
    #[serde(default)]
    pub action: FailureAction,

    /// Printed when the step fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Screenshot captured when the step fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl OnFailure {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn continues(&self) -> bool {
        self.action == FailureAction::Continue
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    #[default]
    Abort,
    Continue,
}

/// A single step in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_for_selector: Option<String>,
    },

    /// Click an element
    Click {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Drop focus from an element so later key presses don't activate it
    Blur {
        selector: String,
    },

    /// Type literal text with the keyboard
    Type {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay_ms: Option<u64>,
    },

    /// Press a single key
    Press {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },

    /// Press every character of an element's text, `repeat` times over
    TypeFrom {
        selector: String,
        #[serde(default = "default_repeat")]
        repeat: usize,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Wait for a fixed amount of time
    Sleep {
        ms: u64,
    },

    /// Assert something about an element
    Assert {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visible: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text_contains: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Report the inner text of the first match
    ReadText {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expect: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Report how many elements match
    Count {
        selector: String,
    },

    /// Report id, classes and an HTML excerpt of every match
    Inspect {
        selector: String,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default)]
        full_page: bool,
    },

    /// Run nested steps only when an element is visible
    IfVisible {
        selector: String,
        steps: Vec<StepSpec>,
    },

    /// End the scenario early unless an element is visible
    Guard {
        selector: String,
        message: String,
    },

    /// Log a message
    Log {
        message: String,
    },
}

/// Playwright's own default for waits, clicks and assertions
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_wait_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_repeat() -> usize {
    1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl Step {
    /// Short label used in logs and reports
    pub fn describe(&self) -> String {
        match self {
            Step::Navigate { url, .. } => format!("navigate:{}", url),
            Step::Click { selector, .. } => format!("click:{}", selector),
            Step::Blur { selector } => format!("blur:{}", selector),
            Step::Type { text, .. } => format!("type:{}", text),
            Step::Press { key, .. } => format!("press:{}", key),
            Step::TypeFrom { selector, repeat } => format!("type_from:{} x{}", selector, repeat),
            Step::Wait { selector, state, .. } => format!("wait:{}:{}", selector, state.as_str()),
            Step::Sleep { ms } => format!("sleep:{}ms", ms),
            Step::Assert { selector, .. } => format!("assert:{}", selector),
            Step::ReadText { selector, .. } => format!("read_text:{}", selector),
            Step::Count { selector } => format!("count:{}", selector),
            Step::Inspect { selector } => format!("inspect:{}", selector),
            Step::Screenshot { name, .. } => format!("screenshot:{}", name),
            Step::IfVisible { selector, .. } => format!("if_visible:{}", selector),
            Step::Guard { selector, .. } => format!("guard:{}", selector),
            Step::Log { message } => {
                let cut = message.char_indices().nth(30).map(|(i, _)| i).unwrap_or(message.len());
                format!("log:{}", &message[..cut])
            }
        }
    }
}

impl Scenario {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> VerifyResult<Self> {
        let scenario: Self = serde_yaml::from_str(yaml)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> VerifyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            VerifyError::Yaml(err) => {
                VerifyError::ScenarioParse(format!("{}: {}", path.display(), err))
            }
            other => other,
        })
    }

    /// Check the structural rules a runnable scenario must satisfy
    pub fn validate(&self) -> VerifyResult<()> {
        let invalid = |reason: String| VerifyError::InvalidScenario {
            scenario: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(invalid("no steps".to_string()));
        }
        if !(0.0..=100.0).contains(&self.visual_threshold) {
            return Err(invalid(format!(
                "visual_threshold {} outside 0-100",
                self.visual_threshold
            )));
        }
        if let Some(name) = &self.failure_screenshot {
            check_screenshot_name(name).map_err(invalid)?;
        }

        validate_steps(&self.steps).map_err(invalid)
    }

    /// Every screenshot name this scenario can produce, in step order
    pub fn screenshot_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_screenshots(&self.steps, &mut names);
        if let Some(name) = &self.failure_screenshot {
            names.push(name.clone());
        }
        names
    }

    /// Total number of steps including nested ones
    pub fn step_count(&self) -> usize {
        fn count(steps: &[StepSpec]) -> usize {
            steps
                .iter()
                .map(|s| match &s.step {
                    Step::IfVisible { steps, .. } => 1 + count(steps),
                    _ => 1,
                })
                .sum()
        }
        count(&self.steps)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

fn validate_steps(steps: &[StepSpec]) -> Result<(), String> {
    for spec in steps {
        let label = spec.step.describe();
        let non_empty = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(format!("{}: {} must not be empty", label, field))
            } else {
                Ok(())
            }
        };

        match &spec.step {
            Step::Navigate { wait_for_selector, .. } => {
                if let Some(sel) = wait_for_selector {
                    non_empty("wait_for_selector", sel)?;
                }
            }
            Step::Click { selector, .. }
            | Step::Blur { selector }
            | Step::Wait { selector, .. }
            | Step::Assert { selector, .. }
            | Step::ReadText { selector, .. }
            | Step::Count { selector }
            | Step::Inspect { selector }
            | Step::Guard { selector, .. } => non_empty("selector", selector)?,
            Step::Type { text, .. } => non_empty("text", text)?,
            Step::Press { key, .. } => non_empty("key", key)?,
            Step::TypeFrom { selector, repeat } => {
                non_empty("selector", selector)?;
                if *repeat == 0 {
                    return Err(format!("{}: repeat must be at least 1", label));
                }
            }
            Step::Screenshot { name, .. } => check_screenshot_name(name)?,
            Step::IfVisible { selector, steps } => {
                non_empty("selector", selector)?;
                validate_steps(steps)?;
            }
            Step::Sleep { .. } | Step::Log { .. } => {}
        }

        if let Some(name) = &spec.on_failure.screenshot {
            check_screenshot_name(name)?;
        }
    }
    Ok(())
}

fn check_screenshot_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(format!("invalid screenshot name '{}'", name));
    }
    Ok(())
}

fn collect_screenshots(steps: &[StepSpec], names: &mut Vec<String>) {
    for spec in steps {
        match &spec.step {
            Step::Screenshot { name, .. } => names.push(name.clone()),
            Step::IfVisible { steps, .. } => collect_screenshots(steps, names),
            _ => {}
        }
        if let Some(name) = &spec.on_failure.screenshot {
            names.push(name.clone());
        }
    }
}
