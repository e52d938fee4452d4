//! Compiles a scenario into a single Playwright Node script
//!
//! The generated script drives one browser and one page through every step
//! in order and reports progress as JSON lines on stdout (see
//! [`crate::driver::ScriptEvent`]). All scenario strings are embedded as JSON
//! string literals, so selectors and typed text cannot break out of the
//! generated code.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scenario::{Scenario, Step, StepSpec, DEFAULT_TIMEOUT_MS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}' (chromium, firefox, webkit)", other)),
        }
    }
}

/// Settings shared by every script the builder emits
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    pub base_url: String,
    pub screenshot_dir: PathBuf,
    pub browser: Browser,
    pub headless: bool,
}

pub struct ScriptBuilder<'a> {
    options: &'a ScriptOptions,
}

const PRELUDE: &str = r#"const path = require('path');
const { createRequire } = require('module');
// resolve playwright from the working directory, not from this temp file
const { chromium, firefox, webkit } = createRequire(process.cwd() + path.sep)('playwright');

function emit(event) {
  process.stdout.write(JSON.stringify(event) + '\n');
}

function describe(error) {
  return String((error && error.message) || error).split('\n')[0];
}

class Stop extends Error {}
class Aborted extends Error {}
"#;

const HELPERS: &str = r#"
  const shot = async (name, selector, fullPage) => {
    const file = path.join(screenshotDir, name + '.png');
    if (selector) {
      await page.locator(selector).first().screenshot({ path: file });
    } else {
      await page.screenshot({ path: file, fullPage: !!fullPage });
    }
    emit({ type: 'screenshot', name, path: file });
  };

  const step = async (id, label, policy, body) => {
    emit({ type: 'step_started', id, label });
    const started = Date.now();
    try {
      await body();
      emit({ type: 'step_passed', id, duration_ms: Date.now() - started });
    } catch (error) {
      if (error instanceof Aborted) throw error;
      if (error instanceof Stop) {
        emit({ type: 'stopped', id, reason: error.message });
        throw error;
      }
      const handled = policy.action === 'continue';
      emit({ type: 'step_failed', id, duration_ms: Date.now() - started, error: describe(error), handled });
      if (policy.message) emit({ type: 'log', message: policy.message });
      if (policy.screenshot) {
        try { await shot(policy.screenshot); } catch (_) {}
      }
      if (!handled) throw new Aborted(describe(error));
    }
  };
"#;

impl<'a> ScriptBuilder<'a> {
    pub fn new(options: &'a ScriptOptions) -> Self {
        Self { options }
    }

    /// Build the complete Node script for a scenario
    pub fn build(&self, scenario: &Scenario) -> String {
        let mut script = String::from(PRELUDE);

        let _ = write!(
            script,
            r#"
(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  let exitCode = 0;
  try {{
    const context = await browser.newContext({{ viewport: {{ width: {width}, height: {height} }} }});
    const page = await context.newPage();
    const baseUrl = {base_url};
    const screenshotDir = {screenshot_dir};
"#,
            browser = self.options.browser.as_str(),
            headless = self.options.headless,
            width = scenario.viewport.width,
            height = scenario.viewport.height,
            base_url = js(&self.options.base_url),
            screenshot_dir = js(&self.options.screenshot_dir.to_string_lossy()),
        );
        script.push_str(&indent(HELPERS, 2));

        let _ = write!(script, "\n    emit({{ type: 'scenario', name: {} }});\n", js(&scenario.name));
        script.push_str("    try {\n");

        let mut next_id = 1;
        self.push_steps(&mut script, &scenario.steps, &mut next_id, 3);

        script.push_str("      emit({ type: 'finished', success: true });\n");
        script.push_str(
            r#"    } catch (error) {
      if (error instanceof Stop) {
        emit({ type: 'finished', success: true });
      } else {
"#,
        );
        if let Some(name) = &scenario.failure_screenshot {
            let _ = writeln!(
                script,
                "        try {{ await shot({}); }} catch (_) {{}}",
                js(name)
            );
        }
        script.push_str(
            r#"        emit({ type: 'finished', success: false, error: describe(error) });
        exitCode = 1;
      }
    }
  } finally {
    await browser.close();
  }
  process.exitCode = exitCode;
})().catch((error) => {
  emit({ type: 'finished', success: false, error: describe(error) });
  process.exitCode = 1;
});
"#,
        );

        script
    }

    fn push_steps(&self, out: &mut String, steps: &[StepSpec], next_id: &mut usize, depth: usize) {
        let pad = "  ".repeat(depth);
        for spec in steps {
            let id = *next_id;
            *next_id += 1;

            let policy = serde_json::json!({
                "action": if spec.on_failure.continues() { "continue" } else { "abort" },
                "message": spec.on_failure.message,
                "screenshot": spec.on_failure.screenshot,
            });

            let _ = writeln!(
                out,
                "{pad}await step({id}, {label}, {policy}, async () => {{",
                label = js(&spec.step.describe()),
            );

            let body_pad = "  ".repeat(depth + 1);
            match &spec.step {
                Step::IfVisible { selector, steps } => {
                    let _ = writeln!(
                        out,
                        "{body_pad}const taken = await page.locator({sel}).first().isVisible();\n\
                         {body_pad}emit({{ type: 'branch', id: {id}, taken }});\n\
                         {body_pad}if (taken) {{",
                        sel = js(selector),
                    );
                    self.push_steps(out, steps, next_id, depth + 2);
                    let _ = writeln!(out, "{body_pad}}}");
                }
                step => {
                    for line in self.step_to_js(step, id).lines() {
                        let _ = writeln!(out, "{body_pad}{line}");
                    }
                }
            }

            let _ = writeln!(out, "{pad}}});");
        }
    }

    /// JavaScript body for a single non-nesting step
    fn step_to_js(&self, step: &Step, id: usize) -> String {
        match step {
            Step::Navigate { url, wait_for_selector } => {
                let mut code = format!("await page.goto(new URL({}, baseUrl).toString());", js(url));
                if let Some(sel) = wait_for_selector {
                    let _ = write!(code, "\nawait page.waitForSelector({});", js(sel));
                }
                code
            }
            Step::Click { selector, timeout_ms } => {
                format!(
                    "await page.click({}, {{ timeout: {} }});",
                    js(selector),
                    timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
                )
            }
            Step::Blur { selector } => {
                format!("await page.locator({}).first().evaluate((el) => el.blur());", js(selector))
            }
            Step::Type { text, delay_ms } => {
                format!(
                    "await page.keyboard.type({}, {{ delay: {} }});",
                    js(text),
                    delay_ms.unwrap_or(0)
                )
            }
            Step::Press { key, selector } => match selector {
                Some(sel) => format!("await page.locator({}).first().press({});", js(sel), js(key)),
                None => format!("await page.keyboard.press({});", js(key)),
            },
            Step::TypeFrom { selector, repeat } => {
                format!(
                    r#"const source = (await page.locator({sel}).first().innerText()).trim();
emit({{ type: 'text', id: {id}, selector: {sel}, value: source }});
if (!source) throw new Error('no text in ' + {sel});
for (const ch of source.repeat({repeat})) {{
  await page.keyboard.press(ch);
}}"#,
                    sel = js(selector),
                )
            }
            Step::Wait { selector, timeout_ms, state } => {
                format!(
                    "await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                    js(selector),
                    state.as_str(),
                    timeout_ms
                )
            }
            Step::Sleep { ms } => format!("await page.waitForTimeout({});", ms),
            Step::Assert { selector, visible, text, text_contains, count, timeout_ms } => {
                let timeout = timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
                let mut lines = vec![format!("const target = page.locator({});", js(selector))];

                if let Some(vis) = visible {
                    let state = if *vis { "visible" } else { "hidden" };
                    lines.push(format!(
                        "await target.first().waitFor({{ state: '{}', timeout: {} }});",
                        state, timeout
                    ));
                }
                if text.is_some() || text_contains.is_some() {
                    lines.push(format!(
                        "const actual = (await target.first().innerText({{ timeout: {} }})).trim();",
                        timeout
                    ));
                    lines.push(format!(
                        "emit({{ type: 'text', id: {}, selector: {}, value: actual }});",
                        id,
                        js(selector)
                    ));
                }
                if let Some(t) = text {
                    lines.push(format!(
                        "if (actual !== {t}) throw new Error('expected text ' + JSON.stringify({t}) + ', got ' + JSON.stringify(actual));",
                        t = js(t)
                    ));
                }
                if let Some(tc) = text_contains {
                    lines.push(format!(
                        "if (!actual.includes({t})) throw new Error('expected text containing ' + JSON.stringify({t}) + ', got ' + JSON.stringify(actual));",
                        t = js(tc)
                    ));
                }
                if let Some(c) = count {
                    lines.push(format!(
                        "const seen = await target.count();\nif (seen !== {c}) throw new Error('expected {c} match(es), got ' + seen);"
                    ));
                }
                lines.join("\n")
            }
            Step::ReadText { selector, expect, timeout_ms } => {
                let mut code = format!(
                    r#"const target = page.locator({sel}).first();
await target.waitFor({{ state: 'visible', timeout: {timeout} }});
const value = await target.innerText();
emit({{ type: 'text', id: {id}, selector: {sel}, value }});"#,
                    sel = js(selector),
                    timeout = timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
                );
                if let Some(expected) = expect {
                    let _ = write!(
                        code,
                        "\nif (value.trim() !== {e}) throw new Error('text mismatch: expected ' + JSON.stringify({e}) + ', got ' + JSON.stringify(value));",
                        e = js(expected)
                    );
                }
                code
            }
            Step::Count { selector } => {
                format!(
                    "emit({{ type: 'count', id: {id}, selector: {sel}, count: await page.locator({sel}).count() }});",
                    sel = js(selector)
                )
            }
            Step::Inspect { selector } => {
                format!(
                    r#"const cards = await page.$$eval({sel}, (els) => els.map((el) => ({{
  id: el.dataset.id === undefined ? null : el.dataset.id,
  class_list: el.className,
  html: el.outerHTML.substring(0, 100),
}})));
emit({{ type: 'cards', id: {id}, selector: {sel}, cards }});"#,
                    sel = js(selector)
                )
            }
            Step::Screenshot { name, selector, full_page } => {
                let selector = selector.as_deref().map(js).unwrap_or_else(|| "null".to_string());
                format!("await shot({}, {}, {});", js(name), selector, full_page)
            }
            Step::Guard { selector, message } => {
                format!(
                    r#"if (!(await page.locator({sel}).first().isVisible())) {{
  emit({{ type: 'log', message: {msg} }});
  throw new Stop({msg});
}}"#,
                    sel = js(selector),
                    msg = js(message)
                )
            }
            Step::Log { message } => format!("emit({{ type: 'log', message: {} }});", js(message)),
            // nested steps are expanded by push_steps
            Step::IfVisible { .. } => String::new(),
        }
    }
}

/// Quote a string as a JSON (and therefore JavaScript) literal
fn js(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

fn indent(text: &str, depth: usize) -> String {
    let pad = "  ".repeat(depth);
    text.lines()
        .map(|l| if l.is_empty() { String::new() } else { format!("{pad}{l}") })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}
