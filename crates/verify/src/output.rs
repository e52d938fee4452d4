//! Output formatting for the CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use wordstall_verify::report::{Observation, ScenarioReport, ScenarioStatus, SuiteReport};
use wordstall_verify::Scenario;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Listing entry for a scenario
#[derive(Debug, Serialize)]
pub struct ScenarioSummary {
    pub name: String,
    pub base_url: String,
    pub steps: usize,
    pub tags: Vec<String>,
    pub description: String,
}

impl From<&Scenario> for ScenarioSummary {
    fn from(s: &Scenario) -> Self {
        Self {
            name: s.name.clone(),
            base_url: s.base_url.clone().unwrap_or_else(|| "-".to_string()),
            steps: s.step_count(),
            tags: s.tags.clone(),
            description: s.description.clone(),
        }
    }
}

impl TableDisplay for ScenarioSummary {
    fn headers() -> Vec<&'static str> {
        vec!["NAME", "BASE URL", "STEPS", "TAGS", "DESCRIPTION"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.base_url.clone(),
            self.steps.to_string(),
            self.tags.join(","),
            self.description.clone(),
        ]
    }
}

/// Listing entry for an approved screenshot
#[derive(Debug, Serialize)]
pub struct BaselineSummary {
    pub name: String,
    pub path: String,
}

impl TableDisplay for BaselineSummary {
    fn headers() -> Vec<&'static str> {
        vec!["BASELINE", "PATH"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.path.clone()]
    }
}

impl TableDisplay for ScenarioReport {
    fn headers() -> Vec<&'static str> {
        vec!["SCENARIO", "STATUS", "STEPS", "SCREENSHOTS", "TIME", "DETAIL"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status {
            ScenarioStatus::Passed => self.status.as_str().green().to_string(),
            ScenarioStatus::Failed => self.status.as_str().red().to_string(),
            ScenarioStatus::Stopped => self.status.as_str().yellow().to_string(),
        };
        let detail = self
            .error
            .clone()
            .or_else(|| self.stop_reason.clone())
            .unwrap_or_default();
        vec![
            self.name.clone(),
            status,
            self.steps.len().to_string(),
            self.screenshots.len().to_string(),
            format!("{} ms", self.duration_ms),
            detail,
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print a whole run: the per-scenario table, what was read off the page, totals
pub fn print_suite(suite: &SuiteReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(suite).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(suite).unwrap_or_default());
        }
        OutputFormat::Table | OutputFormat::Plain => {
            print_list(&suite.scenarios, format);
            for report in &suite.scenarios {
                print_observations(report);
            }
            let totals = format!(
                "{} passed, {} failed, {} stopped ({} ms)",
                suite.passed, suite.failed, suite.stopped, suite.duration_ms
            );
            if suite.is_success() {
                print_success(&totals);
            } else {
                print_error(&totals);
            }
        }
    }
}

fn print_observations(report: &ScenarioReport) {
    let lines: Vec<String> = report
        .observations
        .iter()
        .filter_map(|o| match o {
            Observation::Text { selector, value, .. } => {
                Some(format!("Found text of {}: '{}'", selector, value))
            }
            Observation::Count { selector, count, .. } => {
                Some(format!("{} element(s) found: {}", selector, count))
            }
            Observation::Cards { selector, cards, .. } => {
                let mut out = format!("{} found: {}", selector, cards.len());
                for (i, card) in cards.iter().enumerate() {
                    out.push_str(&format!(
                        "\n    Card {}: ID='{}' Class='{}'",
                        i,
                        card.id.as_deref().unwrap_or("undefined"),
                        card.class_list
                    ));
                }
                Some(out)
            }
            Observation::Log { message } => Some(message.clone()),
            Observation::Branch { .. } => None,
        })
        .collect();

    if lines.is_empty() {
        return;
    }
    println!("{}", report.name.bold());
    for line in lines {
        println!("  {}", line);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
