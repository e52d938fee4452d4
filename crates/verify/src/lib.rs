//! Wordstall browser verification
//!
//! Drives the Wordstall word game (served separately, usually on
//! `localhost:8080` or `localhost:8000`) through Playwright and records what
//! it sees:
//! - Declarative YAML scenarios, seven of them built in
//! - One generated Node script per scenario, one browser and one page
//! - JSON-line events from the script folded into reports
//! - Screenshots on disk, optionally compared against baselines
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  wordstall-verify (Rust)                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Catalog ── built-in + user YAML ──► Scenario                │
//! │  Runner                                                      │
//! │    ├── probe::wait_for_page(base_url)                        │
//! │    ├── ScriptBuilder::build(scenario) -> Node script         │
//! │    ├── PlaywrightDriver::run(script) -> ScriptRun (events)   │
//! │    ├── ScenarioReport::from_events(..)                       │
//! │    └── VisualTester::compare(screenshot, baseline)           │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                             │
//! │    ├── name, description, tags, base_url                     │
//! │    └── steps: [Step + on_failure]                            │
//! │          navigate, click, blur, type, press, type_from,      │
//! │          wait, sleep, assert, read_text, count, inspect,     │
//! │          screenshot, if_visible, guard, log                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod probe;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod script;
pub mod visual;

pub use catalog::Catalog;
pub use config::VerifyConfig;
pub use error::{VerifyError, VerifyResult};
pub use report::{ScenarioReport, ScenarioStatus, SuiteReport};
pub use runner::{RunOptions, Runner};
pub use scenario::{Scenario, Step, StepSpec};
