//! Error types for verification runs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Failed to spawn {binary}: {reason}")]
    NodeSpawn { binary: String, reason: String },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Scenario '{scenario}' timed out after {secs}s")]
    ScriptTimeout { scenario: String, secs: u64 },

    #[error("Page {url} unreachable after {attempts} attempts")]
    PageUnreachable { url: String, attempts: usize },

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Visual regression: {0}")]
    VisualRegression(String),

    #[error("Baseline not found: {}", .0.display())]
    BaselineNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type VerifyResult<T> = Result<T, VerifyError>;
