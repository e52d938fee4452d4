//! wordstall-verify - Main Entry Point
//!
//! Lists, inspects and runs browser verification scenarios against a
//! running Wordstall server.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use wordstall_verify::config::DEFAULT_CONFIG_FILE;
use wordstall_verify::script::Browser;
use wordstall_verify::visual::VisualTester;
use wordstall_verify::{probe, Catalog, RunOptions, Runner, VerifyConfig};

mod output;

use output::{BaselineSummary, OutputFormat, ScenarioSummary};

/// Browser verification for the Wordstall word game
#[derive(Parser)]
#[command(name = "wordstall-verify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (optional)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Server to verify; overrides each scenario's own base URL
    #[arg(long, env = "WORDSTALL_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Directory for screenshots and results
    #[arg(short, long, env = "WORDSTALL_OUTPUT_DIR", global = true)]
    output: Option<PathBuf>,

    /// Extra scenario directory merged over the built-ins
    #[arg(long, env = "WORDSTALL_SCENARIOS", global = true)]
    scenarios: Option<PathBuf>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, global = true)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available scenarios
    List {
        /// Only scenarios with this tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Print a scenario definition
    Show {
        name: String,
    },

    /// Print the Playwright script a scenario compiles to
    Script {
        name: String,
    },

    /// Check that the game server answers
    Probe {
        /// URL to probe (defaults to the configured base URL)
        url: Option<String>,
    },

    /// List approved screenshot baselines
    Baselines {
        /// Also remove diff images left by earlier comparisons
        #[arg(long)]
        clean: bool,
    },

    /// Run scenarios
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Scenario names; all scenarios when omitted
    names: Vec<String>,

    /// Only scenarios with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Don't check the server before launching the browser
    #[arg(long)]
    skip_preflight: bool,

    /// Compare screenshots with baselines
    #[arg(long)]
    compare_baselines: bool,

    /// Store screenshots of passing scenarios as new baselines
    #[arg(long)]
    update_baselines: bool,

    /// Per-scenario timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            2
        }
    };
    std::process::exit(code);
}

fn load_config(cli: &Cli) -> anyhow::Result<VerifyConfig> {
    let mut config = VerifyConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(url) = &cli.base_url {
        config.base_url = Some(url.clone());
    }
    if let Some(dir) = &cli.output {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &cli.scenarios {
        config.scenarios_dir = Some(dir.clone());
    }
    if let Some(browser) = cli.browser {
        config.browser.kind = browser;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if let Commands::Run(RunArgs { timeout: Some(secs), .. }) = &cli.command {
        config.scenario_timeout_secs = *secs;
    }

    config.validate()?;
    Ok(config)
}

fn load_catalog(config: &VerifyConfig) -> anyhow::Result<Catalog> {
    let mut catalog = Catalog::builtin()?;
    if let Some(dir) = &config.scenarios_dir {
        catalog.merge(Catalog::load_dir(dir)?);
    }
    Ok(catalog)
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    let config = load_config(&cli)?;
    let catalog = load_catalog(&config)?;
    let format = cli.format;

    match cli.command {
        Commands::List { tag } => {
            let summaries: Vec<ScenarioSummary> = match &tag {
                Some(tag) => catalog.tagged(tag).map(ScenarioSummary::from).collect(),
                None => catalog.iter().map(ScenarioSummary::from).collect(),
            };
            output::print_list(&summaries, format);
            Ok(0)
        }
        Commands::Show { name } => {
            let scenario = catalog
                .get(&name)
                .ok_or_else(|| wordstall_verify::VerifyError::UnknownScenario(name.clone()))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(scenario)?),
                _ => print!("{}", serde_yaml::to_string(scenario)?),
            }
            Ok(0)
        }
        Commands::Script { name } => {
            let scenario = catalog
                .get(&name)
                .ok_or_else(|| wordstall_verify::VerifyError::UnknownScenario(name.clone()))?;
            let runner = Runner::new(config, RunOptions::default());
            print!("{}", runner.script_for(scenario));
            Ok(0)
        }
        Commands::Probe { url } => {
            let url = url.unwrap_or_else(|| config.effective_base_url(None).to_string());
            match probe::wait_for_page(&url, config.preflight_timeout()).await {
                Ok(_) => {
                    output::print_success(&format!("{} is reachable", url));
                    Ok(0)
                }
                Err(e) => {
                    output::print_error(&e.to_string());
                    Ok(1)
                }
            }
        }
        Commands::Baselines { clean } => {
            let tester = VisualTester::new(config.visual_config(false))?;
            if clean {
                let removed = tester.clean_diffs()?;
                output::print_info(&format!("Removed {} diff image(s)", removed));
            }
            let baseline_dir = config.baseline_dir();
            let baselines: Vec<BaselineSummary> = tester
                .list_baselines()?
                .into_iter()
                .map(|name| BaselineSummary {
                    path: baseline_dir.join(format!("{}.png", name)).display().to_string(),
                    name,
                })
                .collect();
            output::print_list(&baselines, format);
            Ok(0)
        }
        Commands::Run(args) => {
            let scenarios = catalog.select(&args.names, args.tag.as_deref())?;
            if scenarios.is_empty() {
                output::print_info("No scenarios selected.");
                return Ok(0);
            }

            let runner = Runner::new(
                config,
                RunOptions {
                    skip_preflight: args.skip_preflight,
                    compare_baselines: args.compare_baselines,
                    update_baselines: args.update_baselines,
                },
            );
            let suite = runner.run_all(&scenarios).await?;
            suite.write_json(&runner.config().output_dir)?;
            output::print_suite(&suite, format);

            Ok(if suite.is_success() { 0 } else { 1 })
        }
    }
}
