//! bse-runner - Bristol Stock Exchange run orchestrator
//!
//! A CLI tool that writes the simulator configuration, supervises a
//! simulation run, and summarizes the resulting average-balance table
//! into per-agent statistics, chart series and reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, spawn failure, unreadable table, etc.)
//!   2 - Run canceled, or a post-processing stage failed

mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod orchestrator;
mod report;
mod settings;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputFormat, SettingsAction};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{RunEvent, RunStatus};
use orchestrator::{ChannelObserver, CommandLauncher, RunOrchestrator};
use settings::RunConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    init_logging(&args);

    info!("bse-runner v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match dispatch(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .bserunner.toml at `path`.
/// Returns exit code 1 if the file already exists.
fn handle_init_config(path: &Path) -> Result<i32> {
    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            path.display()
        );
        return Ok(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Created {} with default settings.", path.display());
    println!("   Edit it to customize the interpreter, output locations and charts.");
    Ok(0)
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn dispatch(args: Args) -> Result<i32> {
    match &args.command {
        Command::Run => {
            let (config, settings_path) = load_context(&args)?;
            run_simulation(&args, &config, &settings_path).await
        }
        Command::Analyze {
            csv,
            format,
            output,
            summary,
        } => run_analyze(csv, *format, output.as_deref(), summary.as_deref()),
        Command::Compare { summaries, output } => run_compare(summaries, output.as_deref()),
        Command::Settings { action } => {
            let (_, settings_path) = load_context(&args)?;
            handle_settings(action, &settings_path)
        }
        Command::InitConfig => handle_init_config(Path::new(CONFIG_FILE)),
    }
}

/// Merged configuration and the settings document path it selects.
fn load_context(args: &Args) -> Result<(Config, PathBuf)> {
    let mut config = load_config(args)?;
    config.merge_with_args(args);

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.general.settings));
    Ok((config, settings_path))
}

/// Run the simulator and its post-processing. Returns exit code (0 or 2).
async fn run_simulation(args: &Args, config: &Config, settings_path: &Path) -> Result<i32> {
    let start_time = Instant::now();

    let settings = load_settings(settings_path)?.normalized();
    settings.validate().context("Invalid simulation settings")?;

    let launcher = CommandLauncher::simulator(&config.simulator.interpreter, &config.simulator.entry);

    println!("⚙️  Simulation settings: {}", settings_path.display());
    println!(
        "   Days: {} | Hours/day: {} | Trials: {} ({} recorded)",
        settings.n_days, settings.hours_in_a_day, settings.n_trials, settings.n_trials_recorded
    );
    if config.general.verbose {
        println!("   Buyers: {}", describe_population(&settings.buyers_spec));
        println!(
            "   Sellers: {}",
            describe_population(settings.effective_sellers())
        );
    }

    let (observer, mut events) = ChannelObserver::new();
    let mut orchestrator = RunOrchestrator::new(
        Arc::new(launcher),
        Arc::new(observer),
        config.pipeline_options(),
        &config.simulator.config_file,
    );

    println!(
        "\n🚀 Starting simulator in {}",
        config.simulator.working_dir.display()
    );
    let handle = orchestrator.start(&settings)?;

    let spinner = make_spinner(args.quiet);
    spinner.set_message("Simulating...");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut stage_failed = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if matches!(event, RunEvent::StageFailed { .. }) {
                    stage_failed = true;
                }
                let done = matches!(event, RunEvent::Finished { .. });
                print_event(&spinner, &event);
                if done {
                    break;
                }
            }
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match result {
                    Ok(()) => {
                        spinner.println("⏹️  Interrupt received, canceling run...");
                        orchestrator.cancel(&handle);
                    }
                    Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
                }
            }
        }
    }
    spinner.finish_and_clear();

    let duration = start_time.elapsed().as_secs_f64();
    let status = orchestrator.state();
    println!("\n📊 Run Summary:");
    println!("   Run: {}", handle.id());
    println!(
        "   Started: {}",
        handle.started_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("   Status: {} {}", status.emoji(), status);
    println!("   Duration: {:.1}s", duration);

    match status {
        RunStatus::Completed if !stage_failed => {
            let options = config.pipeline_options();
            println!(
                "\n✅ Run complete! Summary saved to: {}",
                options.resolve(&options.summary_path).display()
            );
            Ok(0)
        }
        RunStatus::Completed => {
            eprintln!("\n⛔ Simulation finished but post-processing failed (exit code 2).");
            Ok(2)
        }
        RunStatus::Canceled => {
            eprintln!("\n🛑 Run canceled (exit code 2).");
            Ok(2)
        }
        _ => anyhow::bail!("run {} ended in state {}", handle.id(), status),
    }
}

fn make_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_event(spinner: &ProgressBar, event: &RunEvent) {
    match event {
        RunEvent::StateChanged {
            status: RunStatus::Completed,
            exit_code,
            ..
        } => match exit_code {
            Some(code) => spinner.println(format!("✅ Simulator finished (exit code {})", code)),
            None => spinner.println("✅ Simulator finished"),
        },
        RunEvent::StateChanged { run, status, .. } => {
            spinner.println(format!("{} {} {}", status.emoji(), run, status));
        }
        RunEvent::StageStarted { stage, .. } => {
            spinner.set_message(format!("Running {}...", stage));
        }
        RunEvent::StageCompleted { stage, detail, .. } => {
            spinner.println(format!("   ✓ {}: {}", stage, detail));
        }
        RunEvent::StageFailed { stage, message, .. } => {
            spinner.println(format!("   ⛔ {} failed: {}", stage, message));
        }
        RunEvent::Warning { message, .. } => {
            spinner.println(format!("   ⚠️  {}", message));
        }
        RunEvent::Finished { .. } => {}
    }
}

fn describe_population(specs: &[settings::TraderSpec]) -> String {
    specs
        .iter()
        .map(|s| format!("{}×{}", s.kind(), s.count()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Summarize an existing table. Progress lines are only printed when the
/// report goes to a file.
fn run_analyze(
    csv: &Path,
    format: OutputFormat,
    output: Option<&Path>,
    summary: Option<&Path>,
) -> Result<i32> {
    let chatty = output.is_some();
    if chatty {
        println!("🔬 Analyzing {}", csv.display());
    }

    let ingested = ingest::ingest_file(csv)?;
    for warning in &ingested.warnings {
        warn!("{}", warning);
    }
    let loss = &ingested.aggregation.coercion_loss;
    if loss.total > 0 {
        warn!("{} non-numeric cell(s) replaced with zero", loss.total);
    }

    if let Some(path) = summary {
        report::summary::write_summary_csv(&ingested.aggregation.stats, path)?;
        if chatty {
            println!("   Summary CSV: {}", path.display());
        }
    }

    let run_report = report::build_report(csv, None, &ingested);
    let rendered = match format {
        OutputFormat::Json => report::generate_json_report(&run_report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&run_report),
    };

    match output {
        Some(path) => {
            report::summary::write_atomic(path, rendered.as_bytes())
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("   Agents: {} | Rows: {}", ingested.schema.len(), ingested.rows);
            println!("\n✅ Analysis complete! Report saved to: {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(0)
}

fn run_compare(summaries: &[PathBuf], output: Option<&Path>) -> Result<i32> {
    let tables = summaries
        .iter()
        .map(|path| report::summary::read_summary_csv(path))
        .collect::<Result<Vec<_>>>()?;

    let rows = ingest::crossrun::compare_runs(&tables);
    let rendered = report::generate_comparison_markdown(&rows, tables.len());

    match output {
        Some(path) => {
            report::summary::write_atomic(path, rendered.as_bytes())
                .with_context(|| format!("Failed to write comparison to {}", path.display()))?;
            println!(
                "✅ Compared {} agent(s) across {} run(s): {}",
                rows.len(),
                tables.len(),
                path.display()
            );
        }
        None => print!("{}", rendered),
    }
    Ok(0)
}

fn handle_settings(action: &SettingsAction, path: &Path) -> Result<i32> {
    match action {
        SettingsAction::Init { force } => {
            if path.exists() && !force {
                eprintln!(
                    "⚠️  {} already exists. Use --force to overwrite it.",
                    path.display()
                );
                return Ok(1);
            }
            RunConfig::default().save(path)?;
            println!("✅ Wrote default settings to {}", path.display());
            Ok(0)
        }
        SettingsAction::Show => {
            let settings = load_settings(path)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            println!("\n# Generated simulator config:\n");
            print!("{}", settings.normalized().render_simulator_config());
            Ok(0)
        }
        SettingsAction::Validate => {
            load_settings(path)?.normalized().validate()?;
            println!("✅ {} is valid", path.display());
            Ok(0)
        }
    }
}

/// Load settings, falling back to defaults when the document is missing.
fn load_settings(path: &Path) -> Result<RunConfig> {
    if path.exists() {
        info!("Loading settings from: {}", path.display());
        RunConfig::load(path)
    } else {
        info!("No settings at {}, using defaults", path.display());
        Ok(RunConfig::default())
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_config_writes_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        assert_eq!(handle_init_config(&path).unwrap(), 0);
        assert!(Config::load(&path).is_ok());

        std::fs::write(&path, "# edited\n").unwrap();
        assert_eq!(handle_init_config(&path).unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited\n");
    }
}
