mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use cf_av::{probe, FfmpegRunner, ToolRegistry, Workspace};
use cf_core::config::Config;
use cf_pipeline::{ContentSource, DirectorySource, NoContent, TaskGraphExecutor};
use cf_plan::{
    normalize_plan_str, validate_plan, PlanRepairer, RecordedProposals, SidecarTranscriber, Slot,
    SlotPlanner, Transcriber, Transcript,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise the verbose flag picks the level.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "cutforge=trace,cf_core=debug,cf_av=debug,cf_plan=debug,cf_pipeline=debug".to_string()
        } else {
            "cutforge=info,cf_core=info,cf_av=info,cf_plan=info,cf_pipeline=info".to_string()
        }
    });

    // Logs go to stderr so plan and slot JSON on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            input,
            plan,
            output,
            library,
            scratch,
            no_repair,
        } => {
            let mut config = Config::load_or_default(config_path);
            if library.is_some() {
                config.content.library_dir = library;
            }
            if scratch.is_some() {
                config.executor.scratch_dir = scratch;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_plan(&config, &input, &plan, &output, !no_repair))
        }
        Commands::Repair { plan, slots } => {
            let config = Config::load_or_default(config_path);
            repair_plan(&config, &plan, slots.as_deref())
        }
        Commands::Slots {
            transcript,
            duration,
            media,
            proposals,
            max_inserts,
        } => {
            let mut config = Config::load_or_default(config_path);
            if let Some(n) = max_inserts {
                config.rules.max_inserts = n;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(compute_slots(
                &config,
                transcript.as_deref(),
                duration,
                media.as_deref(),
                proposals.as_deref(),
            ))
        }
        Commands::CheckTools => check_tools(&Config::load_or_default(config_path)),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("cutforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Read a plan file and bring it into canonical form. Repairs are logged
/// by the repairer itself.
fn load_plan(config: &Config, plan: &Path, repair: bool) -> Result<Vec<cf_plan::Task>> {
    let json = std::fs::read_to_string(plan)
        .with_context(|| format!("failed to read plan {}", plan.display()))?;
    let normalized = normalize_plan_str(&json)?;
    if !normalized.dropped.is_empty() {
        tracing::warn!("Dropped {} malformed plan record(s)", normalized.dropped.len());
    }

    if !repair {
        return Ok(normalized.tasks);
    }

    let (tasks, _) = PlanRepairer::new(config.rules.clone()).repair(normalized.tasks);
    Ok(tasks)
}

async fn run_plan(
    config: &Config,
    input: &Path,
    plan: &Path,
    output: &Path,
    repair: bool,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let tasks = load_plan(config, plan, repair)?;
    for issue in validate_plan(&tasks) {
        tracing::warn!("Plan issue: {issue}");
    }

    let tools = ToolRegistry::discover(&config.tools);
    let runner = FfmpegRunner::from_config(&tools, &config.executor)?;

    let content: Arc<dyn ContentSource> = match &config.content.library_dir {
        Some(dir) => {
            let mut library = DirectorySource::new(dir);
            if let Ok(ffprobe) = tools.require("ffprobe") {
                library = library.with_probe(ffprobe.to_path_buf());
            }
            Arc::new(library)
        }
        None => Arc::new(NoContent),
    };

    let mut executor = TaskGraphExecutor::new(Arc::new(runner)).with_content_source(content);
    if let Some(font) = &config.executor.font_path {
        executor = executor.with_font(font.clone());
    }

    let workspace = match &config.executor.scratch_dir {
        Some(dir) => Workspace::in_dir(dir)?,
        None => Workspace::new()?,
    };

    let report = executor.run(&tasks, input, output, &workspace).await?;

    println!("Output: {}", report.output.display());
    println!("Steps: {}", report.steps);
    if !report.produced.is_empty() {
        println!("Produced: {}", report.produced.join(", "));
    }
    for skipped in &report.skipped {
        println!("Skipped #{} {}: {}", skipped.index, skipped.step, skipped.reason);
    }
    Ok(())
}

fn repair_plan(config: &Config, plan: &Path, slots: Option<&Path>) -> Result<()> {
    let tasks = load_plan(config, plan, false)?;
    let repairer = PlanRepairer::new(config.rules.clone());

    let (tasks, _) = match slots {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read slots {}", path.display()))?;
            let slots: Vec<Slot> = serde_json::from_str(&json).context("invalid slots JSON")?;
            repairer.repair_with_slots(tasks, &slots)
        }
        None => repairer.repair(tasks),
    };

    for issue in validate_plan(&tasks) {
        tracing::warn!("Plan issue: {issue}");
    }

    println!("{}", serde_json::to_string_pretty(&tasks)?);
    Ok(())
}

async fn compute_slots(
    config: &Config,
    transcript: Option<&Path>,
    duration: Option<f64>,
    media: Option<&Path>,
    proposals: Option<&Path>,
) -> Result<()> {
    let transcript = match (transcript, media) {
        (Some(path), _) => Transcript::load(path)
            .with_context(|| format!("failed to read transcript {}", path.display()))?,
        (None, Some(media)) => SidecarTranscriber
            .transcribe(media)
            .await
            .with_context(|| format!("no transcript for {}", media.display()))?,
        (None, None) => anyhow::bail!("either --transcript or --media is required"),
    };

    let duration = match (duration, media) {
        (Some(d), _) => d,
        (None, Some(media)) => {
            let tools = ToolRegistry::discover(&config.tools);
            let summary = probe::probe_media(tools.require("ffprobe")?, media).await?;
            summary
                .duration
                .with_context(|| format!("could not determine duration of {}", media.display()))?
        }
        (None, None) => anyhow::bail!("either --duration or --media is required"),
    };

    let planner = SlotPlanner::new(config.rules.clone());
    let slots = match proposals {
        Some(path) => {
            let ranker = RecordedProposals::load(path)
                .with_context(|| format!("failed to read proposals {}", path.display()))?;
            planner.plan_with(&ranker, &transcript, duration).await
        }
        None => planner.plan(&transcript, duration),
    };

    tracing::info!("Planned {} slot(s) over {duration:.1}s", slots.len());
    println!("{}", serde_json::to_string_pretty(&slots)?);
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{status} {} ({})", tool.name, tool.purpose);
        if let Some(path) = &tool.path {
            print!(" - {}", path.display());
        }
        println!();
        if let Some(version) = &tool.version {
            println!("    {version}");
        }
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read config {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let rules = &config.rules;
    println!(
        "  Inserts: up to {}, {:.1}-{:.1}s each, {:.1}s apart",
        rules.max_inserts, rules.min_duration, rules.max_duration, rules.min_gap
    );
    println!(
        "  Margins: first {:.1}s, last {:.1}s",
        rules.avoid_first, rules.avoid_last
    );
    println!("  Tool timeout: {}s", config.executor.tool_timeout_secs);
    if let Some(dir) = &config.content.library_dir {
        println!("  Content library: {}", dir.display());
    }

    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }

    Ok(())
}
