use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use content_engine_config::{
    constants::task_ids, load_configuration, resolve_effective_config, ConfigError,
    Configuration, GlobalSettings, PartialConfiguration, ResolveOptions,
};
use content_engine_core::TaskSpec;
use content_engine_llm::{
    ClaudeAdapter, ClaudeConfig, OpenAiAdapter, OpenAiConfig, ProviderRegistry, Router,
};
use content_engine_pipeline::{
    build_copy_spec, build_ideas_spec, build_image_brief_spec, build_review_spec, run_task,
    BuildOptions, RouterExecutor, RunOptions,
};

const DEFAULT_CONFIG: &str = "config/content-engine.yaml";

#[derive(Debug, Parser)]
#[command(name = "content-engine", about = "Configuration-driven content generation tasks")]
pub struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
    /// Debug-level logging unless RUST_LOG is set
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check a configuration file and report every issue
    Validate,
    /// Print the effective configuration of one call
    Resolve(ResolveArgs),
    /// Build, execute and validate one task
    Run(RunArgs),
}

#[derive(Debug, Args, Clone)]
struct LayerArgs {
    /// Named preset applied over the base configuration
    #[arg(long)]
    preset: Option<String>,
    /// Run overrides (JSON, YAML or TOML by extension)
    #[arg(long, value_name = "FILE")]
    overrides: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
struct ResolveArgs {
    /// Call id, e.g. ideas.generate
    #[arg(long)]
    call: String,
    #[command(flatten)]
    layers: LayerArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Task {
    Ideas,
    Copy,
    Image,
    Review,
}

impl Task {
    fn call_id(self) -> &'static str {
        match self {
            Task::Ideas => task_ids::IDEAS,
            Task::Copy => task_ids::COPY,
            Task::Image => task_ids::IMAGE_BRIEF,
            Task::Review => task_ids::REVIEW_SUMMARY,
        }
    }
}

#[derive(Debug, Args, Clone)]
struct RunArgs {
    #[arg(long, value_enum)]
    task: Task,
    /// Kernel JSON file
    #[arg(long, value_name = "FILE")]
    kernel: PathBuf,
    /// Selected idea JSON file (copy and image tasks)
    #[arg(long, value_name = "FILE")]
    idea: Option<PathBuf>,
    /// Artifact JSON file to review (review task)
    #[arg(long, value_name = "FILE")]
    subject: Option<PathBuf>,
    /// Use this provider instead of the configured one
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    skip_validation: bool,
    #[command(flatten)]
    layers: LayerArgs,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Validate => validate(&self.config, self.verbose),
            Command::Resolve(args) => {
                let config = load(&self.config, self.verbose)?;
                resolve(&config, &args)
            }
            Command::Run(args) => {
                let config = load(&self.config, self.verbose)?;
                run(&config, &args).await
            }
        }
    }
}

fn load(path: &Path, verbose: bool) -> anyhow::Result<Configuration> {
    let config = load_configuration(path)
        .with_context(|| format!("loading {}", path.display()))?;
    init_tracing(&config.global, verbose);
    log_loaded(path, &config);
    Ok(config)
}

// Logging depends on the loaded settings, so the load is reported afterwards
fn log_loaded(path: &Path, config: &Configuration) {
    tracing::info!(
        path = %path.display(),
        calls = config.calls.len(),
        presets = config.presets.len(),
        "Loaded configuration"
    );
}

fn validate(path: &Path, verbose: bool) -> anyhow::Result<()> {
    match load_configuration(path) {
        Ok(config) => {
            init_tracing(&config.global, verbose);
            log_loaded(path, &config);
            println!(
                "{}: valid ({} calls, {} presets)",
                path.display(),
                config.calls.len(),
                config.presets.len()
            );
            Ok(())
        }
        Err(ConfigError::Invalid(issues)) => {
            for issue in &issues {
                eprintln!("{}", issue);
            }
            bail!("{}: {} issue(s)", path.display(), issues.len())
        }
        Err(e) => Err(e.into()),
    }
}

fn resolve_options(layers: &LayerArgs) -> anyhow::Result<ResolveOptions> {
    let mut options = ResolveOptions::default();
    if let Some(preset) = &layers.preset {
        options = options.with_preset(preset.clone());
    }
    if let Some(path) = &layers.overrides {
        options = options.with_overrides(read_overrides(path)?);
    }
    Ok(options)
}

fn resolve(config: &Configuration, args: &ResolveArgs) -> anyhow::Result<()> {
    let effective = resolve_effective_config(config, &args.call, resolve_options(&args.layers)?)?;
    let report = json!({
        "call_id": effective.call_id,
        "preset": effective.layers.preset_name,
        "global": effective.global,
        "call": effective.call,
        "cost_ceiling": effective.merged.cost_ceiling(&effective.call_id),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run(config: &Configuration, args: &RunArgs) -> anyhow::Result<()> {
    let call_id = args.task.call_id();
    let effective = resolve_effective_config(config, call_id, resolve_options(&args.layers)?)?;
    let merged = effective.merged;

    let spec = build_task_spec(&merged, args)?;
    let executor = RouterExecutor::new(Router::text(Arc::new(registry_from_env()?)), Arc::new(merged.clone()));

    let mut options = RunOptions::default();
    options.provider_override = args.provider.clone();
    options.run_id = args.run_id.clone();
    options.skip_validation = args.skip_validation;

    let result = run_task(&spec, &merged, &executor, None, &options).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        bail!("task {} failed (run {})", call_id, result.audit.run_id);
    }
    Ok(())
}

fn build_task_spec(config: &Configuration, args: &RunArgs) -> anyhow::Result<TaskSpec> {
    let kernel = read_json(&args.kernel)?;
    let mut opts = BuildOptions::default();
    opts.run_id = args.run_id.clone();
    opts.domain = args.domain.clone();

    let spec = match args.task {
        Task::Ideas => build_ideas_spec(config, &kernel, &opts)?,
        Task::Copy => build_copy_spec(config, &kernel, &required(&args.idea, "--idea")?, &opts)?,
        Task::Image => {
            build_image_brief_spec(config, &kernel, &required(&args.idea, "--idea")?, &opts)?
        }
        Task::Review => {
            build_review_spec(config, &kernel, &required(&args.subject, "--subject")?, &opts)?
        }
    };
    Ok(spec)
}

fn required(path: &Option<PathBuf>, flag: &str) -> anyhow::Result<Value> {
    match path {
        Some(path) => read_json(path),
        None => bail!("{} is required for this task", flag),
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Parse an override layer; format follows the file extension
fn read_overrides(path: &Path) -> anyhow::Result<PartialConfiguration> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let layer = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)?,
        Some("toml") => toml::from_str(&text)?,
        _ => serde_json::from_str(&text)?,
    };
    Ok(layer)
}

/// Register every provider with credentials in the environment
fn registry_from_env() -> anyhow::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    if let Some(config) = OpenAiConfig::from_env() {
        registry.register(OpenAiAdapter::new(config)?);
    }
    if let Some(config) = ClaudeConfig::from_env() {
        registry.register(ClaudeAdapter::new(config)?);
    }
    if registry.is_empty() {
        tracing::warn!("No provider credentials found (OPENAI_API_KEY, ANTHROPIC_API_KEY)");
    } else {
        tracing::info!(providers = ?registry.provider_ids(), "Registered providers");
    }
    Ok(registry)
}

fn init_tracing(global: &GlobalSettings, verbose: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { global.log_level.as_str() };
        // Target prefix covers every workspace crate
        format!("content_engine={}", level).into()
    });

    // stdout carries results; logs go to stderr
    let fmt_layer = if global.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    // A second init (tests) is not an error
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
