//! Locaflow - Batch Localization Table Translation
//!
//! Main entry point. Starts the local ollama service when needed, picks the
//! active model and runs translation jobs over CSV and gettext tables.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use locaflow::cancel::cancel;
use locaflow::chat::ChatClient;
use locaflow::cli::{Args, Commands, parse_language_list};
use locaflow::config::{Config, FailurePolicy};
use locaflow::error::LocaflowError;
use locaflow::languages::{SUPPORTED_LANGUAGES, display_name};
use locaflow::models::ModelRegistry;
use locaflow::ollama::OllamaApi;
use locaflow::prompt::PromptPreview;
use locaflow::service::ServiceController;
use locaflow::table::TableFormat;
use locaflow::workflow::{
    JobReport, JobRequest, JobSource, Progress, ProgressObserver, TranslationOrchestrator,
};

const DEFAULT_CONFIG_FILE: &str = "locaflow.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Locaflow - Batch Localization Table Translation");

    let (mut config, config_path) = match &args.config {
        Some(config_path) => (Config::from_file(config_path)?, config_path.clone()),
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            if local.exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                (Config::from_file(&local)?, local)
            } else {
                (Config::default(), local)
            }
        }
    };

    // Commands that never touch the service
    match &args.command {
        Commands::Languages => {
            println!("\n{:<8} {:<25}", "Code", "Language");
            println!("{}", "-".repeat(33));
            for (code, name) in SUPPORTED_LANGUAGES {
                println!("{:<8} {:<25}", code, name);
            }
            return Ok(());
        }
        Commands::Prompt { source, targets } => {
            let mut preview = PromptPreview::new(config.translate.prompt_template.clone());
            preview.set_source(source.clone());
            for target in parse_language_list(targets) {
                preview.toggle_target(&target);
            }
            println!("{}", preview.text());
            return Ok(());
        }
        _ => {}
    }

    let controller = ServiceController::from_config(&config.service)?;
    if let Err(e) = controller.ensure_started().await {
        if matches!(e, LocaflowError::ServiceUnavailable(_)) {
            warn!("Install ollama or set service.binary_path in {}", DEFAULT_CONFIG_FILE);
        }
        return Err(e.into());
    }

    let api = OllamaApi::new(&config.service)?;
    let mut registry = ModelRegistry::new(Arc::new(api.clone()));

    match args.command {
        Commands::Models => {
            let local = registry.list_local().await?;
            let loaded = registry.list_loaded().await?;
            if local.is_empty() {
                println!("No models installed. Pull one with `ollama pull <model>`.");
            } else {
                println!("\n{:<40} {:<10}", "Model", "Status");
                println!("{}", "-".repeat(50));
                for model in &local {
                    let status = if loaded.iter().any(|m| m.name == model.name) { "Loaded" } else { "" };
                    println!("{:<40} {:<10}", model.name, status);
                }
            }
        }
        Commands::Use { model } => {
            registry.set_active(&model).await?;
            config.translate.default_model = Some(model.clone());
            config.save_to_file(&config_path)?;
            info!("Saved {} as default model in {}", model, config_path.display());
        }
        Commands::Translate { input, source, targets, output, strategy, abort_on_failure, model } => {
            info!("Translating table: {}", input.display());
            if let Some(strategy) = strategy {
                config.translate.strategy = strategy.into();
            }
            if abort_on_failure {
                config.translate.failure_policy = FailurePolicy::Abort;
            }
            activate_model(&mut registry, model.as_deref(), &config).await?;

            let chat = Arc::new(ChatClient::new(api, &config.service));
            let mut orchestrator = TranslationOrchestrator::new(controller, registry, chat, config.translate.clone());
            watch_ctrl_c(&orchestrator);

            let output = output.unwrap_or_else(|| input.clone());
            let report = run_job(&mut orchestrator, input, &source, parse_language_list(&targets), &output).await?;
            println!("{}", report.summary());
        }
        Commands::Batch { input_dir, source, targets, output_dir, strategy, model } => {
            info!("Processing directory: {}", input_dir.display());
            if let Some(strategy) = strategy {
                config.translate.strategy = strategy.into();
            }
            activate_model(&mut registry, model.as_deref(), &config).await?;

            let chat = Arc::new(ChatClient::new(api, &config.service));
            let mut orchestrator = TranslationOrchestrator::new(controller, registry, chat, config.translate.clone());
            watch_ctrl_c(&orchestrator);

            let files: Vec<PathBuf> = WalkDir::new(&input_dir)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && TableFormat::is_supported(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            info!("Found {} table(s) to translate", files.len());

            let targets = parse_language_list(&targets);
            let mut failed = 0;
            for file in files {
                let output = match &output_dir {
                    Some(dir) => {
                        let relative = pathdiff::diff_paths(&file, &input_dir).unwrap_or_else(|| file.clone());
                        let output = dir.join(relative);
                        if let Some(parent) = output.parent() {
                            std::fs::create_dir_all(parent)?;
                        }
                        output
                    }
                    None => file.clone(),
                };

                match run_job(&mut orchestrator, file.clone(), &source, targets.clone(), &output).await {
                    Ok(report) => {
                        if !report.is_clean() {
                            failed += 1;
                        }
                        println!("{}: {}", file.display(), report.summary());
                    }
                    Err(LocaflowError::Cancelled) => return Err(LocaflowError::Cancelled.into()),
                    Err(e) => {
                        failed += 1;
                        warn!("Skipping {}: {}", file.display(), e);
                    }
                }
            }
            if failed > 0 {
                warn!("{} table(s) had failures", failed);
            }
        }
        Commands::Languages | Commands::Prompt { .. } => {}
    }

    info!("Locaflow completed successfully");
    Ok(())
}

async fn activate_model(registry: &mut ModelRegistry, requested: Option<&str>, config: &Config) -> Result<()> {
    match requested {
        Some(name) => registry.set_active(name).await?,
        None => {
            if registry.select_default(config.translate.default_model.as_deref()).await?.is_none() {
                return Err(LocaflowError::Precondition("no model is installed".to_string()).into());
            }
        }
    }
    Ok(())
}

fn watch_ctrl_c(orchestrator: &TranslationOrchestrator) {
    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current chunk");
            cancel(&token);
        }
    });
}

/// Prepare and run one job, then write whatever columns were produced.
async fn run_job(
    orchestrator: &mut TranslationOrchestrator,
    input: PathBuf,
    source: &str,
    targets: Vec<String>,
    output: &Path,
) -> std::result::Result<JobReport, LocaflowError> {
    let request = JobRequest {
        source: Some(JobSource::File(input)),
        source_language: Some(source.to_string()),
        target_languages: targets,
    };
    let mut job = orchestrator.prepare(request).await?;

    let mut observer = BarObserver::new(job.progress.total);
    let result = orchestrator.execute(&mut job, &mut observer).await;
    observer.bar.finish_and_clear();

    job.save_to(output)?;
    result
}

/// Pass-level progress bar; stream chunks only move the spinner.
struct BarObserver {
    bar: ProgressBar,
    received: usize,
}

impl BarObserver {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar, received: 0 }
    }
}

impl ProgressObserver for BarObserver {
    fn on_pass_started(&mut self, language: &str, _index: usize, _total: usize) {
        self.received = 0;
        self.bar.set_message(display_name(language));
    }

    fn on_chunk(&mut self, language: &str, chunk: &str) {
        self.received += chunk.chars().count();
        self.bar.set_message(format!("{} ({} chars)", display_name(language), self.received));
        self.bar.tick();
    }

    fn on_progress(&mut self, progress: Progress, language: &str, error: Option<&LocaflowError>) {
        self.bar.set_position(progress.completed as u64);
        if let Some(error) = error {
            self.bar.println(format!("{} failed: {}", display_name(language), error));
        }
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".locaflow").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "locaflow.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("locaflow.log").display());

    Ok(())
}
