//! Batch translation of a localization table, one target language at a time.
//!
//! A job moves through `Idle → Validating → RunningPass(i) → Done | Failed`.
//! [`TranslationOrchestrator::prepare`] validates and ingests without touching the
//! network beyond the liveness probe; [`TranslationOrchestrator::execute`] runs the
//! passes strictly in selection order and writes each column only after its full
//! reply has been reconciled.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::{CancellationToken, is_cancelled, new_token, reset};
use crate::chat::{ChatBackend, ChatMessage, ChatRequest, ResponseMode};
use crate::config::{FailurePolicy, StrategyKind, TranslateConfig};
use crate::error::{Result, LocaflowError};
use crate::models::ModelRegistry;
use crate::prompt::pass_prompt;
use crate::service::ServiceController;
use crate::table::{LocalizationTable, TableFormat, load_table, save_table};
use crate::translate::{ContentStrategy, StrategyFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Validating,
    /// Index into the job's target languages
    RunningPass(usize),
    Done,
    Failed,
}

/// Where the rows of a job come from
#[derive(Debug, Clone)]
pub enum JobSource {
    File(PathBuf),
    Table(LocalizationTable),
}

/// Selections made before a job starts; any of them may still be missing.
#[derive(Debug, Clone, Default)]
pub struct JobRequest {
    pub source: Option<JobSource>,
    pub source_language: Option<String>,
    pub target_languages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    fn advance(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.completed, self.total)
    }
}

/// A validated job. The table is owned here so columns written by finished
/// passes survive a failed or cancelled run.
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub id: Uuid,
    pub source_path: Option<PathBuf>,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub table: LocalizationTable,
    pub progress: Progress,
}

impl TranslationJob {
    /// Write the table to `output` and return every file written.
    ///
    /// CSV keeps all languages in one file. A gettext catalog holds a single
    /// language, so each target goes to `<stem>.<lang>.po` next to `output`;
    /// `output` itself is used only for a single target when it is not the
    /// catalog the job was read from.
    pub fn save_to(&self, output: &Path) -> Result<Vec<PathBuf>> {
        let format = TableFormat::from_path(output)?;
        if format == TableFormat::Csv {
            save_table(&self.table, output, &self.source_language, None)?;
            info!("Wrote {}", output.display());
            return Ok(vec![output.to_path_buf()]);
        }

        let overwrites_source = self.source_path.as_deref().is_some_and(|source| {
            source == output
                || matches!((source.canonicalize(), output.canonicalize()), (Ok(a), Ok(b)) if a == b)
        });
        let direct = self.target_languages.len() == 1 && format == TableFormat::Po && !overwrites_source;
        let stem = output.file_stem().and_then(|s| s.to_str()).unwrap_or("messages");

        let mut written = Vec::with_capacity(self.target_languages.len());
        for target in &self.target_languages {
            let path = if direct {
                output.to_path_buf()
            } else {
                output.with_file_name(format!("{}.{}.po", stem, target))
            };
            save_table(&self.table, &path, &self.source_language, Some(target))?;
            info!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

#[derive(Debug)]
pub struct PassFailure {
    pub language: String,
    pub error: LocaflowError,
}

#[derive(Debug)]
pub struct JobReport {
    pub job_id: Uuid,
    pub completed: Vec<String>,
    pub failures: Vec<PassFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "Job {}: {} language(s) translated, {} failed in {:.1}s",
            self.job_id,
            self.completed.len(),
            self.failures.len(),
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
        );
        for failure in &self.failures {
            out.push_str(&format!("\n  {}: {}", failure.language, failure.error));
        }
        out
    }
}

/// Callbacks for presentation layers. Chunks are for responsiveness only.
pub trait ProgressObserver: Send {
    fn on_pass_started(&mut self, _language: &str, _index: usize, _total: usize) {}

    fn on_chunk(&mut self, _language: &str, _chunk: &str) {}

    /// Called exactly once per finished pass, after its column was written
    fn on_progress(&mut self, _progress: Progress, _language: &str, _error: Option<&LocaflowError>) {}
}

pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

pub struct TranslationOrchestrator {
    service: ServiceController,
    registry: ModelRegistry,
    chat: Arc<dyn ChatBackend>,
    config: TranslateConfig,
    strategy: Box<dyn ContentStrategy>,
    state: JobState,
    cancel: CancellationToken,
}

impl TranslationOrchestrator {
    pub fn new(
        service: ServiceController,
        registry: ModelRegistry,
        chat: Arc<dyn ChatBackend>,
        config: TranslateConfig,
    ) -> Self {
        let strategy = StrategyFactory::create(config.strategy);
        Self {
            service,
            registry,
            chat,
            config,
            strategy,
            state: JobState::Idle,
            cancel: new_token(),
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn service(&self) -> &ServiceController {
        &self.service
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Model changes need `&mut self`, so they cannot overlap a running pass.
    pub fn registry_mut(&mut self) -> &mut ModelRegistry {
        &mut self.registry
    }

    pub fn set_strategy(&mut self, kind: StrategyKind) {
        self.config.strategy = kind;
        self.strategy = StrategyFactory::create(kind);
    }

    pub fn set_failure_policy(&mut self, policy: FailurePolicy) {
        self.config.failure_policy = policy;
    }

    /// Token that stops the current job between passes and between stream chunks
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check every precondition, then ingest the source. Nothing is mutated on failure.
    /// A cancellation left over from the previous job is cleared.
    pub async fn prepare(&mut self, request: JobRequest) -> Result<TranslationJob> {
        reset(&self.cancel);
        self.state = JobState::Validating;
        match self.validate_and_ingest(request).await {
            Ok(job) => {
                info!(
                    "Prepared job {}: {} rows, {} -> {}",
                    job.id,
                    job.table.len(),
                    job.source_language,
                    job.target_languages.join(",")
                );
                self.state = JobState::Idle;
                Ok(job)
            }
            Err(e) => {
                warn!("Job rejected: {}", e);
                self.state = JobState::Failed;
                Err(e)
            }
        }
    }

    async fn validate_and_ingest(&self, request: JobRequest) -> Result<TranslationJob> {
        let source = request
            .source
            .ok_or_else(|| LocaflowError::Precondition("no source file selected".to_string()))?;
        if let JobSource::File(path) = &source {
            if !path.is_file() {
                return Err(LocaflowError::Precondition(format!(
                    "source file does not exist: {}",
                    path.display()
                )));
            }
        }

        let source_language = request
            .source_language
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| LocaflowError::Precondition("no source language selected".to_string()))?;

        let mut target_languages: Vec<String> = Vec::new();
        for target in request.target_languages {
            let target = target.trim().to_string();
            if !target.is_empty() && !target_languages.contains(&target) {
                target_languages.push(target);
            }
        }
        if target_languages.is_empty() {
            return Err(LocaflowError::Precondition("no target language selected".to_string()));
        }
        if target_languages.contains(&source_language) {
            return Err(LocaflowError::Precondition(format!(
                "target languages include the source language '{}'",
                source_language
            )));
        }

        if !self.service.detect_running().await {
            return Err(LocaflowError::Precondition(format!(
                "inference service is not reachable at {}",
                self.service.lifecycle().host()
            )));
        }
        if self.registry.active().is_none() {
            return Err(LocaflowError::Precondition("no model is active".to_string()));
        }

        let (source_path, table) = match source {
            JobSource::File(path) => {
                let table = load_table(&path, &source_language)?;
                (Some(path), table)
            }
            JobSource::Table(table) => (None, table),
        };
        if table.is_empty() {
            return Err(LocaflowError::Precondition("source contains no rows".to_string()));
        }
        table.validate_source(&source_language)?;

        let total = target_languages.len();
        Ok(TranslationJob {
            id: Uuid::new_v4(),
            source_path,
            source_language,
            target_languages,
            table,
            progress: Progress { completed: 0, total },
        })
    }

    /// Run every target-language pass in selection order.
    ///
    /// With [`FailurePolicy::Isolate`] a failed pass is recorded and the next language
    /// runs; with [`FailurePolicy::Abort`] the first failure ends the job with that error.
    /// Cancellation ends the job with [`LocaflowError::Cancelled`]. Columns already
    /// written stay in `job.table` in every case.
    pub async fn execute(
        &mut self,
        job: &mut TranslationJob,
        observer: &mut dyn ProgressObserver,
    ) -> Result<JobReport> {
        let started_at = Utc::now();
        let mut completed = Vec::new();
        let mut failures = Vec::new();
        let total = job.target_languages.len();
        let targets = job.target_languages.clone();

        for (index, target) in targets.iter().enumerate() {
            if is_cancelled(&self.cancel) {
                info!("Job {} cancelled before pass {}", job.id, index + 1);
                self.state = JobState::Failed;
                return Err(LocaflowError::Cancelled);
            }

            self.state = JobState::RunningPass(index);
            observer.on_pass_started(target, index, total);
            info!(
                "┌─ Pass {}/{}: {} -> {} ({} rows) ────────",
                index + 1,
                total,
                job.source_language,
                target,
                job.table.len()
            );

            let outcome = self.run_pass(job, target, observer).await;
            match &outcome {
                Ok(()) => info!("└─ {} done", target),
                Err(LocaflowError::Cancelled) => {
                    warn!("└─ {} cancelled", target);
                    self.state = JobState::Failed;
                    return Err(LocaflowError::Cancelled);
                }
                Err(e) => warn!("└─ {} failed: {}", target, e),
            }

            job.progress.advance();
            observer.on_progress(job.progress, target, outcome.as_ref().err());

            match outcome {
                Ok(()) => completed.push(target.clone()),
                Err(error) => {
                    if self.config.failure_policy == FailurePolicy::Abort {
                        self.state = JobState::Failed;
                        return Err(error);
                    }
                    failures.push(PassFailure {
                        language: target.clone(),
                        error,
                    });
                }
            }
        }

        self.state = JobState::Done;
        let report = JobReport {
            job_id: job.id,
            completed,
            failures,
            started_at,
            finished_at: Utc::now(),
        };
        info!("{}", report.summary());
        Ok(report)
    }

    async fn run_pass(
        &self,
        job: &mut TranslationJob,
        target: &str,
        observer: &mut dyn ProgressObserver,
    ) -> Result<()> {
        let model = self
            .registry
            .active()
            .ok_or_else(|| LocaflowError::Precondition("no model is active".to_string()))?
            .to_string();

        let mut system = pass_prompt(&self.config.prompt_template, &job.source_language, target);
        system.push_str(&self.strategy.reply_instructions(job.table.len()));
        let user = self.strategy.build_message(&job.table, &job.source_language)?;

        let mode = if self.config.stream { ResponseMode::Streaming } else { ResponseMode::Single };
        let mut request = ChatRequest::new(model, vec![ChatMessage::system(system), ChatMessage::user(user)])
            .with_mode(mode);
        if let Some(format) = self.strategy.format_hint() {
            request = request.with_format(format);
        }

        let reply = match mode {
            ResponseMode::Streaming => {
                let mut on_chunk = |chunk: &str| observer.on_chunk(target, chunk);
                self.chat.stream(&request, &mut on_chunk, Some(&self.cancel)).await?
            }
            ResponseMode::Single => self.chat.send(&request).await?,
        };
        debug!("Complete reply for {} ({} chars)", target, reply.chars().count());

        let reconciliation = self
            .strategy
            .reconcile(&reply, &job.table, &job.source_language, target)?;
        let assigned = reconciliation.assignments.len();
        job.table.set_column(target, reconciliation.assignments);
        info!("│ Assigned {} of {} rows for {}", assigned, job.table.len(), target);

        match reconciliation.gap {
            Some(gap) => Err(gap),
            None => Ok(()),
        }
    }
}
