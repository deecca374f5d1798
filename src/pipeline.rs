//! The analysis pipeline.
//!
//! One run is a strictly forward state machine:
//!
//! ```text
//! Idle → Acquiring → Reading → Inferring → Persisting → CleaningUp → Completed | Failed
//!           │           │          │            │            ▲
//!           └───────────┴──────────┴────────────┴── failure ─┘
//! ```
//!
//! Any stage failure jumps straight to `CleaningUp` carrying the pending
//! outcome. `CleaningUp` always runs; it removes the working tree and can only
//! log, never change the outcome. Exactly one terminal event (`Result` or
//! `Error`) is emitted after it.
//!
//! If the observer disconnects, the in-flight stage future is dropped (the
//! `git` child is killed, HTTP requests are abandoned) and the run proceeds to
//! `CleaningUp` with [`AnalysisError::Cancelled`]. Should the run future itself
//! be dropped or panic, [`WorkingTree`]'s `Drop` removes the directory.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::accumulator::accumulate;
use crate::config::Config;
use crate::events::{EventSink, Emitter, NullSink};
use crate::generate::{create_generator, Generator};
use crate::models::{AggregateContext, AnalysisRecord, PipelineEvent};
use crate::source::{GitFetcher, SourceFetcher, SourceSpec};
use crate::store::RecordStore;
use crate::walker;

/// Why a run failed. The `Display` text is what observers see in the
/// terminal `Error` event.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to acquire repository: {0}")]
    Acquisition(String),
    #[error("empty or no valid files")]
    EmptyCorpus,
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("failed to save analysis: {0}")]
    Storage(String),
    #[error("cancelled: observer disconnected")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

fn chain(err: anyhow::Error) -> String {
    format!("{:#}", err)
}

/// Pipeline states, in the only order they may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    Acquiring,
    Reading,
    Inferring,
    Persisting,
    CleaningUp,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Acquiring => "acquiring",
            Stage::Reading => "reading",
            Stage::Inferring => "inferring",
            Stage::Persisting => "persisting",
            Stage::CleaningUp => "cleaning_up",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Current stage of one run; only moves forward.
#[derive(Debug)]
struct StageCursor(Stage);

impl StageCursor {
    fn enter(&mut self, next: Stage) {
        debug_assert!(next > self.0, "stage {} cannot follow {}", next, self.0);
        tracing::info!(from = %self.0, to = %next, "stage");
        self.0 = next;
    }
}

// ============ Working tree ============

/// Per-run staging directory. Removal is idempotent, and a tree that was
/// never explicitly removed is removed on drop.
#[derive(Debug)]
pub struct WorkingTree {
    path: PathBuf,
    removed: bool,
}

impl WorkingTree {
    /// Reserve a fresh, unique path under `work_root`. Nothing is created.
    pub fn allocate(work_root: &Path) -> Self {
        Self {
            path: work_root.join(format!("run-{}", Uuid::new_v4())),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recursively delete the tree. Succeeds if it is already gone.
    pub async fn remove(&mut self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.removed = true;
        Ok(())
    }
}

impl Drop for WorkingTree {
    fn drop(&mut self) {
        if !self.removed && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove working tree on drop");
            }
        }
    }
}

// ============ Settings ============

/// Fixed parameters of a run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub budget_chars: usize,
    pub min_chars: usize,
    pub truncation_guard: f64,
    pub max_depth: usize,
    pub work_root: PathBuf,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            budget_chars: config.corpus.budget_chars,
            min_chars: config.corpus.min_chars,
            truncation_guard: config.corpus.truncation_guard,
            max_depth: config.corpus.max_depth,
            work_root: config.git.work_root(),
        }
    }
}

// ============ Pipeline ============

/// Drives runs against its three collaborators. Cheap to share: wrap it in an
/// `Arc` and call [`run`](Pipeline::run) from as many tasks as needed.
pub struct Pipeline {
    fetcher: Arc<dyn SourceFetcher>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn RecordStore>,
    settings: Settings,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn RecordStore>,
        settings: Settings,
    ) -> Self {
        Self {
            fetcher,
            generator,
            store,
            settings,
        }
    }

    /// Git fetcher and generator as configured, over the given store.
    pub fn from_config(config: &Config, store: Arc<dyn RecordStore>) -> Result<Self> {
        let generator: Arc<dyn Generator> = Arc::from(create_generator(&config.generation)?);
        Ok(Self::new(
            Arc::new(GitFetcher::from_config(&config.git)),
            generator,
            store,
            Settings::from_config(config),
        ))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Analyze without an observer.
    pub async fn analyze(&self, url: &str) -> Result<AnalysisRecord, AnalysisError> {
        self.run(url, &NullSink).await
    }

    /// Execute one run, reporting to `sink`. The same outcome delivered as the
    /// terminal event is returned.
    pub async fn run(
        &self,
        url: &str,
        sink: &dyn EventSink,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let mut tree = WorkingTree::allocate(&self.settings.work_root);
        let run_id = tree
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let span = tracing::info_span!("analysis", run = %run_id, url = %url);

        async move {
            let emitter = Emitter::new(sink);
            let mut stage = StageCursor(Stage::Idle);

            let outcome = self.drive(url, &tree, &emitter, &mut stage).await;

            stage.enter(Stage::CleaningUp);
            if let Err(e) = tree.remove().await {
                tracing::warn!(path = %tree.path().display(), error = %e, "cleanup failed");
            }

            match &outcome {
                Ok(record) => {
                    stage.enter(Stage::Completed);
                    tracing::info!(id = %record.id, "analysis completed");
                    emitter
                        .finish(PipelineEvent::Result {
                            payload: record.clone(),
                        })
                        .await;
                }
                Err(err) => {
                    stage.enter(Stage::Failed);
                    tracing::warn!(error = %err, "analysis failed");
                    emitter
                        .finish(PipelineEvent::Error {
                            message: err.to_string(),
                        })
                        .await;
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        url: &str,
        tree: &WorkingTree,
        emitter: &Emitter<'_>,
        stage: &mut StageCursor,
    ) -> Result<AnalysisRecord, AnalysisError> {
        stage.enter(Stage::Acquiring);
        emitter.status("starting").await;
        let source = SourceSpec::parse(url).map_err(|e| AnalysisError::Acquisition(chain(e)))?;
        emitter.status("cloning").await;
        until_cancelled(emitter, self.fetcher.fetch_repository(&source, tree.path()))
            .await?
            .map_err(|e| AnalysisError::Acquisition(chain(e)))?;
        let root = source
            .resolve_scan_root(tree.path())
            .map_err(|e| AnalysisError::Acquisition(chain(e)))?;

        stage.enter(Stage::Reading);
        emitter.status("reading").await;
        let aggregate = until_cancelled(emitter, self.read(root)).await??;
        tracing::info!(
            files = aggregate.files_included,
            chars = aggregate.consumed_chars,
            budget = aggregate.budget_chars,
            truncated = aggregate.truncated,
            "corpus assembled"
        );
        if aggregate.text.trim().is_empty()
            || aggregate.text.chars().count() < self.settings.min_chars
        {
            return Err(AnalysisError::EmptyCorpus);
        }

        stage.enter(Stage::Inferring);
        emitter.status("analyzing").await;
        tracing::info!(model = self.generator.model_name(), "requesting generation");
        let text = until_cancelled(
            emitter,
            self.generator.generate(&aggregate.text, &source.identity),
        )
        .await?
        .map_err(|e| AnalysisError::Generation(chain(e)))?;

        stage.enter(Stage::Persisting);
        emitter.status("saving").await;
        let record = AnalysisRecord::new(source.url.clone(), text);
        until_cancelled(emitter, self.store.create(&record))
            .await?
            .map_err(|e| AnalysisError::Storage(chain(e)))?;

        Ok(record)
    }

    /// Walk and accumulate on the blocking pool.
    async fn read(&self, root: PathBuf) -> Result<AggregateContext, AnalysisError> {
        let Settings {
            budget_chars,
            truncation_guard,
            max_depth,
            ..
        } = self.settings.clone();
        tokio::task::spawn_blocking(move || {
            accumulate(
                walker::candidates(&root, max_depth),
                budget_chars,
                truncation_guard,
            )
        })
        .await
        .map_err(|e| AnalysisError::Internal(format!("reader task failed: {}", e)))
    }
}

/// Race `fut` against observer disconnection.
async fn until_cancelled<F: Future>(
    emitter: &Emitter<'_>,
    fut: F,
) -> Result<F::Output, AnalysisError> {
    tokio::select! {
        biased;
        _ = emitter.cancelled() => Err(AnalysisError::Cancelled),
        out = fut => Ok(out),
    }
}
