//! engine
//!
//! Run orchestration: file discovery, document fan-out, reference fan-out,
//! update application, and staged output writing.
//!
//! # Concurrency
//!
//! Documents are processed concurrently, and references within a document
//! are reconciled concurrently against the immutable run context. Results
//! are collected and applied in reference order, so diagnostics and
//! document mutations are reproducible regardless of task scheduling.
//!
//! # All-or-nothing
//!
//! Serialized outputs are staged in memory and written only after every
//! document has reconciled successfully. Any hard failure aborts the run
//! before anything is written, so the tool never leaves a subset of
//! documents rewritten.

pub mod pipeline;

pub use pipeline::RunContext;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;

use crate::core::diagnostics::{Diagnostic, Diagnostics};
use crate::core::errors::ReconcileError;
use crate::document::{self, DocumentError, Reference, ReferenceUpdate, SerializeOptions};

/// Errors from engine orchestration.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("document error in `{path}`: {source}")]
    Document {
        path: PathBuf,
        source: DocumentError,
    },

    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid file glob `{pattern}`: {source}")]
    Glob {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("no matching files specified by `--file` were found")]
    NoFiles,

    #[error("worker task failed: {0}")]
    Task(String),
}

/// What a successful run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// All diagnostics, merged in document order then reference order.
    pub diagnostics: Vec<Diagnostic>,
    /// The files written (empty in dry-run mode).
    pub written: Vec<PathBuf>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

#[derive(Debug)]
struct DocumentOutcome {
    output_path: PathBuf,
    serialized: String,
    diagnostics: Vec<Diagnostic>,
}

/// The run orchestrator.
pub struct Engine {
    ctx: Arc<RunContext>,
}

impl Engine {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    /// Execute one run: discover files, reconcile every reference in every
    /// document, then write all outputs (unless dry-run).
    ///
    /// # Errors
    ///
    /// The first hard failure, in document order; nothing is written when
    /// any document fails.
    pub async fn run(&self) -> Result<RunOutcome, EngineError> {
        let inputs = self.expand_files()?;

        let mut loaded = Vec::with_capacity(inputs.len());
        for (input, output) in inputs {
            let contents = tokio::fs::read_to_string(&input).await.map_err(|source| {
                EngineError::Read {
                    path: input.clone(),
                    source,
                }
            })?;
            loaded.push((input, output, contents));
        }

        let mut join_set = JoinSet::new();
        let document_count = loaded.len();
        for (index, (input, output, contents)) in loaded.into_iter().enumerate() {
            let ctx = Arc::clone(&self.ctx);
            join_set.spawn(async move {
                (index, process_document(ctx, input, output, contents).await)
            });
        }

        let mut slots: Vec<Option<Result<DocumentOutcome, EngineError>>> =
            (0..document_count).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|e| EngineError::Task(e.to_string()))?;
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
        }

        // Surface the first failure in document order for determinism.
        let mut documents = Vec::with_capacity(document_count);
        for slot in slots {
            match slot {
                Some(Ok(outcome)) => documents.push(outcome),
                Some(Err(e)) => return Err(e),
                None => return Err(EngineError::Task("missing document outcome".into())),
            }
        }

        let mut diagnostics = Vec::new();
        let mut written = Vec::new();
        for outcome in documents {
            diagnostics.extend(outcome.diagnostics);
            if !self.ctx.options.dry_run {
                if let Some(parent) = outcome.output_path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|source| {
                        EngineError::Write {
                            path: outcome.output_path.clone(),
                            source,
                        }
                    })?;
                }
                tokio::fs::write(&outcome.output_path, outcome.serialized.as_bytes())
                    .await
                    .map_err(|source| EngineError::Write {
                        path: outcome.output_path.clone(),
                        source,
                    })?;
                diagnostics.push(Diagnostic::info(format!(
                    "finished writing to {}",
                    outcome.output_path.display()
                )));
                written.push(outcome.output_path);
            }
        }

        Ok(RunOutcome {
            diagnostics,
            written,
            dry_run: self.ctx.options.dry_run,
        })
    }

    /// Resolve the `files` option into (input, output) pairs.
    ///
    /// Globs are expanded unless `no_globs` is set or explicit output
    /// paths were given (output paths pair positionally with inputs, which
    /// glob expansion would break).
    fn expand_files(&self) -> Result<Vec<(PathBuf, PathBuf)>, EngineError> {
        let options = &self.ctx.options;
        let mut inputs = Vec::new();

        if options.no_globs || !options.output_paths.is_empty() {
            for (index, file) in options.files.iter().enumerate() {
                let input = options.cwd.join(file);
                let output = options
                    .output_paths
                    .get(index)
                    .map(|p| options.cwd.join(p))
                    .unwrap_or_else(|| input.clone());
                inputs.push((input, output));
            }
        } else {
            for pattern in &options.files {
                let absolute = options.cwd.join(pattern);
                let pattern_text = absolute.to_string_lossy().into_owned();
                let paths = glob::glob(&pattern_text).map_err(|source| EngineError::Glob {
                    pattern: pattern.clone(),
                    source,
                })?;
                for path in paths.flatten() {
                    if path.is_file() {
                        inputs.push((path.clone(), path));
                    }
                }
            }
        }

        if inputs.is_empty() {
            return Err(EngineError::NoFiles);
        }
        Ok(inputs)
    }
}

async fn process_document(
    ctx: Arc<RunContext>,
    input: PathBuf,
    output: PathBuf,
    contents: String,
) -> Result<DocumentOutcome, EngineError> {
    let mut strategy = document::strategy_for_path(&input);
    let references = strategy
        .extract_references(&contents)
        .map_err(|source| EngineError::Document {
            path: input.clone(),
            source,
        })?;

    let mut join_set = JoinSet::new();
    for reference in references.iter().cloned() {
        let ctx = Arc::clone(&ctx);
        join_set.spawn(async move {
            let index = reference.index;
            let result = pipeline::reconcile_reference(&ctx, &reference).await;
            (index, result)
        });
    }

    type ReferenceResult = Result<(Option<ReferenceUpdate>, Diagnostics), ReconcileError>;
    let mut slots: Vec<Option<ReferenceResult>> = references.iter().map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        let (index, result) = joined.map_err(|e| EngineError::Task(e.to_string()))?;
        match slots.get_mut(index) {
            Some(slot) => *slot = Some(result),
            None => {
                return Err(EngineError::Task(format!(
                    "reference index {index} out of range"
                )))
            }
        }
    }

    let mut diagnostics = Vec::new();
    for (reference, slot) in references.iter().zip(slots) {
        let result =
            slot.ok_or_else(|| EngineError::Task("missing reference outcome".into()))?;
        let (update, diags) = result?;
        diagnostics.extend(diags.into_vec());
        if let Some(update) = update {
            apply_update(strategy.as_mut(), &input, reference, &update)?;
        }
    }

    let serialized = strategy
        .serialize(&SerializeOptions {
            json_space: ctx.options.json_space,
            disclaimer: ctx.options.disclaimer.clone(),
        })
        .map_err(|source| EngineError::Document {
            path: input.clone(),
            source,
        })?;

    Ok(DocumentOutcome {
        output_path: output,
        serialized,
        diagnostics,
    })
}

fn apply_update(
    strategy: &mut dyn document::DocumentStrategy,
    path: &std::path::Path,
    reference: &Reference,
    update: &ReferenceUpdate,
) -> Result<(), EngineError> {
    strategy
        .apply_update(reference, update)
        .map_err(|source| EngineError::Document {
            path: path.to_path_buf(),
            source,
        })
}
