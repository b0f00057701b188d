//! Parallel proving of independent obligations.
//!
//! Every obligation gets its own session, opened and driven on a blocking
//! worker thread. The engine is shared read-only; nothing mutable crosses
//! obligations. Results come back in input order, and one failing
//! obligation never aborts the others.
//!
//! # Example
//!
//! ```rust,ignore
//! use proofloop_core::batch::{BatchRunner, Obligation};
//! use proofloop_core::engine::ProofEngine;
//! use proofloop_core::session::{BridgeConfig, BridgeSession};
//!
//! let runner = BatchRunner::new(ProofEngine::default()).with_max_parallel(4);
//! let obligations = vec![
//!     Obligation::new("add_0", "Lemma add_0 : forall n, n + 0 = n.", ["intros n.", "lia."]),
//! ];
//! let results = runner
//!     .run(obligations, |statement| BridgeSession::open(BridgeConfig::default(), statement))
//!     .await;
//! println!("{}/{} proved", results.proved_count, results.results.len());
//! ```

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::engine::{ExecutionOutcome, ProofEngine, ProofStep};
use crate::error::Result;
use crate::session::ProofSession;

/// Default maximum obligations proved at once.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// One theorem to prove, with its proposed script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obligation {
    /// Name used in logs and results.
    pub name: String,
    /// Statement handed to the session factory.
    pub statement: String,
    /// Proposed proof script.
    pub steps: Vec<ProofStep>,
}

impl Obligation {
    pub fn new<I>(name: impl Into<String>, statement: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ProofStep>,
    {
        Self {
            name: name.into(),
            statement: statement.into(),
            steps: steps.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of one obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObligationResult {
    /// Position of the obligation in the input.
    pub index: usize,
    pub name: String,
    /// Outcome of the attempt, when one ran to completion.
    pub outcome: Option<ExecutionOutcome>,
    /// Why no outcome is available (session could not be opened or restored).
    pub error: Option<String>,
}

impl ObligationResult {
    fn finished(index: usize, name: String, outcome: ExecutionOutcome) -> Self {
        Self {
            index,
            name,
            outcome: Some(outcome),
            error: None,
        }
    }

    fn failed(index: usize, name: String, error: impl Into<String>) -> Self {
        Self {
            index,
            name,
            outcome: None,
            error: Some(error.into()),
        }
    }

    /// Whether the obligation was proved.
    pub fn is_proved(&self) -> bool {
        self.outcome.as_ref().is_some_and(ExecutionOutcome::is_success)
    }
}

/// Results of a batch, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    pub results: Vec<ObligationResult>,
    pub proved_count: usize,
    pub error_count: usize,
}

impl BatchResults {
    fn from_results(results: Vec<ObligationResult>) -> Self {
        let proved_count = results.iter().filter(|r| r.is_proved()).count();
        let error_count = results.iter().filter(|r| r.error.is_some()).count();
        Self {
            results,
            proved_count,
            error_count,
        }
    }

    /// Whether every obligation was proved.
    pub fn all_proved(&self) -> bool {
        self.proved_count == self.results.len()
    }
}

/// Proves obligations in parallel with one engine.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    engine: Arc<ProofEngine>,
    max_parallel: usize,
}

impl BatchRunner {
    pub fn new(engine: ProofEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    /// Set the maximum number of obligations proved at once.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max.max(1);
        self
    }

    /// Prove every obligation, opening each session with `open`.
    pub async fn run<S, F>(&self, obligations: Vec<Obligation>, open: F) -> BatchResults
    where
        S: ProofSession,
        F: Fn(&str) -> Result<S> + Send + Sync + 'static,
    {
        if obligations.is_empty() {
            return BatchResults::from_results(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let open = Arc::new(open);

        let tasks: Vec<_> = obligations
            .into_iter()
            .enumerate()
            .map(|(index, obligation)| {
                let engine = Arc::clone(&self.engine);
                let semaphore = Arc::clone(&semaphore);
                let open = Arc::clone(&open);

                async move {
                    let Obligation {
                        name,
                        statement,
                        steps,
                    } = obligation;

                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => return ObligationResult::failed(index, name, e.to_string()),
                    };
                    debug!(%name, "proving obligation");

                    let worker = tokio::task::spawn_blocking(move || {
                        let mut session = open(&statement)?;
                        engine.prove(&mut session, steps)
                    });

                    match worker.await {
                        Ok(Ok(outcome)) => ObligationResult::finished(index, name, outcome),
                        Ok(Err(e)) => {
                            warn!(%name, error = %e, "obligation aborted");
                            ObligationResult::failed(index, name, e.to_string())
                        }
                        Err(e) => {
                            warn!(%name, error = %e, "proof worker died");
                            ObligationResult::failed(index, name, e.to_string())
                        }
                    }
                }
            })
            .collect();

        BatchResults::from_results(join_all(tasks).await)
    }
}
