//! Tactic execution and repair engine.
//!
//! Takes a proposed proof script and a live session, executes the script one
//! step at a time, repairs bullet and focus mistakes locally, calls the
//! automation oracle when no repair applies, and backtracks through executed
//! steps when even the oracle is stuck.
//!
//! ## Example
//!
//! ```rust,ignore
//! use proofloop_core::engine::{ProofEngineBuilder, ProofMethod};
//! use proofloop_core::session::{BridgeConfig, BridgeSession};
//!
//! let engine = ProofEngineBuilder::new()
//!     .method(ProofMethod::Backtrack)
//!     .max_steps(500)
//!     .build();
//!
//! let mut session = BridgeSession::open(BridgeConfig::default(), "Lemma add_0 : forall n, n + 0 = n.")?;
//! let outcome = engine.prove(&mut session, ["intros n.", "induction n.", "-", "reflexivity.", "-", "simpl.", "auto."])?;
//! println!("{}", outcome.summary());
//! ```
//!
//! ## Components
//!
//! - **step / queue**: proof steps and the pending-step queue
//! - **bullets**: bullet succession and the bullet stack
//! - **progress**: goal snapshot equality
//! - **classify / repair**: the structural error table
//! - **oracle**: the hammer adapter
//! - **executor / backtrack**: the attempt state machine
//! - **outcome**: traces and results

pub mod backtrack;
pub mod bullets;
pub mod classify;
pub mod config;
pub mod executor;
pub mod oracle;
pub mod outcome;
pub mod progress;
pub mod queue;
pub mod repair;
pub mod step;

pub use bullets::{is_bullet, next_bullet, BulletStack};
pub use classify::{classify, Classified, ErrorKind};
pub use config::{EngineConfig, OracleConfig, ProofMethod, Rewrite};
pub use executor::{Attempt, Escalation};
pub use oracle::{HammerOracle, OracleVerdict};
pub use outcome::{AttemptResult, ExecutedStep, ExecutionOutcome, ProofFailure};
pub use progress::{progress, same_goal};
pub use queue::PendingQueue;
pub use repair::{repair, Repair, RepairContext};
pub use step::{ProofStep, StepOrigin};

use chrono::Utc;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::error::Result;
use crate::session::{rewind_to, ProofSession};

/// Drives proof attempts under one configuration.
///
/// Holds no per-attempt state, so one engine can serve many sessions.
#[derive(Debug, Clone, Default)]
pub struct ProofEngine {
    config: EngineConfig,
    oracle: HammerOracle,
}

impl ProofEngine {
    pub fn new(config: EngineConfig) -> Self {
        let oracle = HammerOracle::new(config.oracle.clone());
        Self { config, oracle }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Prove the obligation open in `session` with the given script.
    ///
    /// Steps already executed in the session are undone first. Proof-level
    /// failures are reported in the outcome; `Err` means the session could
    /// not be restored and must be discarded.
    pub fn prove<S, I>(&self, session: &mut S, steps: I) -> Result<ExecutionOutcome>
    where
        S: ProofSession + ?Sized,
        I: IntoIterator,
        I::Item: Into<ProofStep>,
    {
        rewind_to(session, 0)?;
        let queue: PendingQueue = steps.into_iter().map(Into::into).collect();
        self.execute(session, queue, self.config.method)
    }

    /// Run one attempt from the session's current position.
    pub fn execute<S>(
        &self,
        session: &mut S,
        queue: PendingQueue,
        method: ProofMethod,
    ) -> Result<ExecutionOutcome>
    where
        S: ProofSession + ?Sized,
    {
        let attempt_id = Uuid::new_v4();
        let span = info_span!("proof_attempt", attempt = %attempt_id, %method);
        let _guard = span.enter();

        let started_at = Utc::now();
        info!(steps = queue.len(), "starting attempt");

        let attempt = Attempt::new(&self.config, &self.oracle, session);
        let (trace, result) = match method {
            ProofMethod::Plan => attempt.run_plan(queue, Escalation::Oracle)?,
            ProofMethod::OracleFirst => attempt.run_oracle_first(queue)?,
            ProofMethod::Backtrack => attempt.run_plan(queue, Escalation::Backtrack)?,
        };

        let outcome = ExecutionOutcome {
            attempt_id,
            method,
            started_at,
            finished_at: Utc::now(),
            trace,
            result,
        };
        info!(success = outcome.is_success(), "{}", outcome.summary());
        Ok(outcome)
    }
}

/// Builder for [`ProofEngine`] with fluent API.
pub struct ProofEngineBuilder {
    config: EngineConfig,
}

impl ProofEngineBuilder {
    /// Create a new builder with default config.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Set the proof method.
    pub fn method(mut self, method: ProofMethod) -> Self {
        self.config.method = method;
        self
    }

    /// Set the closing marker.
    pub fn closing_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.closing_marker = marker.into();
        self
    }

    /// Add a placeholder step that is never executed.
    pub fn placeholder(mut self, marker: impl Into<String>) -> Self {
        self.config.placeholder_markers.push(marker.into());
        self
    }

    /// Set the tactic that invokes the oracle.
    pub fn oracle_tactic(mut self, tactic: impl Into<String>) -> Self {
        self.config.oracle.tactic = tactic.into();
        self
    }

    /// Set the prefix of the oracle's suggestion reply.
    pub fn reply_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.oracle.reply_prefix = prefix.into();
        self
    }

    /// Add a rewrite applied to oracle suggestions.
    pub fn rewrite(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.config.oracle.rewrites.push(Rewrite::new(from, to));
        self
    }

    /// Cap the number of steps one attempt may pop.
    pub fn max_steps(mut self, max: usize) -> Self {
        self.config.max_steps = Some(max);
        self
    }

    /// Build the engine.
    pub fn build(self) -> ProofEngine {
        ProofEngine::new(self.config)
    }
}

impl Default for ProofEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
