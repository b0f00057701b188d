//! # proofloop-core
//!
//! Drives proposed Coq proof scripts through an interactive proof session,
//! repairing bullet structure on the fly and falling back to the `hammer`
//! oracle or to backtracking when a step cannot be repaired.
//!
//! ## Core Components
//!
//! - **Session**: The `ProofSession` seam plus a JSON-lines subprocess bridge
//! - **Engine**: Error classification, local repairs, oracle and backtracking
//! - **Batch**: Parallel proving of independent obligations
//!
//! ## Example
//!
//! ```rust,ignore
//! use proofloop_core::{BridgeConfig, BridgeSession, ProofEngine};
//!
//! let mut session = BridgeSession::open(
//!     BridgeConfig::default(),
//!     "Lemma add_0 : forall n, n + 0 = n.",
//! )?;
//! let outcome = ProofEngine::default().prove(&mut session, ["intros n.", "lia.", "Qed."])?;
//! println!("{}", outcome.summary());
//! ```

pub mod batch;
pub mod engine;
pub mod error;
pub mod session;

// Re-exports for convenience
pub use batch::{BatchResults, BatchRunner, Obligation, ObligationResult};
pub use engine::{
    AttemptResult, EngineConfig, ExecutedStep, ExecutionOutcome, OracleConfig, ProofEngine,
    ProofEngineBuilder, ProofFailure, ProofMethod, ProofStep, StepOrigin,
};
pub use error::{Error, Result};
pub use session::{
    AppendError, BridgeConfig, BridgeSession, Goal, GoalState, ProofSession, StepReply,
};
