//! Session backed by a bridge subprocess.
//!
//! The bridge is a helper process that owns the real proof assistant and
//! speaks newline-delimited JSON on stdin/stdout. Each request is one object
//! tagged by `op`; each reply is one object with an `ok` flag:
//!
//! ```text
//! -> {"op":"open","statement":"Lemma add_0 : forall n, n + 0 = n."}
//! <- {"ok":true}
//! -> {"op":"append","step":"intros n."}
//! <- {"ok":true,"messages":[]}
//! -> {"op":"append","step":"-"}
//! <- {"ok":false,"errors":["Wrong bullet -: No more goals."]}
//! -> {"op":"goals"}
//! <- {"ok":true,"goals":{"goals":[{"hyps":[],"ty":"n + 0 = n"}],"stack":[]}}
//! ```
//!
//! A reply that does not arrive within `timeout_ms` gets the bridge killed;
//! the session is unusable afterwards.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::GoalState;
use super::{AppendError, ProofSession, StepReply};
use crate::error::{Error, Result};

/// Bridge binary looked up on `PATH` when none is configured.
pub const DEFAULT_PROGRAM: &str = "coq-bridge";

/// Default time to wait for one bridge reply.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Configuration for the bridge subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Path to the bridge executable. `~` is expanded.
    /// If None, `coq-bridge` is looked up on `PATH`.
    pub program: Option<PathBuf>,

    /// Extra arguments passed to the bridge.
    pub args: Vec<String>,

    /// Working directory of the bridge, usually the proof project root.
    pub working_dir: Option<PathBuf>,

    /// Time to wait for each reply, in milliseconds.
    /// A bridge that misses it is killed.
    pub timeout_ms: u64,

    /// Log every request and reply at debug level.
    pub verbose: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            working_dir: None,
            timeout_ms: DEFAULT_TIMEOUT_MS, // tactics like hammer can run for a while
            verbose: false,
        }
    }
}

impl BridgeConfig {
    /// Create a config for an explicit bridge executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
            ..Default::default()
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the reply timeout.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve the executable to spawn.
    pub fn resolve_program(&self) -> Result<PathBuf> {
        if let Some(ref program) = self.program {
            let raw = program.to_string_lossy();
            return Ok(PathBuf::from(shellexpand::tilde(&raw).into_owned()));
        }
        which::which(DEFAULT_PROGRAM).map_err(|e| {
            Error::Config(format!(
                "{} not found on PATH ({}); set BridgeConfig::program",
                DEFAULT_PROGRAM, e
            ))
        })
    }
}

/// Request sent to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Open { statement: &'a str },
    Append { step: &'a str },
    Undo,
    Goals,
    CanClose,
}

/// Reply read from the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
struct BridgeReply {
    ok: bool,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    messages: Vec<String>,
    #[serde(default)]
    goals: Option<GoalState>,
    #[serde(default)]
    can_close: Option<bool>,
}

impl BridgeReply {
    fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| Error::protocol(format!("malformed bridge reply: {} (line: {})", e, line)))
    }

    /// Fail unless the bridge reported success.
    fn require_ok(self, op: &str) -> Result<Self> {
        if self.ok {
            Ok(self)
        } else {
            Err(Error::protocol(format!(
                "bridge refused {}: {}",
                op,
                self.errors.join("; ")
            )))
        }
    }

    fn into_append_result(self) -> std::result::Result<StepReply, AppendError> {
        if self.ok {
            Ok(StepReply {
                messages: self.messages,
            })
        } else {
            Err(AppendError::Rejected {
                messages: self.errors,
            })
        }
    }
}

/// A proof session driven through a bridge subprocess.
pub struct BridgeSession {
    child: Child,
    stdin: Option<ChildStdin>,
    /// Reply lines, read on a separate thread so waits can time out.
    replies: Receiver<std::io::Result<String>>,
    steps: Vec<String>,
    config: BridgeConfig,
}

impl BridgeSession {
    /// Spawn the bridge without opening an obligation.
    pub fn spawn(config: BridgeConfig) -> Result<Self> {
        let program = config.resolve_program()?;
        let mut cmd = Command::new(&program);
        cmd.args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::SubprocessComm(format!(
                "Failed to spawn bridge {}: {}",
                program.display(),
                e
            ))
        })?;
        let stdin = child.stdin.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stdin handle for bridge".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            Error::SubprocessComm("Failed to get stdout handle for bridge".to_string())
        })?;

        let (tx, replies) = mpsc::channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            replies,
            steps: Vec::new(),
            config,
        })
    }

    /// Spawn the bridge and open an obligation for `statement`.
    pub fn open(config: BridgeConfig, statement: &str) -> Result<Self> {
        let mut session = Self::spawn(config)?;
        session
            .request(&BridgeCommand::Open { statement })?
            .require_ok("open")?;
        Ok(session)
    }

    fn request(&mut self, command: &BridgeCommand<'_>) -> Result<BridgeReply> {
        let request_json = serde_json::to_string(command)?;
        if self.config.verbose {
            tracing::debug!("bridge request: {}", request_json);
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::SubprocessComm("bridge has been shut down".to_string()))?;
        writeln!(stdin, "{}", request_json)
            .map_err(|e| Error::SubprocessComm(format!("Failed to send to bridge: {}", e)))?;
        stdin
            .flush()
            .map_err(|e| Error::SubprocessComm(format!("Failed to flush bridge stdin: {}", e)))?;

        let deadline = Instant::now() + Duration::from_millis(self.config.timeout_ms);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match self.replies.recv_timeout(remaining) {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => {
                    return Err(Error::SubprocessComm(format!(
                        "Failed to read from bridge: {}",
                        e
                    )))
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.abandon();
                    return Err(Error::timeout(self.config.timeout_ms));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::SubprocessComm(
                        "bridge subprocess closed unexpectedly".to_string(),
                    ));
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if self.config.verbose {
                tracing::debug!("bridge reply: {}", line);
            }
            return BridgeReply::parse(line);
        }
    }

    /// Kill a bridge that stopped answering; its replies can no longer be matched.
    fn abandon(&mut self) {
        warn!(
            timeout_ms = self.config.timeout_ms,
            steps = self.steps.len(),
            "bridge timed out, killing it"
        );
        drop(self.stdin.take());
        if let Err(e) = self.child.kill() {
            warn!(error = %e, "failed to kill bridge");
        }
    }

    /// Close the bridge's stdin and wait for it to exit.
    pub fn shutdown(&mut self) -> Result<()> {
        drop(self.stdin.take());
        self.child
            .wait()
            .map_err(|e| Error::SubprocessComm(format!("Failed to wait for bridge: {}", e)))?;
        Ok(())
    }
}

impl ProofSession for BridgeSession {
    fn append(&mut self, text: &str) -> std::result::Result<StepReply, AppendError> {
        let reply = self.request(&BridgeCommand::Append { step: text })?;
        let result = reply.into_append_result();
        if result.is_ok() {
            self.steps.push(text.trim().to_string());
        }
        result
    }

    fn undo_last(&mut self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(Error::Internal("nothing to undo".to_string()));
        }
        self.request(&BridgeCommand::Undo)?.require_ok("undo")?;
        self.steps.pop();
        Ok(())
    }

    fn current_goals(&mut self) -> Result<GoalState> {
        self.request(&BridgeCommand::Goals)?
            .require_ok("goals")?
            .goals
            .ok_or_else(|| Error::protocol("goals reply without goals"))
    }

    fn can_close(&mut self) -> Result<bool> {
        self.request(&BridgeCommand::CanClose)?
            .require_ok("can_close")?
            .can_close
            .ok_or_else(|| Error::protocol("can_close reply without can_close"))
    }

    fn steps(&self) -> &[String] {
        &self.steps
    }
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
