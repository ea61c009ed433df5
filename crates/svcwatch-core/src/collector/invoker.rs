//! Query invoker that runs the service-query script in a child process.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::collector::script::{DEFAULT_INTERPRETER, DEFAULT_INTERPRETER_ARGS, ScriptArtifact};
use crate::collector::target::CollectionTarget;
use crate::collector::traits::{InvokeError, QueryInvoker, RawQueryResult};
use crate::config::MonitorConfig;

/// How often the child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Extra time allowed for the output pipe to close after the child exits.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs `<interpreter> <args...> <script> -serviceName|-serviceNamePattern <value>`.
///
/// Standard output and standard error share one pipe, so the captured text
/// keeps the interleaving the script produced. The pipe is drained on a
/// separate thread while the child is polled for exit; a child still running
/// after `timeout` is killed.
pub struct ScriptInvoker {
    interpreter: String,
    interpreter_args: Vec<String>,
    script: Arc<ScriptArtifact>,
    timeout: Duration,
}

impl ScriptInvoker {
    pub fn new(
        interpreter: impl Into<String>,
        interpreter_args: Vec<String>,
        script: Arc<ScriptArtifact>,
        timeout: Duration,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            interpreter_args,
            script,
            timeout,
        }
    }

    /// Writes the built-in script and applies interpreter and timeout settings
    /// from `config`, falling back to the platform defaults.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, InvokeError> {
        let script = Arc::new(ScriptArtifact::write_default()?);
        let interpreter = config
            .interpreter
            .clone()
            .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string());
        let interpreter_args = config.interpreter_args.clone().unwrap_or_else(|| {
            DEFAULT_INTERPRETER_ARGS
                .iter()
                .map(|s| s.to_string())
                .collect()
        });
        debug!(
            interpreter = %interpreter,
            script = %script.path().display(),
            "query script prepared"
        );
        Ok(Self::new(
            interpreter,
            interpreter_args,
            script,
            config.query_timeout(),
        ))
    }

    /// The script artifact shared by all invocations.
    pub fn script(&self) -> &Arc<ScriptArtifact> {
        &self.script
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn spawn(&self, target: &CollectionTarget) -> Result<(Child, io::PipeReader), InvokeError> {
        let (reader, writer) = io::pipe()?;
        // The command holds the write ends; it must be dropped before the
        // reader can see EOF.
        let mut command = Command::new(&self.interpreter);
        command
            .args(&self.interpreter_args)
            .arg(self.script.path())
            .args(target.query_args())
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);
        let child = command.spawn().map_err(InvokeError::Spawn)?;
        drop(command);
        Ok((child, reader))
    }
}

impl QueryInvoker for ScriptInvoker {
    fn query(&self, target: &CollectionTarget) -> Result<RawQueryResult, InvokeError> {
        let started = Instant::now();
        let (mut child, mut reader) = self.spawn(target)?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let result = reader.read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(result);
        });

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    let elapsed = started.elapsed();
                    if elapsed >= self.timeout {
                        warn!(query = %target, timeout = ?self.timeout, "query timed out, killing process");
                        reap(&mut child);
                        return Err(InvokeError::Timeout(self.timeout));
                    }
                    thread::sleep(POLL_INTERVAL.min(self.timeout - elapsed));
                }
                Err(e) => {
                    reap(&mut child);
                    return Err(InvokeError::Io(e));
                }
            }
        };

        // A grandchild that inherited the pipe can keep it open after the
        // child exits; bound the wait by the remaining budget.
        let drain_budget = self.timeout.saturating_sub(started.elapsed()) + OUTPUT_DRAIN_GRACE;
        let output = match rx.recv_timeout(drain_budget) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(query = %target, "query output pipe not closed after process exit");
                return Err(InvokeError::Timeout(self.timeout));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(InvokeError::Io(io::Error::other("output reader stopped")));
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        debug!(
            query = %target,
            exit_code,
            bytes = output.len(),
            elapsed = ?started.elapsed(),
            "query finished"
        );
        Ok(RawQueryResult::new(
            exit_code,
            String::from_utf8_lossy(&output).into_owned(),
        ))
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
