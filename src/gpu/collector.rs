// Long-running vendor tool collectors.

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{GpuStore, GpuVendor};

/// Lines of a running command's stdout. A failed read or a non-zero exit status is
/// reported as a final `Err` item.
pub type LineStream = BoxStream<'static, io::Result<String>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Starts external commands. Swappable so collectors can run against scripted output.
pub trait CommandRunner: Send + Sync {
    /// True when `program` runs and exits successfully with no arguments.
    fn probe<'a>(&'a self, program: &'a str) -> BoxFuture<'a, bool>;

    fn spawn_lines(&self, command: &CommandSpec) -> io::Result<LineStream>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl CommandRunner for TokioCommandRunner {
    fn probe<'a>(&'a self, program: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            Command::new(program)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .is_ok_and(|s| s.success())
        })
    }

    fn spawn_lines(&self, command: &CommandSpec) -> io::Result<LineStream> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout not captured"))?;
        let program = command.program.clone();
        let lines = BufReader::new(stdout).lines();

        Ok(stream::unfold(Some((lines, child)), move |state| {
            let program = program.clone();
            async move {
                let (mut lines, mut child) = state?;
                match lines.next_line().await {
                    Ok(Some(line)) => Some((Ok(line), Some((lines, child)))),
                    Ok(None) => match child.wait().await {
                        Ok(status) if status.success() => None,
                        Ok(status) => Some((
                            Err(io::Error::other(format!("{} exited with {}", program, status))),
                            None,
                        )),
                        Err(e) => Some((Err(e), None)),
                    },
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
        .boxed())
    }
}

/// Lifecycle of one vendor collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    NotStarted,
    Running,
    Restarting,
    Stopped,
}

/// Why one invocation of a vendor tool ended.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The tool ran but never printed a usable sample.
    #[error("no valid GPU data found")]
    NoValidData,
    #[error("failed to start: {0}")]
    Spawn(#[source] io::Error),
    #[error("output stream failed: {0}")]
    Stream(#[source] io::Error),
}

/// State after one invocation: a tool that never produced data is abandoned, any
/// other ending (including a clean exit) is restarted.
pub fn next_state(result: &Result<(), CollectError>) -> CollectorState {
    match result {
        Err(CollectError::NoValidData) => CollectorState::Stopped,
        _ => CollectorState::Restarting,
    }
}

/// Runs one vendor tool for the life of the process, feeding its lines into the store.
pub struct GpuCollector {
    vendor: GpuVendor,
    command: CommandSpec,
    runner: Arc<dyn CommandRunner>,
    store: Arc<GpuStore>,
    restart_delay: Duration,
    state: CollectorState,
}

impl GpuCollector {
    pub fn new(
        vendor: GpuVendor,
        command: CommandSpec,
        runner: Arc<dyn CommandRunner>,
        store: Arc<GpuStore>,
        restart_delay: Duration,
    ) -> Self {
        Self {
            vendor,
            command,
            runner,
            store,
            restart_delay,
            state: CollectorState::NotStarted,
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Collects until the tool is judged unusable; returns the final state.
    pub async fn run(mut self) -> CollectorState {
        loop {
            self.state = CollectorState::Running;
            let result = self.collect().await;
            self.state = next_state(&result);
            match (self.state, result) {
                (CollectorState::Stopped, _) => {
                    warn!(collector = self.vendor.tool(), "no valid GPU data, stopping");
                    break;
                }
                (_, Err(e)) => {
                    warn!(collector = self.vendor.tool(), error = %e, "collector failed, restarting");
                }
                (_, Ok(())) => {
                    debug!(collector = self.vendor.tool(), "collector exited, restarting");
                }
            }
            tokio::time::sleep(self.restart_delay).await;
        }
        self.state
    }

    /// Runs the command once and parses its output until it ends.
    pub async fn collect(&self) -> Result<(), CollectError> {
        let mut lines = self
            .runner
            .spawn_lines(&self.command)
            .map_err(CollectError::Spawn)?;

        let mut has_valid_data = false;
        let mut failure = None;
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if self.store.ingest(self.vendor, line.as_bytes()) {
                        has_valid_data = true;
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if !has_valid_data {
            return Err(CollectError::NoValidData);
        }
        match failure {
            Some(e) => Err(CollectError::Stream(e)),
            None => Ok(()),
        }
    }
}
