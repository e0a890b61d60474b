//! External process execution
//!
//! Every external tool (`hdc`, `hvigorw`, `ohpm`, `flutter assemble`) is run
//! through the [`ProcessRunner`] capability so device and build logic can be
//! exercised against a scripted runner in tests.
//!
//! Two shapes of execution are supported:
//! - [`ProcessRunner::run`] - run to completion and capture output
//! - [`ProcessRunner::spawn`] - long-lived process whose stdout and stderr are
//!   merged into one line channel (used by the log reader)

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};

use fohos_core::prelude::*;

/// Capacity of the merged stdout/stderr line channel.
///
/// Readers block once it is full, which stops draining the child's pipes.
const LINE_CHANNEL_CAPACITY: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Command / Output
// ─────────────────────────────────────────────────────────────────────────────

/// A fully-resolved external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    /// Build from an argument vector whose first element is the program
    pub fn from_argv(argv: Vec<String>) -> Self {
        let mut iter = argv.into_iter();
        let program = iter.next().unwrap_or_default();
        Self::new(program).args(iter)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Program name followed by arguments, space separated
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    fn to_tokio(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        Error::ProcessSpawn {
            program: self.program.display().to_string(),
            reason: e.to_string(),
        }
    }
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Captured output of a completed process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr joined, for text sniffing
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Spawned Process
// ─────────────────────────────────────────────────────────────────────────────

/// A long-lived process exposed as a merged line channel
pub struct SpawnedProcess {
    /// Lossy-UTF-8 lines from stdout and stderr, interleaved as they arrive
    pub lines: mpsc::Receiver<String>,
    pub killer: ProcessKiller,
    pub pid: Option<u32>,
}

impl SpawnedProcess {
    pub fn new(
        lines: mpsc::Receiver<String>,
        kill_tx: oneshot::Sender<()>,
        exited: watch::Receiver<bool>,
        pid: Option<u32>,
    ) -> Self {
        Self {
            lines,
            killer: ProcessKiller {
                kill_tx: Some(kill_tx),
                exited,
            },
            pid,
        }
    }
}

/// Handle used to force-terminate a [`SpawnedProcess`]
pub struct ProcessKiller {
    kill_tx: Option<oneshot::Sender<()>>,
    exited: watch::Receiver<bool>,
}

impl ProcessKiller {
    /// Ask the wait task to kill the process. Idempotent.
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            // The wait task may already have exited naturally.
            let _ = tx.send(());
        }
    }

    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Flips to `true` once the process has exited
    pub fn exit_signal(&self) -> watch::Receiver<bool> {
        self.exited.clone()
    }
}

impl Drop for ProcessKiller {
    fn drop(&mut self) {
        if !self.has_exited() {
            self.kill();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner Capability
// ─────────────────────────────────────────────────────────────────────────────

/// Process execution capability
#[trait_variant::make(ProcessRunner: Send)]
pub trait LocalProcessRunner: Sync {
    /// Run a command to completion and capture its output.
    ///
    /// A non-zero exit code is not an error here; only failing to start is.
    async fn run(&self, command: &ProcessCommand) -> Result<RunOutput>;

    /// Start a long-lived command and stream its output lines
    fn spawn(&self, command: &ProcessCommand) -> Result<SpawnedProcess>;
}

/// [`ProcessRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &ProcessCommand) -> Result<RunOutput> {
        debug!("Running: {}", command);

        let output = command
            .to_tokio()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| command.spawn_error(e))?;

        let result = RunOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        trace!("{} stdout: {}", command.program.display(), result.stdout);
        if !result.stderr.is_empty() {
            trace!("{} stderr: {}", command.program.display(), result.stderr);
        }

        Ok(result)
    }

    fn spawn(&self, command: &ProcessCommand) -> Result<SpawnedProcess> {
        info!("Spawning: {}", command);

        let mut child = command
            .to_tokio()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| command.spawn_error(e))?;

        let pid = child.id();
        let (line_tx, line_rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, line_tx.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, line_tx, "stderr"));
        }

        let (exit_tx, exit_rx) = watch::channel(false);
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(wait_for_exit(child, kill_rx, exit_tx, command.program.clone()));

        Ok(SpawnedProcess::new(line_rx, kill_tx, exit_rx, pid))
    }
}

/// Forward lines from one pipe, decoding lossily so stray bytes never end the stream
async fn read_lines<T: AsyncRead + Unpin>(pipe: T, tx: mpsc::Sender<String>, stream: &'static str) {
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                trace!("{}: {}", stream, line);
                if tx.send(line).await.is_err() {
                    debug!("{} channel closed", stream);
                    break;
                }
            }
            Err(e) => {
                warn!("Error reading {}: {}", stream, e);
                break;
            }
        }
    }

    debug!("{} reader finished", stream);
}

/// Background task: owns `child`, waits for it to exit or kills it on request
async fn wait_for_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    exited: watch::Sender<bool>,
    program: PathBuf,
) {
    tokio::select! {
        result = child.wait() => {
            match result {
                Ok(status) => debug!("{} exited with status: {:?}", program.display(), status),
                Err(e) => error!("Error waiting for {}: {}", program.display(), e),
            }
        }
        _ = kill_rx => {
            info!("Kill requested, terminating {}", program.display());
            if let Err(e) = child.kill().await {
                error!("Failed to kill {}: {}", program.display(), e);
            }
            let _ = child.wait().await;
        }
    }

    exited.send_replace(true);
}

/// Whether a path points at an executable file
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}
