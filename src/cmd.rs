use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

use tracing::{debug, error, info, warn};

use crate::{error::InstallerError, ui};

/// Wrapper used to run a command inside the mounted target.
pub const CHROOT_PROGRAM: &str = "arch-chroot";

// ── Command description ───────────────────────────────────────────────────────

/// Whether commands really run or are only described.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Execute,
    DryRun,
}

/// Where a command or file write is meant to take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecContext {
    /// The live environment the installer was started from.
    Host,
    /// The installed system, seen as `/`.
    ChangeRooted,
}

/// How change-rooted work reaches the installed system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rooting {
    /// Running in the live environment; the installed system is mounted at `target`.
    Outside { target: PathBuf },
    /// Already running inside the installed system.
    Inside,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub description: String,
    pub context: ExecContext,
    /// Fed to the child's stdin. Never logged.
    pub stdin: Option<String>,
    /// Capture stdout instead of handing the terminal to the child.
    pub capture: bool,
}

impl CommandSpec {
    pub fn host<I, S>(description: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(description, argv, ExecContext::Host)
    }

    pub fn chroot<I, S>(description: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(description, argv, ExecContext::ChangeRooted)
    }

    fn new<I, S>(description: impl Into<String>, argv: I, context: ExecContext) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            description: description.into(),
            context,
            stdin: None,
            capture: false,
        }
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// A file the installer writes instead of shelling out to `echo >`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: PathBuf,
    pub contents: String,
    pub description: String,
    pub context: ExecContext,
    pub append: bool,
    /// Created with mode 0600.
    pub private: bool,
}

impl FileWrite {
    pub fn chroot(
        description: impl Into<String>,
        path: impl Into<PathBuf>,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            description: description.into(),
            context: ExecContext::ChangeRooted,
            append: false,
            private: false,
        }
    }

    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }
}

/// Outcome of a gateway call. Failures never come back as a result; they are errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub succeeded: bool,
    /// Nothing ran because the gateway is in dry-run mode.
    pub simulated: bool,
    pub stdout: String,
}

impl CommandResult {
    fn simulated() -> Self {
        Self {
            succeeded: true,
            simulated: true,
            stdout: String::new(),
        }
    }
}

// ── OS seam ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Everything the gateway needs from the operating system.
pub trait Runner {
    fn run(&mut self, argv: &[String], stdin: Option<&str>, capture: bool)
        -> io::Result<RunOutput>;

    fn write_file(
        &mut self,
        path: &Path,
        contents: &str,
        append: bool,
        private: bool,
    ) -> io::Result<()>;

    /// Starts a program and returns immediately without waiting for it.
    fn spawn_detached(&mut self, argv: &[String]);
}

/// Runs commands for real with `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(
        &mut self,
        argv: &[String],
        stdin: Option<&str>,
        capture: bool,
    ) -> io::Result<RunOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        let mut command = Command::new(program);
        command.args(args);
        if stdin.is_some() {
            command.stdin(Stdio::piped());
        }
        if capture {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = command.spawn()?;
        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                match pipe.write_all(input.as_bytes()) {
                    Ok(()) => {}
                    // The child stopped reading; its exit status decides.
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!(target: "gateway", "{} closed its input early", program);
                    }
                    Err(e) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(e);
                    }
                }
            }
        }

        let output = child.wait_with_output()?;
        Ok(RunOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn write_file(
        &mut self,
        path: &Path,
        contents: &str,
        append: bool,
        private: bool,
    ) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        if private {
            options.mode(0o600);
        }

        options.open(path)?.write_all(contents.as_bytes())
    }

    fn spawn_detached(&mut self, argv: &[String]) {
        let argv = argv.to_vec();
        // No handle is kept: the child outlives this thread and nobody waits for it.
        thread::spawn(move || {
            let Some((program, args)) = argv.split_first() else {
                return;
            };
            if let Err(e) = Command::new(program)
                .args(args)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
            {
                warn!(target: "gateway", "Failed to launch {}: {}", program, e);
            }
        });
    }
}

fn print_captured_output(stdout: &str, stderr: &str) {
    if !stdout.trim().is_empty() {
        eprintln!("{}", stdout.trim());
    }
    if !stderr.trim().is_empty() {
        eprintln!("{}", stderr.trim());
    }
}

// ── Read-only queries ─────────────────────────────────────────────────────────

/// Runs a query command and returns its stdout.
///
/// Catalog and device listings only read system state, so they bypass the
/// gateway and run in dry-run mode too.
pub fn run_capture(program: &str, args: &[&str]) -> Result<String, InstallerError> {
    debug!(target: "gateway", "Querying: {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| InstallerError::CommandSpawn(program.to_string(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(target: "gateway", "{} failed: {}", program, stderr.trim());
        return Err(InstallerError::CommandFailed(
            program.to_string(),
            output.status.code().unwrap_or(-1),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ── Gateway ───────────────────────────────────────────────────────────────────

/// Single entry point for every command and file write the installer performs.
///
/// Each invocation is logged at debug level before anything happens. In
/// [`ExecMode::DryRun`] the description is logged at info level and nothing
/// reaches the [`Runner`]. A non-zero exit becomes
/// [`InstallerError::CommandFailed`], which the caller propagates to `main`.
pub struct Gateway<R: Runner = SystemRunner> {
    mode: ExecMode,
    rooting: Rooting,
    runner: R,
    transcript: Vec<String>,
}

impl<R: Runner> Gateway<R> {
    pub fn new(mode: ExecMode, rooting: Rooting, runner: R) -> Self {
        Self {
            mode,
            rooting,
            runner,
            transcript: Vec::new(),
        }
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == ExecMode::DryRun
    }

    pub fn rooting(&self) -> &Rooting {
        &self.rooting
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Descriptions of every invocation so far, in order.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn execute(&mut self, spec: &CommandSpec) -> Result<CommandResult, InstallerError> {
        if spec.argv.is_empty() {
            error!(target: "gateway", "Empty command requested: {}", spec.description);
            return Err(InstallerError::EmptyCommand(spec.description.clone()));
        }

        let argv = self.resolve_argv(spec);
        debug!(target: "gateway", "Running: {}", argv.join(" "));
        self.transcript.push(spec.description.clone());

        if self.is_dry_run() {
            info!(target: "gateway", "[DRY RUN] {}", spec.description);
            ui::print_dry_run(&spec.description);
            return Ok(CommandResult::simulated());
        }

        let output = if spec.capture {
            let pb = ui::spinner(format!("{}…", spec.description));
            let result = self.runner.run(&argv, spec.stdin.as_deref(), true);
            pb.finish_and_clear();
            result
        } else {
            ui::print_info(&spec.description);
            self.runner.run(&argv, spec.stdin.as_deref(), false)
        };

        let output = output.map_err(|e| {
            error!(target: "gateway", "Could not start '{}': {}", argv.join(" "), e);
            InstallerError::CommandSpawn(spec.program().to_string(), e)
        })?;

        match output.code {
            Some(0) => {
                ui::print_success(&spec.description);
                Ok(CommandResult {
                    succeeded: true,
                    simulated: false,
                    stdout: output.stdout,
                })
            }
            code => {
                let code = code.unwrap_or(-1);
                if spec.capture {
                    print_captured_output("", &output.stderr);
                }
                error!(
                    target: "gateway",
                    "Command failed with exit code {}: {} ({})",
                    code,
                    argv.join(" "),
                    spec.description
                );
                Err(InstallerError::CommandFailed(spec.program().to_string(), code))
            }
        }
    }

    pub fn write(&mut self, file: &FileWrite) -> Result<CommandResult, InstallerError> {
        let path = self.resolve_path(file.context, &file.path);
        debug!(
            target: "gateway",
            "{} {} ({} bytes)",
            if file.append { "Appending to" } else { "Writing" },
            path.display(),
            file.contents.len()
        );
        self.transcript.push(file.description.clone());

        if self.is_dry_run() {
            info!(target: "gateway", "[DRY RUN] {}", file.description);
            ui::print_dry_run(&file.description);
            return Ok(CommandResult::simulated());
        }

        self.runner
            .write_file(&path, &file.contents, file.append, file.private)
            .map_err(|e| {
                error!(target: "gateway", "Writing {} failed: {}", path.display(), e);
                InstallerError::Io(e)
            })?;

        ui::print_success(&file.description);
        Ok(CommandResult {
            succeeded: true,
            simulated: false,
            stdout: String::new(),
        })
    }

    /// Starts a program in the background without waiting for it.
    pub fn launch_detached(&mut self, spec: &CommandSpec) -> Result<CommandResult, InstallerError> {
        if spec.argv.is_empty() {
            return Err(InstallerError::EmptyCommand(spec.description.clone()));
        }

        let argv = self.resolve_argv(spec);
        debug!(target: "gateway", "Launching in background: {}", argv.join(" "));
        self.transcript.push(spec.description.clone());

        if self.is_dry_run() {
            info!(target: "gateway", "[DRY RUN] {}", spec.description);
            ui::print_dry_run(&spec.description);
            return Ok(CommandResult::simulated());
        }

        self.runner.spawn_detached(&argv);
        ui::print_info(&spec.description);
        Ok(CommandResult {
            succeeded: true,
            simulated: false,
            stdout: String::new(),
        })
    }

    fn resolve_argv(&self, spec: &CommandSpec) -> Vec<String> {
        match (spec.context, &self.rooting) {
            (ExecContext::ChangeRooted, Rooting::Outside { target }) => {
                let mut argv = vec![CHROOT_PROGRAM.to_string(), target.display().to_string()];
                argv.extend(spec.argv.iter().cloned());
                argv
            }
            _ => spec.argv.clone(),
        }
    }

    /// Maps a path as seen by `context` to the path this process must open.
    pub fn resolve_path(&self, context: ExecContext, path: &Path) -> PathBuf {
        match (context, &self.rooting) {
            (ExecContext::ChangeRooted, Rooting::Outside { target }) => {
                target.join(path.strip_prefix("/").unwrap_or(path))
            }
            _ => path.to_path_buf(),
        }
    }
}
