//! Realization of a [`Pipeline`] as a graph of running processes.
//!
//! Every pipe end is an owned handle. A handle is moved into exactly one
//! child's stdin or stdout binding, and the parent's copy is closed by dropping
//! the [`Command`] that carried it as soon as that child is spawned. Both ends
//! of every pipe are created close-on-exec, so a child only ever holds the ends
//! bound to its own standard streams. A write end that stays open anywhere
//! keeps its reader blocked forever, so no code path may keep one around.

use crate::command::ExitCode;
use crate::env::Environment;
use crate::external::{self, NOT_EXECUTABLE, NOT_FOUND, find_command_path};
use crate::jobs::JobTable;
use crate::parser::{CommandSpec, Pipeline};
use os_pipe::{PipeReader, PipeWriter};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::{debug, warn};

/// `errno` for a file that is not in a format the kernel can execute.
const ENOEXEC: i32 = 8;

/// Failure to obtain an OS resource needed by a pipeline.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("cannot create pipe: {0}")]
    Pipe(#[source] io::Error),
    #[error("cannot create process for `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", path.display())]
    OpenRedirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The target program of a stage cannot be run.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{program}: command not found")]
    NotFound { program: String },
    #[error("{program}: {source}")]
    NotExecutable {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Why a single stage did not start.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl StageError {
    /// The status the stage is recorded with, as if its child had exited.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Exec(ExecError::NotFound { .. }) => NOT_FOUND,
            Self::Exec(ExecError::NotExecutable { .. }) => NOT_EXECUTABLE,
            Self::Resource(_) => 1,
        }
    }
}

/// A pipe connecting two adjacent stages.
///
/// Each end is handed out at most once; whatever is still held when the
/// channel is dropped gets closed.
pub struct PipeChannel {
    reader: Option<PipeReader>,
    writer: Option<PipeWriter>,
}

impl PipeChannel {
    pub fn open() -> Result<Self, ResourceError> {
        let (reader, writer) = os_pipe::pipe().map_err(ResourceError::Pipe)?;
        Ok(Self {
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn take_reader(&mut self) -> Option<PipeReader> {
        self.reader.take()
    }

    pub fn take_writer(&mut self) -> Option<PipeWriter> {
        self.writer.take()
    }

    /// True once both ends have been handed out.
    pub fn is_drained(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }
}

/// Create the `stage_count - 1` channels of a pipeline.
///
/// On failure the channels created so far are closed and nothing is returned.
pub fn allocate_channels(stage_count: usize) -> Result<Vec<PipeChannel>, ResourceError> {
    (1..stage_count).map(|_| PipeChannel::open()).collect()
}

/// Where a stage reads its standard input from.
pub enum StdinSource {
    Inherit,
    File(PathBuf),
    Pipe(PipeReader),
}

impl StdinSource {
    fn into_stdio(self) -> Result<Stdio, ResourceError> {
        Ok(match self {
            Self::Inherit => Stdio::inherit(),
            Self::File(path) => File::open(&path)
                .map(Stdio::from)
                .map_err(|source| ResourceError::OpenRedirect { path, source })?,
            Self::Pipe(reader) => reader.into(),
        })
    }
}

/// Where a stage writes its standard output to.
pub enum StdoutSink {
    Inherit,
    File { path: PathBuf, append: bool },
    Pipe(PipeWriter),
}

impl StdoutSink {
    fn into_stdio(self) -> Result<Stdio, ResourceError> {
        Ok(match self {
            Self::Inherit => Stdio::inherit(),
            Self::File { path, append } => {
                let mut options = OpenOptions::new();
                options.write(true).create(true);
                if append {
                    options.append(true);
                } else {
                    options.truncate(true);
                }
                options
                    .open(&path)
                    .map(Stdio::from)
                    .map_err(|source| ResourceError::OpenRedirect { path, source })?
            }
            Self::Pipe(writer) => writer.into(),
        })
    }
}

/// Everything needed to start one stage.
pub struct StageSpawn<'a> {
    pub program: &'a str,
    pub arguments: &'a [String],
    pub stdin: StdinSource,
    pub stdout: StdoutSink,
}

/// Final state of one stage of a foreground pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// The process ran and terminated.
    Exited(ExitStatus),
    /// The stage failed before its program started.
    NotStarted(ExitCode),
}

impl StageStatus {
    pub fn code(&self) -> ExitCode {
        match *self {
            Self::Exited(status) => external::exit_code(status),
            Self::NotStarted(code) => code,
        }
    }

    pub fn success(&self) -> bool {
        self.code() == 0
    }
}

/// Statuses of every stage of a foreground pipeline, in stage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub stages: Vec<StageStatus>,
}

impl PipelineStatus {
    /// Exit code of the pipeline: the one of its last stage.
    pub fn code(&self) -> ExitCode {
        self.stages.last().map_or(0, StageStatus::code)
    }

    /// True when every stage succeeded.
    pub fn success(&self) -> bool {
        self.stages.iter().all(StageStatus::success)
    }
}

/// Result of a successful [`Launcher::launch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Foreground pipeline, waited for.
    Completed(PipelineStatus),
    /// Background pipeline; process ids as registered in the job table.
    Backgrounded(Vec<u32>),
}

enum Launched {
    Running(Child),
    Failed(ExitCode),
}

impl Launched {
    fn wait(self) -> StageStatus {
        match self {
            Self::Running(mut child) => match child.wait() {
                Ok(status) => {
                    debug!(pid = child.id(), %status, "stage finished");
                    StageStatus::Exited(status)
                }
                Err(e) => {
                    warn!(pid = child.id(), error = %e, "cannot wait for stage");
                    StageStatus::NotStarted(1)
                }
            },
            Self::Failed(code) => StageStatus::NotStarted(code),
        }
    }
}

/// Starts pipelines, resolving programs against a fixed search path.
pub struct Launcher {
    search_path: OsString,
}

impl Launcher {
    /// Use the `PATH` visible through `env`.
    pub fn new(env: &Environment) -> Self {
        Self::with_search_path(env.get_var("PATH").unwrap_or_default())
    }

    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: search_path.into(),
        }
    }

    /// Start one process with the given standard stream bindings.
    ///
    /// Redirection files are opened before the program is resolved, so a bad
    /// redirection is reported even for a missing program.
    pub fn spawn(&self, stage: StageSpawn<'_>) -> Result<Child, StageError> {
        let StageSpawn {
            program,
            arguments,
            stdin,
            stdout,
        } = stage;
        let stdin = stdin.into_stdio()?;
        let stdout = stdout.into_stdio()?;
        let executable = find_command_path(&self.search_path, Path::new(program))
            .ok_or_else(|| ExecError::NotFound {
                program: program.to_owned(),
            })?;

        let mut command = Command::new(&*executable);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.arg0(program);
        }
        command.args(arguments).stdin(stdin).stdout(stdout);

        let child = command
            .spawn()
            .map_err(|source| classify_spawn_error(program, source))?;
        debug!(pid = child.id(), program, "spawned stage");
        Ok(child)
    }

    /// Launch every stage of `pipeline`.
    ///
    /// Stages that cannot start are reported to `diagnostics` and recorded
    /// with a failure status; the other stages still run. Only a pipe or
    /// process creation failure aborts: nothing is launched in the first
    /// case, and in the second the stages already running are left alone.
    pub fn launch(
        &self,
        pipeline: Pipeline,
        jobs: &mut JobTable,
        diagnostics: &mut dyn Write,
    ) -> Result<LaunchOutcome, ResourceError> {
        let Pipeline {
            stages,
            background,
            command_line,
        } = pipeline;
        let stage_count = stages.len();
        let mut channels = allocate_channels(stage_count)?;
        debug!(stages = stage_count, channels = channels.len(), "allocated pipe channels");

        let mut launched = Vec::with_capacity(stage_count);
        for (index, spec) in stages.iter().enumerate() {
            let stage = StageSpawn {
                program: &spec.program,
                arguments: &spec.arguments,
                stdin: stdin_for(index, spec, &mut channels),
                stdout: stdout_for(index, spec, &mut channels),
            };
            match self.spawn(stage) {
                Ok(child) => launched.push(Launched::Running(child)),
                Err(StageError::Resource(fatal @ ResourceError::Spawn { .. })) => {
                    drop(channels);
                    for stage in launched {
                        if let Launched::Running(child) = stage {
                            jobs.orphan(child);
                        }
                    }
                    return Err(fatal);
                }
                Err(error) => {
                    debug!(stage = index, %error, "stage did not start");
                    let _ = writeln!(diagnostics, "{error}");
                    launched.push(Launched::Failed(error.exit_code()));
                }
            }
        }
        debug_assert!(channels.iter().all(PipeChannel::is_drained));
        drop(channels);

        if background {
            let pids = launched
                .into_iter()
                .filter_map(|stage| match stage {
                    Launched::Running(child) => Some(jobs.adopt(child, &command_line)),
                    Launched::Failed(_) => None,
                })
                .collect();
            return Ok(LaunchOutcome::Backgrounded(pids));
        }

        let stages = launched.into_iter().map(Launched::wait).collect();
        Ok(LaunchOutcome::Completed(PipelineStatus { stages }))
    }
}

/// Stage `index` reads from channel `index - 1` unless it redirects its input;
/// in that case the read end is dropped right away.
fn stdin_for(index: usize, spec: &CommandSpec, channels: &mut [PipeChannel]) -> StdinSource {
    let pipe = index
        .checked_sub(1)
        .and_then(|previous| channels[previous].take_reader());
    match &spec.redirection.input_path {
        Some(path) => StdinSource::File(path.clone()),
        None => pipe.map_or(StdinSource::Inherit, StdinSource::Pipe),
    }
}

/// Stage `index` writes to channel `index` unless it redirects its output;
/// the last stage has no channel of its own.
fn stdout_for(index: usize, spec: &CommandSpec, channels: &mut [PipeChannel]) -> StdoutSink {
    let pipe = channels.get_mut(index).and_then(PipeChannel::take_writer);
    match &spec.redirection.output_path {
        Some(path) => StdoutSink::File {
            path: path.clone(),
            append: spec.redirection.append,
        },
        None => pipe.map_or(StdoutSink::Inherit, StdoutSink::Pipe),
    }
}

fn classify_spawn_error(program: &str, source: io::Error) -> StageError {
    let program = program.to_owned();
    match source.kind() {
        io::ErrorKind::NotFound => ExecError::NotFound { program }.into(),
        io::ErrorKind::PermissionDenied => ExecError::NotExecutable { program, source }.into(),
        _ if source.raw_os_error() == Some(ENOEXEC) => {
            ExecError::NotExecutable { program, source }.into()
        }
        _ => ResourceError::Spawn { program, source }.into(),
    }
}
