use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::jobs::JobTable;
use crate::launcher::{LaunchOutcome, Launcher, PipelineStatus, ResourceError};
use crate::parser::{self, ParseError, Pipeline};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the builtins defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Why a line could not be run.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Builtin(#[from] anyhow::Error),
}

/// What running one line amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank line; nothing happened.
    Empty,
    /// A builtin ran in-process with this exit code.
    Builtin(ExitCode),
    /// A foreground pipeline ran to completion.
    Completed(PipelineStatus),
    /// A background pipeline was started with these process ids.
    Backgrounded(Vec<u32>),
}

impl LineOutcome {
    /// Exit code of the line, as a shell would report it in `$?`.
    pub fn code(&self) -> ExitCode {
        match self {
            Self::Empty | Self::Backgrounded(_) => 0,
            Self::Builtin(code) => *code,
            Self::Completed(status) => status.code(),
        }
    }
}

/// A minimal shell-like interpreter that runs pipelines of external programs
/// and a handful of builtins.
///
/// The interpreter owns the variable [`Environment`] and the [`JobTable`] and
/// lends them to the builtins and to the launcher for the duration of a line.
///
/// Example
/// ```
/// use pipesh::Interpreter;
/// let mut sh = Interpreter::default();
/// let outcome = sh.run_line("set GREETING hello").unwrap();
/// assert_eq!(outcome.code(), 0);
/// assert_eq!(sh.env().get_var("GREETING").as_deref(), Some("hello"));
/// ```
pub struct Interpreter {
    env: Environment,
    jobs: JobTable,
    builtins: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of builtin factories.
    pub fn new(builtins: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            jobs: JobTable::new(),
            builtins,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    /// Whether a builtin asked the read loop to stop.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Run one line using the process's standard streams for builtin output
    /// and diagnostics.
    pub fn run_line(&mut self, line: &str) -> Result<LineOutcome, ShellError> {
        self.run_line_with_output(line, &mut io::stdout(), &mut io::stderr())
    }

    /// Run one line, writing builtin output to `stdout` and diagnostics to
    /// `stderr`. Launched programs always inherit the process's streams.
    pub fn run_line_with_output(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<LineOutcome, ShellError> {
        self.jobs.reap();
        if line.trim().is_empty() {
            return Ok(LineOutcome::Empty);
        }

        let mut pipeline = parser::build(line)?;
        for stage in &mut pipeline.stages {
            for name in self.env.expand(&mut stage.arguments) {
                debug!(variable = %name, "unresolved environment variable");
                writeln!(stderr, "environment variable not found: {name}")?;
            }
        }

        if let Some(command) = self.find_builtin(&pipeline) {
            let code = command.execute(stdout, stderr, &mut self.env, &self.jobs)?;
            return Ok(LineOutcome::Builtin(code));
        }

        let launcher = Launcher::new(&self.env);
        Ok(match launcher.launch(pipeline, &mut self.jobs, stderr)? {
            LaunchOutcome::Completed(status) => LineOutcome::Completed(status),
            LaunchOutcome::Backgrounded(pids) => LineOutcome::Backgrounded(pids),
        })
    }

    /// Builtins are only considered for single-stage pipelines.
    fn find_builtin(&self, pipeline: &Pipeline) -> Option<Box<dyn ExecutableCommand>> {
        let stage = pipeline.single_stage()?;
        let args: Vec<&str> = stage.arguments.iter().map(String::as_str).collect();
        let command = self
            .builtins
            .iter()
            .find_map(|factory| factory.try_create(&stage.program, &args))?;

        let redirection = &stage.redirection;
        if redirection.input_path.is_some() || redirection.output_path.is_some() || pipeline.background {
            warn!(builtin = %stage.program, "redirections and `&` are ignored for builtins");
        }
        debug!(builtin = %stage.program, "running builtin");
        Some(command)
    }

    /// Interactive read loop.
    ///
    /// Errors of individual lines are reported and the loop goes on; it ends on
    /// end of input or when a builtin requests it.
    pub fn repl(&mut self, prompt: &str, history: Option<&Path>) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        if let Some(path) = history {
            if let Err(e) = rl.load_history(path) {
                debug!(path = %path.display(), error = %e, "no history loaded");
            }
        }

        while !self.should_exit() {
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if let Err(e) = self.run_line(&line) {
                        eprintln!("pipesh: {e}");
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        if let Some(path) = history {
            rl.save_history(path)?;
        }
        Ok(())
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default builtins:
    /// `set`, `unset`, `myjobs` and `exit`.
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(vec![
            Box::new(Factory::<Set>::default()),
            Box::new(Factory::<Unset>::default()),
            Box::new(Factory::<Jobs>::default()),
            Box::new(Factory::<Exit>::default()),
        ])
    }
}
