use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::jobs::{self, JobTable};
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::io::Write;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "set" or "myjobs".
    fn name() -> &'static str;

    /// Executes the command using the shell's output stream and state.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment, jobs: &JobTable)
    -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
        jobs: &JobTable,
    ) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, env, jobs) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stderr, "{}: {}", T::name(), e)?;
                Ok(1)
            }
        }
    }
}

/// Outcome of argh rejecting (or answering `--help` for) a builtin's arguments.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        _env: &mut Environment,
        _jobs: &JobTable,
    ) -> Result<ExitCode> {
        if self.is_error {
            writeln!(stderr, "{}", self.output.trim_end())?;
            Ok(1)
        } else {
            stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Set a shell variable.
pub struct Set {
    #[argh(positional)]
    /// name of the variable.
    pub name: String,

    #[argh(positional)]
    /// value to store.
    pub value: String,
}

impl BuiltinCommand for Set {
    fn name() -> &'static str {
        "set"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        env: &mut Environment,
        _jobs: &JobTable,
    ) -> Result<ExitCode> {
        env.set_var(self.name, self.value);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove a shell variable.
pub struct Unset {
    #[argh(positional)]
    /// name of the variable.
    pub name: String,
}

impl BuiltinCommand for Unset {
    fn name() -> &'static str {
        "unset"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        env: &mut Environment,
        _jobs: &JobTable,
    ) -> Result<ExitCode> {
        if env.unset_var(&self.name).is_none() {
            debug!(name = %self.name, "unset of a variable that was not set");
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the processes started in the background.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "myjobs"
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _env: &mut Environment,
        jobs: &JobTable,
    ) -> Result<ExitCode> {
        for job in jobs.list() {
            writeln!(
                stdout,
                "PID: {}  Command: {}  [{}]",
                job.pid,
                jobs::process_label(job.pid),
                job.command_line
            )?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit shell process
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always leaves its read loop.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        env: &mut Environment,
        _jobs: &JobTable,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Outputs {
        code: ExitCode,
        stdout: String,
        stderr: String,
    }

    fn dispatch<T: BuiltinCommand + 'static>(
        args: &[&str],
        env: &mut Environment,
        jobs: &JobTable,
    ) -> Outputs {
        let cmd = Factory::<T>::default()
            .try_create(T::name(), args)
            .expect("factory recognizes its own name");
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = cmd.execute(&mut stdout, &mut stderr, env, jobs).unwrap();
        Outputs {
            code,
            stdout: String::from_utf8(stdout).unwrap(),
            stderr: String::from_utf8(stderr).unwrap(),
        }
    }

    #[test]
    fn factory_ignores_other_names() {
        assert!(Factory::<Set>::default().try_create("unset", &["X"]).is_none());
    }

    #[test]
    fn test_set_then_unset() {
        let mut env = Environment::new();
        let jobs = JobTable::new();

        let out = dispatch::<Set>(&["COLOR", "blue"], &mut env, &jobs);
        assert_eq!(out.code, 0);
        assert_eq!(env.get_var("COLOR"), Some("blue".to_string()));

        let out = dispatch::<Unset>(&["COLOR"], &mut env, &jobs);
        assert_eq!(out.code, 0);
        assert_eq!(env.vars.get("COLOR"), None);
    }

    #[test]
    fn test_set_with_wrong_arity_does_not_mutate() {
        let mut env = Environment::new();
        let jobs = JobTable::new();

        let out = dispatch::<Set>(&["ONLY_NAME"], &mut env, &jobs);
        assert_ne!(out.code, 0);
        assert!(!out.stderr.is_empty());

        let out = dispatch::<Set>(&["A", "b", "c"], &mut env, &jobs);
        assert_ne!(out.code, 0);
        assert!(!out.stderr.is_empty());

        assert!(env.vars.is_empty());
    }

    #[test]
    fn test_unset_with_wrong_arity_does_not_mutate() {
        let mut env = Environment::new();
        env.set_var("A", "1");
        env.set_var("B", "2");
        let jobs = JobTable::new();

        assert_ne!(dispatch::<Unset>(&[], &mut env, &jobs).code, 0);
        assert_ne!(dispatch::<Unset>(&["A", "B"], &mut env, &jobs).code, 0);
        assert_eq!(env.vars.len(), 2);
    }

    #[test]
    fn test_unset_missing_variable_is_not_an_error() {
        let mut env = Environment::new();
        let jobs = JobTable::new();

        let out = dispatch::<Unset>(&["NOPE"], &mut env, &jobs);
        assert_eq!(out.code, 0);
        assert!(out.stderr.is_empty());
    }

    #[test]
    fn test_myjobs_lists_in_order_and_tolerates_missing_metadata() {
        let mut env = Environment::new();
        let mut jobs = JobTable::new();
        jobs.register(u32::MAX, "ghost &");
        jobs.register(u32::MAX - 1, "other ghost &");

        let out = dispatch::<Jobs>(&[], &mut env, &jobs);
        assert_eq!(out.code, 0);
        assert_eq!(
            out.stdout,
            format!(
                "PID: {}  Command:   [ghost &]\nPID: {}  Command:   [other ghost &]\n",
                u32::MAX,
                u32::MAX - 1
            )
        );
    }

    #[test]
    fn test_myjobs_rejects_arguments() {
        let mut env = Environment::new();
        let jobs = JobTable::new();
        assert_ne!(dispatch::<Jobs>(&["extra"], &mut env, &jobs).code, 0);
    }

    #[test]
    fn test_help_goes_to_stdout() {
        let mut env = Environment::new();
        let jobs = JobTable::new();
        let out = dispatch::<Set>(&["--help"], &mut env, &jobs);
        assert_eq!(out.code, 0);
        assert!(out.stdout.contains("Set a shell variable."));
    }

    #[test]
    fn test_exit_requests_termination() {
        let mut env = Environment::new();
        let jobs = JobTable::new();
        assert!(!env.should_exit);
        assert_eq!(dispatch::<Exit>(&["0"], &mut env, &jobs).code, 0);
        assert!(env.should_exit);
    }
}
