use crate::env::Environment;
use crate::jobs::JobTable;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Object-safe trait for a command that runs inside the shell process.
///
/// Implemented by built-ins via a blanket impl. In-process commands never
/// take part in pipes or redirections, so they only get the shell's own
/// output streams.
pub trait ExecutableCommand {
    /// Executes the command.
    ///
    /// `env` is the only state a command may mutate; `jobs` is read-only.
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
        jobs: &JobTable,
    ) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
