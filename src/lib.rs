//! A small interactive command interpreter.
//!
//! A line of input is split into pipeline stages, each stage into words, and
//! the redirection operators (`<`, `>`, `>>`) and a trailing `&` are pulled out
//! of the words. Stages are then started as child processes connected by pipes,
//! or, for a single-stage line naming a builtin, run in-process.
//!
//! The main entry point is [`Interpreter`]. The lower layers are public so
//! that they can be driven on their own:
//! - [`lexer`] and [`redirect`] turn text into words and redirections,
//! - [`parser`] assembles them into a [`parser::Pipeline`],
//! - [`launcher`] starts a pipeline and collects its statuses,
//! - [`jobs`] remembers what was started in the background,
//! - [`env`] holds shell variables and expands `$NAME` arguments.

mod builtin;
pub mod command;
pub mod env;
mod external;
mod interpreter;
pub mod jobs;
pub mod launcher;
pub mod lexer;
pub mod parser;
pub mod redirect;

/// Re-export of the line runner and its result types.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, LineOutcome, ShellError};
