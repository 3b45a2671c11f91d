use crate::command::ExitCode;
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// Exit code reported for a program that could not be found.
pub const NOT_FOUND: ExitCode = 127;

/// Exit code reported for a program that was found but could not be executed.
pub const NOT_EXECUTABLE: ExitCode = 126;

/// Shell-style exit code of a finished process: its own code, or `128 + signal`
/// when it was killed by a signal.
pub fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    ExitStatusExt::signal(&exit_status).map_or(-1, |signal| 128 + signal)
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a program path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it exists.
/// - `./foo`, or any relative path with several components (e.g. `bin/sh`):
///   returns it if it exists.
/// - Single path component (no separators): search each directory in
///   `search_paths` (PATH) and return the first executable match.
/// - Empty path: returns `None`.
///
/// Paths given explicitly are returned even when they are not executable, so
/// that the spawn attempt can report the permission problem.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(x), None) if !path.is_absolute() && !path.starts_with(".") => {
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|candidate| is_executable(candidate))
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
