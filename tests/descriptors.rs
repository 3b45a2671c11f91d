//! Runs alone in its own binary: other tests opening files would skew the count.

#![cfg(target_os = "linux")]

use pipesh::{Interpreter, LineOutcome};
use std::fs;

fn open_descriptors() -> usize {
    fs::read_dir("/proc/self/fd").unwrap().count()
}

#[test]
fn pipelines_leave_no_descriptors_behind() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("count");
    let line = format!("printf abc | cat | wc -c > {}", out.display());
    let mut sh = Interpreter::default();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    // Warm up lazily initialized state before taking the baseline.
    sh.run_line_with_output(&line, &mut stdout, &mut stderr).unwrap();
    let before = open_descriptors();

    for _ in 0..5 {
        let outcome = sh.run_line_with_output(&line, &mut stdout, &mut stderr).unwrap();
        assert!(matches!(outcome, LineOutcome::Completed(s) if s.success()));
    }

    assert_eq!(open_descriptors(), before);
    assert_eq!(fs::read_to_string(&out).unwrap().trim(), "3");
}
