//! EventsTrace process launch

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use etrace_core::prelude::*;

/// Flags always appended after the caller's arguments, in this order
pub const MANDATORY_FLAGS: [&str; 4] = [
    "--print-initialized",
    "--unbuffer-stdout",
    "--libbpf-verbose",
    "--set-bpf-tramp",
];

/// A launched EventsTrace child with its output pipes detached.
///
/// `kill_on_drop` is set, so dropping this (or the `Child`) never leaks
/// the process.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    pub pid: Option<u32>,
}

/// Build the full argument vector: caller arguments then the mandatory flags
pub fn build_args(args: &[String]) -> Vec<String> {
    args.iter()
        .cloned()
        .chain(MANDATORY_FLAGS.iter().map(|f| f.to_string()))
        .collect()
}

/// Resolve the program to execute.
///
/// Paths (anything with a separator) are used as-is; bare names are looked
/// up on `PATH`.
pub fn resolve_program(binary: &Path) -> Result<PathBuf> {
    if binary.components().count() > 1 || binary.is_absolute() {
        return Ok(binary.to_path_buf());
    }

    which::which(binary)
        .map_err(|e| Error::launch(binary.display().to_string(), e.to_string()))
}

/// Spawn the child with piped stdout/stderr.
///
/// Fails with [`Error::Launch`] if the binary cannot be resolved or started,
/// or if either pipe is unavailable. There is no retry.
pub fn spawn(binary: &Path, args: &[String]) -> Result<SpawnedProcess> {
    let program = resolve_program(binary)?;
    let args = build_args(args);
    let program_name = program.display().to_string();

    info!("Spawning EventsTrace: {} {}", program_name, args.join(" "));

    let mut child = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::launch(&program_name, e.to_string()))?;

    let pid = child.id();
    info!("EventsTrace started with PID: {:?}", pid);

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::launch(&program_name, "failed to redirect stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::launch(&program_name, "failed to redirect stderr"))?;

    Ok(SpawnedProcess {
        child,
        stdout,
        stderr,
        pid,
    })
}
