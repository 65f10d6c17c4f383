//! Production `Sandbox`: child processes via `tokio::process`, bounded by a
//! wall-clock timeout and a POSIX address-space rlimit.
//!
//! This plays the role the teacher's `IsolateBox` plays (shell out to an
//! external sandboxing tool, enforce time/memory, tear down afterwards) but
//! without requiring the `isolate` binary and Linux cgroups to be installed:
//! instead of `--cg-mem`, memory is capped with `setrlimit(RLIMIT_AS, ...)`
//! applied in a `pre_exec` hook, the same `nix` crate the teacher already
//! depends on (`nix = { features = ["process", "signal", "resource"] }`).
//! This is a weaker isolation boundary than cgroups/namespaces — acceptable
//! for this crate's scope, which treats "the sandbox" as an external,
//! swappable capability (spec §1, §6) rather than something this crate must
//! itself harden.

use std::io::Write as _;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use nix::sys::resource::{setrlimit, Resource};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::{ExecOutput, ExecParams, Sandbox};
use crate::error::SandboxError;

/// A sandbox rooted at a single base directory. Calls are serialized per
/// instance (spec §5: "The engine is serialized per instance") — callers
/// wanting concurrency construct multiple `LocalSandbox`es.
pub struct LocalSandbox {
    lock: Mutex<()>,
}

impl LocalSandbox {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }
}

impl Default for LocalSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), SandboxError> {
        let result = if recursive {
            tokio::fs::create_dir_all(path).await
        } else {
            tokio::fs::create_dir(path).await
        };
        result.map_err(|e| SandboxError::Io(format!("mkdir {}: {e}", path.display())))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), SandboxError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SandboxError::Io(format!("mkdir {}: {e}", parent.display())))?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| SandboxError::Io(format!("write_file {}: {e}", path.display())))
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), SandboxError> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SandboxError::Io(format!(
                "remove_dir_all {}: {e}",
                path.display()
            ))),
        }
    }

    #[cfg(unix)]
    async fn set_executable(&self, path: &Path) -> Result<(), SandboxError> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| SandboxError::Io(format!("stat {}: {e}", path.display())))?;
        let mut perms = metadata.permissions();
        perms.set_mode(perms.mode() | 0o100);
        tokio::fs::set_permissions(path, perms)
            .await
            .map_err(|e| SandboxError::Io(format!("chmod {}: {e}", path.display())))
    }

    #[cfg(not(unix))]
    async fn set_executable(&self, _path: &Path) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn exec(&self, params: ExecParams<'_>) -> Result<ExecOutput, SandboxError> {
        let _guard = self.lock.lock().await;

        let program = params
            .command
            .first()
            .ok_or_else(|| SandboxError::Spawn("empty command".into()))?;
        let args = &params.command[1..];

        debug!(?params.command, cwd = %params.cwd.display(), "sandbox exec");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(params.cwd)
            .envs(params.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        apply_memory_limit(&mut cmd, params.memory_mb);

        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxError::Spawn(format!("{program}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            let bytes = params.stdin.to_vec();
            if let Err(e) = stdin.write_all(&bytes).await {
                warn!("failed writing stdin to sandboxed process: {e}");
            }
            let _ = stdin.shutdown().await;
        }

        let start = Instant::now();
        let wait = timeout(
            Duration::from_millis(params.timeout_ms as u64),
            child.wait_with_output(),
        )
        .await;

        let elapsed_ms = start.elapsed().as_millis() as u32;

        match wait {
            Ok(Ok(output)) => Ok(ExecOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: output.stdout,
                stderr: output.stderr,
                timed_out: false,
                time_ms: elapsed_ms,
            }),
            Ok(Err(e)) => Err(SandboxError::Io(format!("wait_with_output: {e}"))),
            Err(_) => Ok(ExecOutput {
                exit_code: 124,
                stdout: Vec::new(),
                stderr: Vec::new(),
                timed_out: true,
                time_ms: elapsed_ms,
            }),
        }
    }
}

#[cfg(unix)]
fn apply_memory_limit(cmd: &mut Command, memory_mb: u32) {
    let limit_bytes = (memory_mb as u64) * 1024 * 1024;
    unsafe {
        cmd.pre_exec(move || {
            setrlimit(Resource::RLIMIT_AS, limit_bytes, limit_bytes)
                .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
        });
    }
}

#[cfg(not(unix))]
fn apply_memory_limit(_cmd: &mut Command, _memory_mb: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_captures_stdout_and_exit_code() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let command = vec!["echo".to_string(), "hello".to_string()];
        let out = sandbox
            .exec(ExecParams {
                command: &command,
                cwd: dir.path(),
                timeout_ms: 2000,
                env: &[],
                stdin: b"",
                memory_mb: 256,
            })
            .await
            .unwrap();
        assert_eq!(out.exit_code, 0);
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "hello");
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn exec_reports_timeout() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let command = vec!["sleep".to_string(), "5".to_string()];
        let out = sandbox
            .exec(ExecParams {
                command: &command,
                cwd: dir.path(),
                timeout_ms: 100,
                env: &[],
                stdin: b"",
                memory_mb: 256,
            })
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.exit_code, 124);
    }

    #[tokio::test]
    async fn write_file_then_mkdir_roundtrip() {
        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c.txt");
        sandbox.write_file(&nested, b"hi").await.unwrap();
        let content = tokio::fs::read_to_string(&nested).await.unwrap();
        assert_eq!(content, "hi");

        sandbox.remove_dir_all(dir.path()).await.unwrap();
        assert!(!dir.path().exists());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn set_executable_grants_owner_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let sandbox = LocalSandbox::new();
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        sandbox.write_file(&script, b"#!/bin/sh\necho hi").await.unwrap();

        let before = tokio::fs::metadata(&script).await.unwrap();
        assert_eq!(before.permissions().mode() & 0o100, 0);

        sandbox.set_executable(&script).await.unwrap();

        let after = tokio::fs::metadata(&script).await.unwrap();
        assert_ne!(after.permissions().mode() & 0o100, 0);
    }
}
