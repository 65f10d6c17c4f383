//! Test doubles shared by unit tests and `tests/` integration tests.
//!
//! Mirrors the teacher's dependency-injection seam (`Runner` trait swapped
//! for a mock in its own test modules) but generalized to a public module so
//! external integration tests can construct a [`FakeSandbox`] too, per spec
//! §9 ("Testing should allow a constructor-injected sandbox for determinism").

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SandboxError;
use crate::sandbox::{ExecOutput, ExecParams, Sandbox};

/// A scripted outcome for one `exec` call.
#[derive(Debug, Clone)]
struct ScriptedExec {
    exit_code: i32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    timed_out: bool,
    time_ms: u32,
}

/// A deterministic [`Sandbox`] double. Writes/mkdirs are recorded and
/// actually touch a real temp directory (so [`crate::engine`] tests can
/// still assert on workspace layout); `exec` calls are scripted instead of
/// spawning real processes.
pub struct FakeSandbox {
    /// Queue of scripted results, consumed in call order. When exhausted,
    /// the last entry repeats — convenient for "compile once, run once"
    /// tests that only care about the run phase's outcome.
    script: Mutex<Vec<ScriptedExec>>,
    calls: Mutex<Vec<Vec<String>>>,
    removed: Mutex<Vec<PathBuf>>,
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    /// Queue a single exit for the next (and all subsequent, if not
    /// overridden) `exec` call.
    pub fn with_exit(self, code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.script.lock().unwrap().push(ScriptedExec {
            exit_code: code,
            stdout: stdout.into().into_bytes(),
            stderr: stderr.into().into_bytes(),
            timed_out: false,
            time_ms: 5,
        });
        self
    }

    /// Queue a compile-phase exit followed by a run-phase exit, for tests
    /// that exercise both phases.
    pub fn with_compile_then_run(
        self,
        compile_code: i32,
        compile_stderr: impl Into<String>,
        run_code: i32,
        run_stdout: impl Into<String>,
    ) -> Self {
        self.with_exit(compile_code, "", compile_stderr)
            .with_exit(run_code, run_stdout, "")
    }

    /// Queue only a failing compile phase; the run phase is never reached
    /// when a harness built this request correctly, so no run exit is
    /// queued.
    pub fn with_compile_exit(self, code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.with_exit(code, stdout, stderr)
    }

    pub fn with_timeout(self) -> Self {
        self.script.lock().unwrap().push(ScriptedExec {
            exit_code: 124,
            stdout: Vec::new(),
            stderr: Vec::new(),
            timed_out: true,
            time_ms: 0,
        });
        self
    }

    pub fn was_removed(&self, path: &Path) -> bool {
        self.removed.lock().unwrap().iter().any(|p| p == path)
    }

    pub fn recorded_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for FakeSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), SandboxError> {
        let result = if recursive {
            tokio::fs::create_dir_all(path).await
        } else {
            tokio::fs::create_dir(path).await
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(SandboxError::Io(format!("mkdir {}: {e}", path.display()))),
        }
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), SandboxError> {
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| SandboxError::Io(format!("write_file {}: {e}", path.display())))
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<(), SandboxError> {
        self.removed.lock().unwrap().push(path.to_path_buf());
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SandboxError::Io(format!("remove_dir_all: {e}"))),
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
        self.calls.lock().unwrap().push(params.command.to_vec());

        let mut script = self.script.lock().unwrap();
        let scripted = if script.len() > 1 {
            script.remove(0)
        } else if let Some(last) = script.last() {
            last.clone()
        } else {
            ScriptedExec {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
                timed_out: false,
                time_ms: 0,
            }
        };

        Ok(ExecOutput {
            exit_code: scripted.exit_code,
            stdout: scripted.stdout,
            stderr: scripted.stderr,
            timed_out: scripted.timed_out,
            time_ms: scripted.time_ms,
        })
    }
}
