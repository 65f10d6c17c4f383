//! Execution Engine (spec §4.1) — turns an [`ExecutionRequest`] into an
//! [`ExecutionResult`] via a [`Sandbox`]. Language-agnostic: no knowledge of
//! test cases, comparators, or verdicts lives here, mirroring the teacher's
//! own module boundary ("The runner module does NOT: compare outputs or
//! determine verdicts... know about problem-specific logic").

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, EngineErrorKind};
use crate::sandbox::{ExecParams, Sandbox};

/// One file to materialize in the execution workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Relative path, no `..` segments (spec §4.1 input constraint).
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub executable: bool,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            executable: false,
        }
    }

    pub fn executable(mut self) -> Self {
        self.executable = true;
        self
    }
}

/// A compile or run command plus its own timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub cmd: Vec<String>,
    pub timeout_ms: u32,
}

/// CPU/memory ceiling applied to both phases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionLimits {
    pub cpu_ms: u32,
    pub memory_mb: u32,
}

/// One compile+run job (spec §3 `ExecutionRequest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub execution_id: String,
    pub language: String,
    pub files: Vec<FileEntry>,
    pub compile: Option<CommandSpec>,
    pub run_cmd: Vec<String>,
    pub run_timeout_ms: u32,
    #[serde(default)]
    pub stdin: Vec<u8>,
    pub limits: ExecutionLimits,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    pub cwd: Option<String>,
}

impl ExecutionRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.execution_id.is_empty() {
            return Err("executionId must not be empty".into());
        }
        for file in &self.files {
            if file.path.split('/').any(|seg| seg == "..") {
                return Err(format!("file path contains '..': {}", file.path));
            }
        }
        if let Some(compile) = &self.compile {
            if compile.timeout_ms == 0 {
                return Err("compile.timeoutMs must be positive".into());
            }
        }
        if self.run_timeout_ms == 0 {
            return Err("run.timeoutMs must be positive".into());
        }
        if self.limits.memory_mb < 16 {
            return Err("limits.memoryMb must be >= 16".into());
        }
        Ok(())
    }
}

/// Outcome of one phase (compile or run).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub time_ms: u32,
}

impl PhaseResult {
    fn skipped_due_to_compile_failure() -> Self {
        Self {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: "Skipped due to compilation failure".into(),
            time_ms: 0,
        }
    }
}

/// The engine's output: phase results plus any categorized engine error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub compile: Option<PhaseResult>,
    pub run: PhaseResult,
    pub error: Option<EngineError>,
}

/// Execute a request against `sandbox`, rooting its workspace under
/// `workspace_base`. Never panics and never returns `Err` — invalid
/// requests surface as a `sandbox_error`-tagged `ExecutionResult`, per
/// spec §4.1's "never throws to the caller" guarantee.
pub async fn execute(
    sandbox: &dyn Sandbox,
    request: &ExecutionRequest,
    workspace_base: &Path,
) -> ExecutionResult {
    if let Err(msg) = request.validate() {
        return ExecutionResult {
            execution_id: request.execution_id.clone(),
            compile: None,
            run: PhaseResult {
                success: false,
                exit_code: -1,
                stdout: String::new(),
                stderr: msg.clone(),
                time_ms: 0,
            },
            error: Some(EngineError::new(EngineErrorKind::SandboxError, msg, -1)),
        };
    }

    let workspace_root = workspace_base.join(&request.execution_id);
    let result = run_in_workspace(sandbox, request, &workspace_root).await;

    if let Err(e) = sandbox.remove_dir_all(&workspace_root).await {
        warn!(
            execution_id = %request.execution_id,
            "failed to clean up workspace {}: {e}",
            workspace_root.display()
        );
    }

    result
}

async fn run_in_workspace(
    sandbox: &dyn Sandbox,
    request: &ExecutionRequest,
    workspace_root: &Path,
) -> ExecutionResult {
    if let Err(e) = sandbox.mkdir(workspace_root, true).await {
        return sandbox_error_result(request, format!("failed to create workspace: {e}"));
    }

    for file in &request.files {
        let path = workspace_root.join(&file.path);
        if let Err(e) = sandbox.write_file(&path, file.content.as_bytes()).await {
            return sandbox_error_result(request, format!("failed to write {}: {e}", file.path));
        }
        if file.executable {
            if let Err(e) = sandbox.set_executable(&path).await {
                return sandbox_error_result(
                    request,
                    format!("failed to set executable bit on {}: {e}", file.path),
                );
            }
        }
    }

    let cwd = match &request.cwd {
        Some(rel) => workspace_root.join(rel),
        None => workspace_root.to_path_buf(),
    };

    let compile_result = match &request.compile {
        Some(compile_cmd) => {
            let outcome = run_phase(sandbox, &cwd, &compile_cmd.cmd, compile_cmd.timeout_ms, &[], request.limits.memory_mb, &request.env).await;
            Some(outcome)
        }
        None => None,
    };

    if let Some(compile) = &compile_result {
        match compile {
            Ok(phase) if !phase.success => {
                return ExecutionResult {
                    execution_id: request.execution_id.clone(),
                    compile: Some(phase.clone()),
                    run: PhaseResult::skipped_due_to_compile_failure(),
                    error: None,
                };
            }
            Err(engine_error) => {
                return ExecutionResult {
                    execution_id: request.execution_id.clone(),
                    compile: None,
                    run: PhaseResult {
                        success: false,
                        exit_code: engine_error.exit_code,
                        stdout: String::new(),
                        stderr: engine_error.message.clone(),
                        time_ms: 0,
                    },
                    error: Some(engine_error.clone()),
                };
            }
            Ok(_) => {}
        }
    }

    let compile_phase = compile_result.and_then(|r| r.ok());

    let run_outcome = run_phase(
        sandbox,
        &cwd,
        &request.run_cmd,
        request.run_timeout_ms,
        &request.stdin,
        request.limits.memory_mb,
        &request.env,
    )
    .await;

    match run_outcome {
        Ok(phase) => ExecutionResult {
            execution_id: request.execution_id.clone(),
            compile: compile_phase,
            run: phase,
            error: None,
        },
        Err(engine_error) => ExecutionResult {
            execution_id: request.execution_id.clone(),
            compile: compile_phase,
            run: PhaseResult {
                success: false,
                exit_code: engine_error.exit_code,
                stdout: String::new(),
                stderr: engine_error.message.clone(),
                time_ms: 0,
            },
            error: Some(engine_error),
        },
    }
}

/// Run one phase, classifying the sandbox's observation into a `PhaseResult`
/// or an `EngineError` (timeout / oom / sandbox_error).
#[allow(clippy::too_many_arguments)]
async fn run_phase(
    sandbox: &dyn Sandbox,
    cwd: &Path,
    cmd: &[String],
    timeout_ms: u32,
    stdin: &[u8],
    memory_mb: u32,
    env: &[(String, String)],
) -> Result<PhaseResult, EngineError> {
    if cmd.is_empty() {
        // Empty files[] + no run command is a caller bug, not an engine
        // condition named by spec §4.1's edge cases; treat it as a
        // sandbox_error rather than panicking.
        return Err(EngineError::new(
            EngineErrorKind::SandboxError,
            "no command specified for phase",
            -1,
        ));
    }

    let params = ExecParams {
        command: cmd,
        cwd,
        timeout_ms,
        env,
        stdin,
        memory_mb,
    };

    match sandbox.exec(params).await {
        // Exit code 124 is reserved to surface timeout-from-exec distinct
        // from the -1 generic error (spec §4.1 edge-case policy); carry the
        // sandbox's own `exit_code` (already 124 by `Sandbox::exec`'s own
        // contract) through to the `PhaseResult` this error produces.
        Ok(out) if out.timed_out => Err(EngineError::new(
            EngineErrorKind::Timeout,
            "wall-clock timeout exceeded",
            out.exit_code,
        )),
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
            if is_oom_signature(out.exit_code, &stderr) {
                return Err(EngineError::new(
                    EngineErrorKind::Oom,
                    "process terminated by an out-of-memory signal",
                    out.exit_code,
                ));
            }
            Ok(PhaseResult {
                success: out.exit_code == 0,
                exit_code: out.exit_code,
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr,
                time_ms: out.time_ms,
            })
        }
        Err(e) => Err(EngineError::new(EngineErrorKind::SandboxError, e.to_string(), -1)),
    }
}

/// A process killed by SIGKILL (exit code 128+9 under POSIX shell
/// convention, or -9 when read from `ExitStatus::signal`) after hitting an
/// rlimit is this crate's OOM signature — see `LocalSandbox`'s
/// `RLIMIT_AS` enforcement.
fn is_oom_signature(exit_code: i32, stderr: &str) -> bool {
    exit_code == 137
        || exit_code == -9
        || stderr.contains("Cannot allocate memory")
        || stderr.contains("std::bad_alloc")
        || stderr.contains("MemoryError")
}

fn sandbox_error_result(request: &ExecutionRequest, message: String) -> ExecutionResult {
    ExecutionResult {
        execution_id: request.execution_id.clone(),
        compile: None,
        run: PhaseResult {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr: message.clone(),
            time_ms: 0,
        },
        error: Some(EngineError::new(EngineErrorKind::SandboxError, message, -1)),
    }
}

pub fn workspace_path(workspace_base: &Path, execution_id: &str) -> PathBuf {
    workspace_base.join(execution_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSandbox;

    fn base_request(run_cmd: Vec<String>) -> ExecutionRequest {
        ExecutionRequest {
            execution_id: "exec-1".into(),
            language: "python".into(),
            files: vec![FileEntry::new("main.py", "print('hi')")],
            compile: None,
            run_cmd,
            run_timeout_ms: 2000,
            stdin: Vec::new(),
            limits: ExecutionLimits {
                cpu_ms: 2000,
                memory_mb: 256,
            },
            env: Vec::new(),
            cwd: None,
        }
    }

    #[tokio::test]
    async fn interpreted_language_skips_compile() {
        let sandbox = FakeSandbox::new().with_exit(0, "hi\n", "");
        let request = base_request(vec!["python3".into(), "main.py".into()]);
        let base = tempfile::tempdir().unwrap();
        let result = execute(&sandbox, &request, base.path()).await;
        assert!(result.compile.is_none());
        assert!(result.run.success);
        assert_eq!(result.run.stdout, "hi\n");
    }

    #[tokio::test]
    async fn compile_failure_skips_run_phase() {
        let sandbox = FakeSandbox::new().with_compile_exit(1, "", "syntax error");
        let mut request = base_request(vec!["./main".into()]);
        request.compile = Some(CommandSpec {
            cmd: vec!["gcc".into(), "main.c".into()],
            timeout_ms: 5000,
        });
        let base = tempfile::tempdir().unwrap();
        let result = execute(&sandbox, &request, base.path()).await;
        let compile = result.compile.expect("compile result present");
        assert!(!compile.success);
        assert!(!result.run.success);
        assert_eq!(result.run.exit_code, -1);
        assert_eq!(result.run.stderr, "Skipped due to compilation failure");
    }

    #[tokio::test]
    async fn timeout_is_surfaced_as_engine_error() {
        let sandbox = FakeSandbox::new().with_timeout();
        let request = base_request(vec!["sleep".into(), "100".into()]);
        let base = tempfile::tempdir().unwrap();
        let result = execute(&sandbox, &request, base.path()).await;
        assert_eq!(result.error.as_ref().unwrap().kind, EngineErrorKind::Timeout);
        // Exit code 124 is reserved for timeout-from-exec, distinct from the
        // -1 generic error (spec §4.1) — it must survive into both the
        // engine error and the run phase it produces.
        assert_eq!(result.error.unwrap().exit_code, 124);
        assert_eq!(result.run.exit_code, 124);
    }

    #[tokio::test]
    async fn workspace_is_removed_after_execution() {
        let sandbox = FakeSandbox::new().with_exit(0, "", "");
        let request = base_request(vec!["python3".into(), "main.py".into()]);
        let base = tempfile::tempdir().unwrap();
        execute(&sandbox, &request, base.path()).await;
        assert!(sandbox.was_removed(&workspace_path(base.path(), &request.execution_id)));
    }

    #[tokio::test]
    async fn empty_files_with_run_only_is_permitted() {
        let sandbox = FakeSandbox::new().with_exit(0, "ok", "");
        let mut request = base_request(vec!["true".into()]);
        request.files = Vec::new();
        let base = tempfile::tempdir().unwrap();
        let result = execute(&sandbox, &request, base.path()).await;
        assert!(result.run.success);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn executable_files_get_execute_permission() {
        use std::os::unix::fs::PermissionsExt;

        let sandbox = FakeSandbox::new().with_exit(0, "ok", "");
        let mut request = base_request(vec!["./run.sh".into()]);
        request.files = vec![FileEntry::new("run.sh", "#!/bin/sh\necho hi").executable()];
        let base = tempfile::tempdir().unwrap();
        let workspace_root = workspace_path(base.path(), &request.execution_id);

        // Call the (non-cleaning-up) workspace helper directly so the file
        // is still on disk to assert on afterwards.
        run_in_workspace(&sandbox, &request, &workspace_root).await;

        let metadata = std::fs::metadata(workspace_root.join("run.sh")).unwrap();
        assert_ne!(metadata.permissions().mode() & 0o100, 0);
    }

    #[test]
    fn validate_rejects_parent_traversal() {
        let mut request = base_request(vec!["true".into()]);
        request.files = vec![FileEntry::new("../escape.py", "x")];
        assert!(request.validate().is_err());
    }
}
