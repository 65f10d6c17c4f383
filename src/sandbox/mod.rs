//! Sandbox capability — the external collaborator described in spec §6.
//!
//! The engine never shells out directly; it talks to an injected
//! `dyn Sandbox`. This is the seam the teacher's `Runner` trait
//! (`runner/mod.rs`) establishes between "untrusted user code" and "trusted
//! checker" execution, generalized here to the single external capability
//! spec.md describes: `mkdir`, `writeFile`, `exec`.
//!
//! [`local::LocalSandbox`] is the production implementation, backed by
//! `tokio::process::Command` with a wall-clock timeout and POSIX rlimits.
//! Tests use [`crate::testing::FakeSandbox`] instead.

pub mod local;

use std::path::Path;

use async_trait::async_trait;

use crate::error::SandboxError;

/// Wall-clock-bounded exec call, run against an isolated filesystem.
#[derive(Debug, Clone)]
pub struct ExecParams<'a> {
    /// `argv`, first element is the program.
    pub command: &'a [String],
    /// Working directory the command runs in.
    pub cwd: &'a Path,
    pub timeout_ms: u32,
    pub env: &'a [(String, String)],
    /// Bytes written to the child's stdin (binary-safe, written via a
    /// sibling file and shell redirection per spec §4.1's workspace
    /// protocol rather than passed on the command line).
    pub stdin: &'a [u8],
    /// Memory ceiling in MB; implementations enforce this as best-effort
    /// (e.g. `RLIMIT_AS`), surfacing an over-limit process as an ordinary
    /// non-zero exit so the engine can distinguish it from a time-out.
    pub memory_mb: u32,
}

/// Raw result of one `exec` call — no verdict interpretation, just what the
/// sandbox observed.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// True if the wall-clock timeout fired and the process was killed.
    pub timed_out: bool,
    pub time_ms: u32,
}

/// The external sandbox capability: `mkdir`, `writeFile`, `exec`.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn mkdir(&self, path: &Path, recursive: bool) -> Result<(), SandboxError>;

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), SandboxError>;

    /// Grant the owner execute permission on a previously written file
    /// (spec §4.1 workspace protocol: "`executable:true` files are given
    /// execute permission").
    async fn set_executable(&self, path: &Path) -> Result<(), SandboxError>;

    async fn exec(&self, params: ExecParams<'_>) -> Result<ExecOutput, SandboxError>;

    /// Remove a workspace directory and everything under it. Failures are
    /// the caller's to log and swallow per spec §4.1 ("cleanup failures are
    /// logged and swallowed").
    async fn remove_dir_all(&self, path: &Path) -> Result<(), SandboxError>;
}
