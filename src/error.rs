//! Typed errors at module boundaries.
//!
//! The engine and parser never propagate these past their own API — per spec
//! §7, errors are normalized into verdicts at the orchestrator boundary. They
//! exist so callers *inside* the crate can branch on `kind` instead of
//! string-matching a message, mirroring the teacher's `error-chain`/`anyhow`
//! split between infrastructure code and the worker loop.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine-level error taxonomy (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    Timeout,
    Oom,
    SandboxError,
}

impl std::fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineErrorKind::Timeout => "timeout",
            EngineErrorKind::Oom => "oom",
            EngineErrorKind::SandboxError => "sandbox_error",
        };
        write!(f, "{s}")
    }
}

/// An engine-level error, carried on `ExecutionResult.error`.
///
/// `exit_code` preserves the sandbox's own observation (spec §4.1 edge-case
/// policy: "Exit code 124 reserved to surface timeout-from-exec distinct
/// from -1 generic error") so the phase built from this error doesn't
/// flatten a timeout and an infrastructure fault into the same code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
    pub exit_code: i32,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>, exit_code: i32) -> Self {
        Self {
            kind,
            message: message.into(),
            exit_code,
        }
    }
}

/// Output-parser failure taxonomy (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    MissingSentinel,
    MalformedJson,
    InvalidStructure,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParseErrorKind::MissingSentinel => "MISSING_SENTINEL",
            ParseErrorKind::MalformedJson => "MALFORMED_JSON",
            ParseErrorKind::InvalidStructure => "INVALID_STRUCTURE",
        };
        write!(f, "{s}")
    }
}

/// A parse failure. Always carries the best-effort `user_stdout` extracted
/// before the failure was detected, per the parser's "never throws, always
/// populates userStdout" guarantee.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub user_stdout: String,
    pub detail: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for ParseError {}

/// Harness-builder failures (spec §4.2 "Failure semantics").
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("problem {problem_id} has no harness registered for language {language}")]
    MissingHarness {
        problem_id: String,
        language: String,
    },
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("could not render harness template: {0}")]
    UnrenderableSpec(String),
}

/// Sandbox-capability failures (spec §6's external `exec`/`mkdir`/`writeFile`).
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox I/O error: {0}")]
    Io(String),
    #[error("sandbox exec failed to start: {0}")]
    Spawn(String),
}
