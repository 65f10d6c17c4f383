//! Environment-driven configuration, mirroring the teacher's
//! `SandboxConfig::from_env` pattern: fixed sane defaults, overridable by
//! environment variables, loaded once at process start.

use std::path::PathBuf;

/// Engine/judge-wide tunables that are not per-problem.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory under which per-execution workspaces are created.
    pub workspace_base: PathBuf,
    /// Floor applied to the compile timeout budget (spec §4.5).
    pub compile_timeout_floor_ms: u32,
    /// Floor applied to the run timeout budget (spec §4.5).
    pub run_timeout_floor_ms: u32,
    /// Minimum memory limit accepted by the engine (spec §4.1 input
    /// constraint: `limits.memoryMb >= 16`).
    pub min_memory_mb: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_base: std::env::temp_dir().join("judge-core-workspaces"),
            compile_timeout_floor_ms: 20_000,
            run_timeout_floor_ms: 30_000,
            min_memory_mb: 16,
        }
    }
}

impl EngineConfig {
    /// Load configuration, applying environment overrides over the defaults.
    /// Unset or unparsable variables fall back silently to the default,
    /// matching the teacher's tolerant `from_env` style.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("JUDGE_WORKSPACE_BASE") {
            config.workspace_base = PathBuf::from(dir);
        }
        if let Some(v) = env_u32("JUDGE_COMPILE_TIMEOUT_FLOOR_MS") {
            config.compile_timeout_floor_ms = v;
        }
        if let Some(v) = env_u32("JUDGE_RUN_TIMEOUT_FLOOR_MS") {
            config.run_timeout_floor_ms = v;
        }
        if let Some(v) = env_u32("JUDGE_MIN_MEMORY_MB") {
            config.min_memory_mb = v;
        }

        config
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_sane_floors() {
        let config = EngineConfig::default();
        assert_eq!(config.compile_timeout_floor_ms, 20_000);
        assert_eq!(config.run_timeout_floor_ms, 30_000);
    }
}
