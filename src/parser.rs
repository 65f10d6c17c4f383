//! Output Parser (spec §4.3) — recovers the sentinel-delimited judge payload
//! from arbitrary stdout, or explains precisely why recovery failed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParseError, ParseErrorKind};

pub const BEGIN_SENTINEL: &str = "<<<JUDGE_OUTPUT_V1_BEGIN>>>";
pub const END_SENTINEL: &str = "<<<JUDGE_OUTPUT_V1_END>>>";

/// One test case's raw outcome as reported by the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeOutputResult {
    pub id: u32,
    pub status: String,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Run-level metadata the harness reports alongside per-test results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeOutputMeta {
    pub time_ms: u64,
    #[serde(default)]
    pub memory_kb: Option<u64>,
}

/// The parsed harness payload (spec §3 `JudgeOutput`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeOutput {
    pub results: Vec<JudgeOutputResult>,
    pub meta: JudgeOutputMeta,
    /// Everything the candidate printed before the BEGIN sentinel, trimmed.
    /// Populated on success too, not just failure — spec §4.3's "userStdout
    /// is always populated" guarantee isn't limited to the error path.
    #[serde(skip)]
    pub user_stdout: String,
}

/// Recover a [`JudgeOutput`] from `stdout`, or a [`ParseError`] carrying the
/// best-effort `userStdout` recovered so far. Never panics.
pub fn parse(stdout: &str) -> Result<JudgeOutput, ParseError> {
    let end_idx = match stdout.rfind(END_SENTINEL) {
        Some(idx) => idx,
        None => {
            return Err(ParseError {
                kind: ParseErrorKind::MissingSentinel,
                user_stdout: stdout.trim().to_string(),
                detail: "END sentinel not found in stdout".into(),
            })
        }
    };

    let begin_idx = match stdout[..end_idx].rfind(BEGIN_SENTINEL) {
        Some(idx) => idx,
        None => {
            return Err(ParseError {
                kind: ParseErrorKind::MissingSentinel,
                user_stdout: stdout.trim().to_string(),
                detail: "BEGIN sentinel not found before END sentinel".into(),
            })
        }
    };

    let user_stdout = stdout[..begin_idx].trim().to_string();
    let json_start = begin_idx + BEGIN_SENTINEL.len();
    let json_text = stdout[json_start..end_idx].trim();

    let value: Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(e) => {
            return Err(ParseError {
                kind: ParseErrorKind::MalformedJson,
                user_stdout,
                detail: format!("invalid JSON between sentinels: {e}"),
            })
        }
    };

    validate_and_convert(value, user_stdout)
}

impl JudgeOutput {
    pub fn find(&self, id: u32) -> Option<&JudgeOutputResult> {
        self.results.iter().find(|r| r.id == id)
    }
}

fn validate_and_convert(value: Value, user_stdout: String) -> Result<JudgeOutput, ParseError> {
    let invalid = |detail: String| ParseError {
        kind: ParseErrorKind::InvalidStructure,
        user_stdout: user_stdout.clone(),
        detail,
    };

    let root = value
        .as_object()
        .ok_or_else(|| invalid("root is not a JSON object".into()))?;

    let results_value = root
        .get("results")
        .ok_or_else(|| invalid("missing 'results' field".into()))?;
    let results_array = results_value
        .as_array()
        .ok_or_else(|| invalid("'results' is not an array".into()))?;

    let mut results = Vec::with_capacity(results_array.len());
    for (idx, entry) in results_array.iter().enumerate() {
        let obj = entry
            .as_object()
            .ok_or_else(|| invalid(format!("results[{idx}] is not an object")))?;

        let id = obj
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| invalid(format!("results[{idx}].id is missing or not numeric")))?
            as u32;

        let status = obj
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(format!("results[{idx}].status is missing or not a string")))?
            .to_string();

        if status != "OK" && status != "ERROR" {
            return Err(invalid(format!(
                "results[{idx}].status must be \"OK\" or \"ERROR\", got {status:?}"
            )));
        }

        let output = obj.get("output").cloned();
        let error = obj
            .get("error")
            .and_then(Value::as_str)
            .map(|s| s.to_string());

        results.push(JudgeOutputResult {
            id,
            status,
            output,
            error,
        });
    }

    let meta_value = root
        .get("meta")
        .ok_or_else(|| invalid("missing 'meta' field".into()))?;
    let meta_obj = meta_value
        .as_object()
        .ok_or_else(|| invalid("'meta' is not an object".into()))?;

    let time_ms = meta_obj
        .get("timeMs")
        .and_then(Value::as_u64)
        .ok_or_else(|| invalid("meta.timeMs is missing or not numeric".into()))?;

    let memory_kb = meta_obj.get("memoryKb").and_then(Value::as_u64);

    Ok(JudgeOutput {
        results,
        meta: JudgeOutputMeta { time_ms, memory_kb },
        user_stdout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrap(user_prefix: &str, payload: &Value) -> String {
        format!(
            "{user_prefix}{BEGIN_SENTINEL}{}{END_SENTINEL}",
            serde_json::to_string(payload).unwrap()
        )
    }

    fn valid_payload() -> Value {
        json!({
            "results": [
                {"id": 0, "status": "OK", "output": [1, 2]},
                {"id": 1, "status": "ERROR", "error": "boom"}
            ],
            "meta": {"timeMs": 42, "memoryKb": 1024}
        })
    }

    #[test]
    fn parses_well_formed_payload() {
        let stdout = wrap("debug print\n", &valid_payload());
        let parsed = parse(&stdout).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].status, "OK");
        assert_eq!(parsed.results[1].error.as_deref(), Some("boom"));
        assert_eq!(parsed.meta.time_ms, 42);
        assert_eq!(parsed.meta.memory_kb, Some(1024));
        assert_eq!(parsed.user_stdout, "debug print");
    }

    #[test]
    fn user_stdout_preserved_before_begin() {
        let stdout = wrap("hello from candidate\n", &valid_payload());
        // userStdout is discarded by `parse` on success; re-derive via a
        // failing case below to check the recovery path carries it.
        let _ = parse(&stdout).unwrap();
        let broken = format!("hello from candidate\n{BEGIN_SENTINEL}not json{END_SENTINEL}");
        let err = parse(&broken).unwrap_err();
        assert_eq!(err.user_stdout, "hello from candidate");
        assert_eq!(err.kind, ParseErrorKind::MalformedJson);
    }

    #[test]
    fn missing_end_sentinel_reports_full_stdout() {
        let stdout = "just some output, no sentinels at all";
        let err = parse(stdout).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingSentinel);
        assert_eq!(err.user_stdout, stdout);
    }

    #[test]
    fn missing_begin_before_end_is_missing_sentinel() {
        let stdout = format!("oops{END_SENTINEL}");
        let err = parse(&stdout).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingSentinel);
    }

    #[test]
    fn uses_last_occurrence_of_each_sentinel() {
        let inner = format!(
            "{BEGIN_SENTINEL}garbage{END_SENTINEL} trailing user print {}",
            wrap("", &valid_payload())
        );
        let parsed = parse(&inner).unwrap();
        assert_eq!(parsed.results.len(), 2);
    }

    #[test]
    fn invalid_structure_missing_results() {
        let stdout = wrap("", &json!({"meta": {"timeMs": 1}}));
        let err = parse(&stdout).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidStructure);
    }

    #[test]
    fn invalid_structure_bad_status_value() {
        let payload = json!({
            "results": [{"id": 0, "status": "MAYBE"}],
            "meta": {"timeMs": 1}
        });
        let stdout = wrap("", &payload);
        let err = parse(&stdout).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidStructure);
    }

    #[test]
    fn tolerates_spurious_text_around_sentinels() {
        let stdout = format!(
            "noise before\n{}\nnoise after, mentioning {BEGIN_SENTINEL} as text but no real pair",
            wrap("", &valid_payload())
        );
        let parsed = parse(&stdout).unwrap();
        assert_eq!(parsed.results.len(), 2);
    }
}
