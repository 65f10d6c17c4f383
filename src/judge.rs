//! Judge Orchestrator (spec §4.5) — the top-level pipeline. Composes the
//! harness builder, execution engine, output parser and comparators into a
//! single `(problem, candidateCode, language, filter) -> JudgeResult` call.
//!
//! Plays the role the teacher's free function `judger::process_judge_job`
//! plays (download testcases, compile, run per test, aggregate a verdict)
//! but generalized over an injected [`Sandbox`] per spec §9's "Global
//! singletons... testing should allow a constructor-injected sandbox"
//! instead of a hard-wired storage client + Redis job.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::comparators::compare;
use crate::config::EngineConfig;
use crate::engine::{self, CommandSpec, ExecutionLimits, ExecutionRequest, ExecutionResult};
use crate::error::EngineErrorKind;
use crate::harness::HarnessBuilder;
use crate::parser::{self, BEGIN_SENTINEL};
use crate::sandbox::Sandbox;
use crate::types::{Problem, TestCase};
use crate::verdict::Verdict;

/// Selector over tests for a run (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    All,
    Visible,
}

/// One judged test case (spec §3 `TestResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_id: String,
    pub passed: bool,
    pub verdict: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Value>,
    pub time_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The final aggregate returned to the caller (spec §3 `JudgeResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeResult {
    pub verdict: Verdict,
    pub score: f64,
    pub test_results: Vec<TestResult>,
    pub total_time_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl JudgeResult {
    fn accepted_empty() -> Self {
        Self {
            verdict: Verdict::AC,
            score: 1.0,
            test_results: Vec::new(),
            total_time_ms: 0,
            compilation_error: None,
            runtime_error: None,
            user_stdout: None,
            stderr: None,
        }
    }

    /// Every selected test takes the same `verdict` — used for the
    /// whole-batch outcomes (CE, TLE, MLE, and pre-parse RE) where no
    /// per-test distinction was ever possible.
    fn uniform(
        tests: &[&TestCase],
        verdict: Verdict,
        time_ms: u32,
        compilation_error: Option<String>,
        runtime_error: Option<String>,
        user_stdout: Option<String>,
        stderr: Option<String>,
    ) -> Self {
        let test_results = tests
            .iter()
            .map(|t| TestResult {
                test_id: t.test_id.clone(),
                passed: false,
                verdict,
                actual_output: None,
                expected_output: None,
                time_ms,
                error: None,
            })
            .collect();
        Self {
            verdict,
            score: 0.0,
            test_results,
            total_time_ms: time_ms,
            compilation_error,
            runtime_error,
            user_stdout,
            stderr,
        }
    }
}

static EXECUTION_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_execution_id(problem_id: &str) -> String {
    let n = EXECUTION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{problem_id}-{n}")
}

/// The judge orchestrator, parameterized over an injected [`Sandbox`].
pub struct Judge<'s> {
    sandbox: &'s dyn Sandbox,
    config: EngineConfig,
}

impl<'s> Judge<'s> {
    pub fn new(sandbox: &'s dyn Sandbox) -> Self {
        Self {
            sandbox,
            config: EngineConfig::from_env(),
        }
    }

    pub fn with_config(sandbox: &'s dyn Sandbox, config: EngineConfig) -> Self {
        Self { sandbox, config }
    }

    /// Judge one submission end to end (spec §4.5's state machine). Never
    /// panics: every failure mode normalizes into a `JudgeResult` verdict.
    pub async fn judge(
        &self,
        problem: &Problem,
        candidate_code: &str,
        language: &str,
        filter: Filter,
    ) -> JudgeResult {
        let tests = HarnessBuilder::select_tests(problem, filter);
        if tests.is_empty() {
            return JudgeResult::accepted_empty();
        }

        let harness = match HarnessBuilder::build(problem, language, candidate_code) {
            Ok(h) => h,
            Err(e) => {
                warn!(problem_id = %problem.problem_id, "harness build failed: {e}");
                return JudgeResult::uniform(
                    &tests,
                    Verdict::RE,
                    0,
                    None,
                    Some(format!("harness configuration fault: {e}")),
                    None,
                    None,
                );
            }
        };

        let stdin = HarnessBuilder::build_stdin(&tests);
        let (compile_timeout_ms, run_timeout_ms) = self.timeouts(problem, tests.len());

        let request = ExecutionRequest {
            execution_id: next_execution_id(&problem.problem_id),
            language: language.to_string(),
            files: harness.files,
            compile: harness.compile.map(|cmd| CommandSpec {
                cmd,
                timeout_ms: compile_timeout_ms,
            }),
            run_cmd: harness.run_cmd,
            run_timeout_ms,
            stdin: stdin.into_bytes(),
            limits: ExecutionLimits {
                cpu_ms: problem.time_limit_ms,
                memory_mb: problem.memory_limit_mb.max(self.config.min_memory_mb),
            },
            env: Vec::new(),
            cwd: None,
        };

        let exec_result = engine::execute(self.sandbox, &request, &self.config.workspace_base).await;
        self.interpret(&tests, exec_result)
    }

    fn timeouts(&self, problem: &Problem, n_tests: usize) -> (u32, u32) {
        let compile = (2 * problem.time_limit_ms).max(self.config.compile_timeout_floor_ms);
        let run = problem
            .time_limit_ms
            .saturating_mul(n_tests as u32)
            .max(self.config.run_timeout_floor_ms);
        (compile, run)
    }

    fn interpret(&self, tests: &[&TestCase], exec: ExecutionResult) -> JudgeResult {
        if let Some(compile) = &exec.compile {
            if !compile.success {
                return JudgeResult::uniform(
                    tests,
                    Verdict::CE,
                    0,
                    Some(compile.stderr.clone()),
                    None,
                    None,
                    None,
                );
            }
        }

        if let Some(err) = &exec.error {
            let verdict = match err.kind {
                EngineErrorKind::Timeout => Verdict::TLE,
                EngineErrorKind::Oom => Verdict::MLE,
                EngineErrorKind::SandboxError => Verdict::RE,
            };
            let runtime_error = matches!(verdict, Verdict::RE).then(|| err.message.clone());
            return JudgeResult::uniform(
                tests,
                verdict,
                exec.run.time_ms,
                None,
                runtime_error,
                None,
                Some(exec.run.stderr.clone()),
            );
        }

        if !exec.run.success && !exec.run.stdout.contains(BEGIN_SENTINEL) {
            return JudgeResult::uniform(
                tests,
                Verdict::RE,
                exec.run.time_ms,
                None,
                Some(format!(
                    "candidate exited with code {} before emitting judge output",
                    exec.run.exit_code
                )),
                Some(exec.run.stdout.clone()),
                Some(exec.run.stderr.clone()),
            );
        }

        let parsed = match parser::parse(&exec.run.stdout) {
            Ok(p) => p,
            Err(e) => {
                return JudgeResult::uniform(
                    tests,
                    Verdict::RE,
                    exec.run.time_ms,
                    None,
                    Some(format!("Protocol error: {}", e.kind)),
                    Some(e.user_stdout),
                    Some(exec.run.stderr.clone()),
                )
            }
        };

        let mut test_results = Vec::with_capacity(tests.len());
        let mut passed_weight = 0.0;
        let mut total_weight = 0.0;

        for (idx, test) in tests.iter().enumerate() {
            total_weight += test.weight;
            let id = idx as u32;
            let result = match parsed.find(id) {
                None => TestResult {
                    test_id: test.test_id.clone(),
                    passed: false,
                    verdict: Verdict::RE,
                    actual_output: None,
                    expected_output: Some(test.expected.clone()),
                    time_ms: parsed.meta.time_ms as u32,
                    error: Some(format!("missing result for test id {id}")),
                },
                Some(r) if r.status == "ERROR" => TestResult {
                    test_id: test.test_id.clone(),
                    passed: false,
                    verdict: Verdict::RE,
                    actual_output: None,
                    expected_output: Some(test.expected.clone()),
                    time_ms: parsed.meta.time_ms as u32,
                    error: r.error.clone(),
                },
                Some(r) => {
                    let actual = r.output.clone().unwrap_or(Value::Null);
                    let pass = compare(&actual, &test.expected, &test.comparator);
                    TestResult {
                        test_id: test.test_id.clone(),
                        passed: pass,
                        verdict: if pass { Verdict::AC } else { Verdict::WA },
                        actual_output: Some(actual),
                        expected_output: Some(test.expected.clone()),
                        time_ms: parsed.meta.time_ms as u32,
                        error: None,
                    }
                }
            };
            if result.passed {
                passed_weight += test.weight;
            }
            test_results.push(result);
        }

        let score = passed_weight / total_weight;
        let verdicts: Vec<Verdict> = test_results.iter().map(|r| r.verdict).collect();
        let verdict = Verdict::aggregate(&verdicts, score);

        info!(
            verdict = %verdict,
            score,
            tests = test_results.len(),
            "judge run complete"
        );

        JudgeResult {
            verdict,
            score,
            test_results,
            total_time_ms: parsed.meta.time_ms as u32,
            compilation_error: None,
            runtime_error: None,
            user_stdout: Some(parsed.user_stdout.clone()),
            stderr: (!exec.run.stderr.is_empty()).then(|| exec.run.stderr.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSandbox;
    use crate::types::{ComparatorSpec, TypeSpec, Visibility};
    use std::collections::HashMap;

    fn two_sum_problem() -> Problem {
        let mut harness = HashMap::new();
        harness.insert("python".to_string(), "present".to_string());
        Problem {
            problem_id: "two-sum".into(),
            tests: vec![
                TestCase {
                    test_id: "t0".into(),
                    input: vec![serde_json::json!([2, 7, 11, 15]), serde_json::json!(9)],
                    expected: serde_json::json!([0, 1]),
                    comparator: ComparatorSpec::UnorderedArray,
                    visibility: Visibility::Visible,
                    weight: 1.0,
                    description: None,
                },
                TestCase {
                    test_id: "t1".into(),
                    input: vec![serde_json::json!([3, 2, 4]), serde_json::json!(6)],
                    expected: serde_json::json!([1, 2]),
                    comparator: ComparatorSpec::UnorderedArray,
                    visibility: Visibility::Hidden,
                    weight: 1.0,
                    description: None,
                },
            ],
            time_limit_ms: 2000,
            memory_limit_mb: 256,
            harness,
            reference_code: HashMap::new(),
            starter_code: HashMap::new(),
            input_spec: vec![
                TypeSpec::Array {
                    of: Box::new(TypeSpec::Int),
                },
                TypeSpec::Int,
            ],
            output_spec: TypeSpec::Array {
                of: Box::new(TypeSpec::Int),
            },
        }
    }

    fn wrap(payload: &Value) -> String {
        format!(
            "{BEGIN_SENTINEL}{}{}",
            serde_json::to_string(payload).unwrap(),
            parser::END_SENTINEL
        )
    }

    #[tokio::test]
    async fn empty_test_selection_is_ac_without_execution() {
        let mut problem = two_sum_problem();
        problem.tests.clear();
        let sandbox = FakeSandbox::new();
        let judge = Judge::new(&sandbox);
        let result = judge.judge(&problem, "irrelevant", "python", Filter::All).await;
        assert_eq!(result.verdict, Verdict::AC);
        assert_eq!(result.score, 1.0);
        assert!(result.test_results.is_empty());
        assert!(sandbox.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn missing_harness_registration_surfaces_as_re() {
        let mut problem = two_sum_problem();
        problem.harness.clear();
        let sandbox = FakeSandbox::new();
        let judge = Judge::new(&sandbox);
        let result = judge.judge(&problem, "def solve(self, a, b): pass", "python", Filter::All).await;
        assert_eq!(result.verdict, Verdict::RE);
        assert!(result.runtime_error.unwrap().contains("harness configuration fault"));
        assert_eq!(result.test_results.len(), 2);
    }

    #[tokio::test]
    async fn all_tests_pass_is_ac() {
        let problem = two_sum_problem();
        let payload = serde_json::json!({
            "results": [
                {"id": 0, "status": "OK", "output": [0, 1]},
                {"id": 1, "status": "OK", "output": [2, 1]}
            ],
            "meta": {"timeMs": 12}
        });
        let sandbox = FakeSandbox::new().with_exit(0, wrap(&payload), "");
        let judge = Judge::new(&sandbox);
        let result = judge.judge(&problem, "def solve(self, a, b): pass", "python", Filter::All).await;
        assert_eq!(result.verdict, Verdict::AC);
        assert_eq!(result.score, 1.0);
        assert!(result.test_results.iter().all(|t| t.passed));
    }

    #[tokio::test]
    async fn one_wrong_answer_is_partial_accept() {
        let problem = two_sum_problem();
        let payload = serde_json::json!({
            "results": [
                {"id": 0, "status": "OK", "output": [0, 1]},
                {"id": 1, "status": "OK", "output": [0, 0]}
            ],
            "meta": {"timeMs": 12}
        });
        let sandbox = FakeSandbox::new().with_exit(0, wrap(&payload), "");
        let judge = Judge::new(&sandbox);
        let result = judge.judge(&problem, "def solve(self, a, b): pass", "python", Filter::All).await;
        assert_eq!(result.verdict, Verdict::PA);
        assert_eq!(result.score, 0.5);
    }

    #[tokio::test]
    async fn compile_failure_is_ce_with_all_tests_ce() {
        let mut problem = two_sum_problem();
        problem.harness.clear();
        problem.harness.insert("cpp".to_string(), "present".to_string());
        let sandbox = FakeSandbox::new().with_compile_exit(1, "", "syntax error");
        let judge = Judge::new(&sandbox);
        let result = judge
            .judge(
                &problem,
                "json solve(const json &input) { return input; }",
                "cpp",
                Filter::All,
            )
            .await;
        assert_eq!(result.verdict, Verdict::CE);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.compilation_error.as_deref(), Some("syntax error"));
        assert!(result.test_results.iter().all(|t| t.verdict == Verdict::CE));
    }

    #[tokio::test]
    async fn crash_without_sentinel_is_re() {
        let problem = two_sum_problem();
        let sandbox = FakeSandbox::new().with_exit(1, "", "segfault");
        let judge = Judge::new(&sandbox);
        let result = judge.judge(&problem, "def solve(self, a, b): pass", "python", Filter::All).await;
        assert_eq!(result.verdict, Verdict::RE);
    }

    #[tokio::test]
    async fn protocol_violation_without_sentinels_is_re() {
        let problem = two_sum_problem();
        let sandbox = FakeSandbox::new().with_exit(0, "random text with no sentinels", "");
        let judge = Judge::new(&sandbox);
        let result = judge.judge(&problem, "def solve(self, a, b): pass", "python", Filter::All).await;
        assert_eq!(result.verdict, Verdict::RE);
        assert!(result.runtime_error.unwrap().contains("MISSING_SENTINEL"));
        assert_eq!(result.user_stdout.as_deref(), Some("random text with no sentinels"));
    }

    #[tokio::test]
    async fn per_test_error_status_is_re_for_that_test() {
        let problem = two_sum_problem();
        let payload = serde_json::json!({
            "results": [
                {"id": 0, "status": "ERROR", "error": "division by zero"},
                {"id": 1, "status": "OK", "output": [1, 2]}
            ],
            "meta": {"timeMs": 8}
        });
        let sandbox = FakeSandbox::new().with_exit(0, wrap(&payload), "");
        let judge = Judge::new(&sandbox);
        let result = judge.judge(&problem, "def solve(self, a, b): pass", "python", Filter::All).await;
        assert_eq!(result.test_results[0].verdict, Verdict::RE);
        assert_eq!(result.test_results[0].error.as_deref(), Some("division by zero"));
        assert_eq!(result.test_results[1].verdict, Verdict::AC);
        assert_eq!(result.verdict, Verdict::RE);
    }

    #[tokio::test]
    async fn debug_prints_before_sentinel_do_not_affect_verdict() {
        let problem = two_sum_problem();
        let payload = serde_json::json!({
            "results": [
                {"id": 0, "status": "OK", "output": [0, 1]},
                {"id": 1, "status": "OK", "output": [2, 1]}
            ],
            "meta": {"timeMs": 5}
        });
        let stdout = format!("Debug: entering solve\n{}", wrap(&payload));
        let sandbox = FakeSandbox::new().with_exit(0, stdout, "");
        let judge = Judge::new(&sandbox);
        let result = judge.judge(&problem, "def solve(self, a, b): pass", "python", Filter::All).await;
        assert_eq!(result.verdict, Verdict::AC);
        assert!(result.user_stdout.unwrap().contains("Debug: "));
    }

    #[tokio::test]
    async fn visible_filter_runs_only_visible_tests() {
        let problem = two_sum_problem();
        let payload = serde_json::json!({
            "results": [{"id": 0, "status": "OK", "output": [0, 1]}],
            "meta": {"timeMs": 3}
        });
        let sandbox = FakeSandbox::new().with_exit(0, wrap(&payload), "");
        let judge = Judge::new(&sandbox);
        let result = judge
            .judge(&problem, "def solve(self, a, b): pass", "python", Filter::Visible)
            .await;
        assert_eq!(result.test_results.len(), 1);
        assert_eq!(result.verdict, Verdict::AC);
    }
}
