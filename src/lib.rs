//! Language-agnostic execution engine and judge pipeline.
//!
//! Module dependency order mirrors the design: [`sandbox`] and [`engine`] sit
//! at the bottom, [`comparators`] and [`parser`] are pure helpers, [`harness`]
//! composes a [`types::Problem`] into an [`engine::ExecutionRequest`], and
//! [`judge`] wires everything into a single submission -> verdict pipeline.

pub mod comparators;
pub mod config;
pub mod engine;
pub mod error;
pub mod harness;
pub mod judge;
pub mod parser;
pub mod sandbox;
pub mod testing;
pub mod types;
pub mod verdict;

pub use engine::{ExecutionRequest, ExecutionResult, PhaseResult};
pub use judge::{Filter, Judge, JudgeResult, TestResult};
pub use types::{ComparatorSpec, Problem, TestCase, TypeSpec, Visibility};
pub use verdict::Verdict;
