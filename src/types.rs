//! Shared data model crossing the judge/engine boundary.
//!
//! These types are the Rust rendering of spec §3's entity table: `TypeSpec`,
//! `ComparatorSpec`, `TestCase` and `Problem`. They are immutable once built —
//! a `Problem` is a value object per judge revision, not something the
//! pipeline mutates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shape of a value crossing the harness/candidate boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeSpec {
    Int,
    Long,
    Float,
    Double,
    String,
    Char,
    Boolean,
    Array { of: Box<TypeSpec> },
    Matrix { of: Box<TypeSpec> },
    Tuple { elements: Vec<TypeSpec> },
    Object { fields: HashMap<String, TypeSpec> },
    Tree,
    LinkedList,
    Graph,
    Void,
}

impl TypeSpec {
    /// Walk this type (and any nested element types) looking for a structural
    /// kind the harness builder needs to synthesize a helper for.
    pub fn contains(&self, predicate: &impl Fn(&TypeSpec) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        match self {
            TypeSpec::Array { of } | TypeSpec::Matrix { of } => of.contains(predicate),
            TypeSpec::Tuple { elements } => elements.iter().any(|e| e.contains(predicate)),
            TypeSpec::Object { fields } => fields.values().any(|e| e.contains(predicate)),
            _ => false,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, TypeSpec::Tree)
    }

    pub fn is_linked_list(&self) -> bool {
        matches!(self, TypeSpec::LinkedList)
    }

    pub fn is_graph(&self) -> bool {
        matches!(self, TypeSpec::Graph)
    }
}

/// How to compare an actual value against an expected one. Unknown
/// `type` tags decode into [`ComparatorSpec::Unknown`] rather than failing —
/// spec §4.4 requires that callers treat these as `exact` and log a warning,
/// not reject the test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ComparatorSpec {
    Exact,
    Numeric { tolerance: f64 },
    UnorderedArray,
    Set,
    Multiset,
    FloatArray { tolerance: f64 },
    #[serde(other)]
    Unknown,
}

/// Visibility of a test case to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// One input/expected pair within a problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub test_id: String,
    pub input: Vec<Value>,
    pub expected: Value,
    pub comparator: ComparatorSpec,
    pub visibility: Visibility,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

fn default_time_limit_ms() -> u32 {
    2000
}

fn default_memory_limit_mb() -> u32 {
    256
}

/// A judgable problem: the test battery plus per-language harness, reference
/// and starter code. Immutable per revision — callers construct a new
/// `Problem` rather than mutating one mid-pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub problem_id: String,
    pub tests: Vec<TestCase>,
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u32,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u32,
    /// Per-language harness ("Main") source. Required for every language the
    /// problem claims to support — its absence is a hard configuration
    /// fault, not a compile error (spec §4.2 failure semantics).
    #[serde(default)]
    pub harness: HashMap<String, String>,
    #[serde(default)]
    pub reference_code: HashMap<String, String>,
    #[serde(default)]
    pub starter_code: HashMap<String, String>,
    /// Positional argument types fed to the candidate, in call order.
    pub input_spec: Vec<TypeSpec>,
    pub output_spec: TypeSpec,
}

impl Problem {
    /// Total weight across all tests. Per spec §3, `sum(weight) > 0`
    /// whenever `tests` is non-empty — that invariant is the caller's
    /// responsibility to uphold when constructing a `Problem`.
    pub fn total_weight(&self) -> f64 {
        self.tests.iter().map(|t| t.weight).sum()
    }

    pub fn needs_tree_helper(&self) -> bool {
        self.input_spec.iter().any(|t| t.contains(&TypeSpec::is_tree))
            || self.output_spec.contains(&TypeSpec::is_tree)
    }

    pub fn needs_linked_list_helper(&self) -> bool {
        self.input_spec
            .iter()
            .any(|t| t.contains(&TypeSpec::is_linked_list))
            || self.output_spec.contains(&TypeSpec::is_linked_list)
    }

    pub fn needs_graph_helper(&self) -> bool {
        self.input_spec.iter().any(|t| t.contains(&TypeSpec::is_graph))
            || self.output_spec.contains(&TypeSpec::is_graph)
    }
}
