//! Results of running tests against mutations

use std::sync::Arc;
use std::time::Duration;

use crate::integration::Test;
use crate::subject::Mutation;

/// Outcome of one integration call
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub tests: Vec<Test>,
    pub output: String,
    pub runtime: Duration,
    pub passed: bool,
}

impl TestResult {
    /// A failing result that carries a diagnostic instead of test output
    pub fn failure(tests: Vec<Test>, output: impl Into<String>, runtime: Duration) -> Self {
        Self {
            tests,
            output: output.into(),
            runtime,
            passed: false,
        }
    }
}

/// Verdict for one mutation
#[derive(Debug, Clone)]
pub struct MutationResult {
    pub mutation: Mutation,
    pub test_result: TestResult,
    /// Diagnostic when the tests could not run normally
    pub error: Option<String>,
}

impl MutationResult {
    /// Tests failed against the mutation
    pub fn killed(&self) -> bool {
        !self.test_result.passed
    }

    pub fn survived(&self) -> bool {
        self.test_result.passed
    }

    pub fn errored(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate over all mutation results of a run
#[derive(Debug, Clone, Default)]
pub struct EnvResult {
    pub mutation_results: Arc<Vec<MutationResult>>,
    pub runtime: Duration,
}

impl EnvResult {
    pub fn total(&self) -> usize {
        self.mutation_results.len()
    }

    pub fn killed(&self) -> usize {
        self.mutation_results.iter().filter(|r| r.killed()).count()
    }

    pub fn survived(&self) -> usize {
        self.mutation_results.iter().filter(|r| r.survived()).count()
    }

    pub fn errors(&self) -> usize {
        self.mutation_results.iter().filter(|r| r.errored()).count()
    }

    /// Percentage of killed mutations, 100 when nothing was run
    pub fn score(&self) -> f64 {
        if self.total() == 0 {
            return 100.0;
        }
        (self.killed() as f64 / self.total() as f64) * 100.0
    }

    pub fn survivors(&self) -> Vec<&MutationResult> {
        self.mutation_results
            .iter()
            .filter(|r| r.survived())
            .collect()
    }

    pub fn success(&self) -> bool {
        self.survived() == 0
    }
}
