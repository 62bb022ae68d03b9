//! Test runner for mutation testing
//!
//! This module coordinates the mutation testing process:
//! - Schedules every mutation of the environment on the worker pool
//! - Polls the pool and forwards progress to the reporter
//! - Collects the final result

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::env::Env;
use crate::error::{MutantError, Result};
use crate::parallel::{self, ArraySource, Sink};
use crate::result::{EnvResult, MutationResult};
use crate::subject::Mutation;

/// Collects mutation results as workers finish them
///
/// Status snapshots share the result list; a push only copies it while a
/// snapshot is still held.
#[derive(Debug)]
pub struct MutationSink {
    start: Instant,
    fail_fast: bool,
    results: Arc<Vec<MutationResult>>,
    survived: usize,
}

impl MutationSink {
    pub fn new(fail_fast: bool) -> Self {
        Self {
            start: Instant::now(),
            fail_fast,
            results: Arc::new(Vec::new()),
            survived: 0,
        }
    }
}

impl Sink for MutationSink {
    type Item = MutationResult;
    type Payload = EnvResult;

    fn push(&mut self, result: MutationResult) {
        tracing::debug!(
            mutation = %result.mutation.identification(),
            killed = result.killed(),
            "mutation finished"
        );
        if result.survived() {
            self.survived += 1;
        }
        Arc::make_mut(&mut self.results).push(result);
    }

    fn status(&self) -> EnvResult {
        EnvResult {
            mutation_results: Arc::clone(&self.results),
            runtime: self.start.elapsed(),
        }
    }

    fn stop(&self) -> bool {
        self.fail_fast && self.survived > 0
    }
}

/// Run every mutation of `env` and report the outcome
pub fn run_mutation_tests(env: &Arc<Env>) -> Result<EnvResult> {
    let reporter = env.reporter();
    reporter.start(env);

    let settings = &env.config().settings;
    let processor_env = Arc::clone(env);
    let driver = parallel::spawn(parallel::Config {
        jobs: settings.jobs,
        source: ArraySource::new(env.mutations().to_vec()),
        sink: MutationSink::new(settings.fail_fast),
        processor: move |mutation: Mutation| processor_env.kill(&mutation),
    })
    .map_err(|e| MutantError::WorkerSpawn {
        error: e.to_string(),
    })?;
    tracing::debug!(jobs = settings.jobs, "workers started");

    loop {
        let status = driver.status();
        reporter.progress(&status);
        if status.done {
            break;
        }
        thread::sleep(reporter.delay());
    }

    let status = driver.stop();
    if status.dropped > 0 {
        env.warn(&format!(
            "{} mutation(s) were dropped after a worker panic",
            status.dropped
        ));
    }
    reporter.report(&status.payload);
    Ok(status.payload)
}
