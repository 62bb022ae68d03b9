//! Bootstrapped run environment
//!
//! [`bootstrap`] loads the program image, sets up the integration and
//! expands the matched subjects into mutations. The resulting [`Env`] is
//! shared read-only between workers, which call [`Env::kill`] once per
//! mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{Cache, Parser};
use crate::config::Config;
use crate::error::{MutantError, Result};
use crate::integration::{Integration, Registry, Test};
use crate::isolation::Isolation;
use crate::matcher::Compiler;
use crate::program::{ProgramImage, Universe};
use crate::report::Reporter;
use crate::result::{MutationResult, TestResult};
use crate::selector::Selector;
use crate::subject::{Mutation, Subject};

/// Extension appended to requires given without one
const SOURCE_EXTENSION: &str = "sexp";

pub struct Env {
    config: Config,
    image: Arc<ProgramImage>,
    universe: Universe,
    subjects: Vec<Arc<Subject>>,
    mutations: Vec<Mutation>,
    integration: Arc<dyn Integration>,
    selector: Selector,
    isolation: Isolation,
    reporter: Arc<dyn Reporter>,
}

/// Build the run environment described by `config`
pub fn bootstrap<P: Parser>(
    config: Config,
    cache: &Cache<P>,
    registry: &Registry,
    reporter: Arc<dyn Reporter>,
) -> Result<Env> {
    let mut image = ProgramImage::new();
    for name in &config.requires {
        let path = resolve(name, &config.includes)?;
        tracing::debug!(require = %name, path = %path.display(), "loading");
        let tree = cache.parse(&path)?;
        image.load(path, tree);
    }

    let integration: Arc<dyn Integration> = Arc::from(registry.build(&config)?);
    tracing::debug!(
        integration = %config.integration.name,
        tests = integration.all_tests().len(),
        "integration ready"
    );

    let universe = Universe::discover(&image);
    let subjects: Vec<Arc<Subject>> = Compiler::compile(&config.matcher)
        .subjects(&universe, reporter.as_ref())
        .map(Arc::new)
        .collect();
    let mutations: Vec<Mutation> = subjects.iter().flat_map(Subject::mutations).collect();
    tracing::debug!(
        scopes = universe.scopes().len(),
        subjects = subjects.len(),
        mutations = mutations.len(),
        "bootstrapped"
    );

    let selector = Selector::new(integration.all_tests().to_vec());
    let isolation = Isolation::new(config.settings.isolation, config.settings.timeout());

    let env = Env {
        config,
        image: Arc::new(image),
        universe,
        subjects,
        mutations,
        integration,
        selector,
        isolation,
        reporter,
    };
    if env.subjects.is_empty() {
        env.warn("no subjects matched the configured expressions");
    }
    Ok(env)
}

/// Find the file for `name` in the first include directory that has it
fn resolve(name: &str, includes: &[PathBuf]) -> Result<PathBuf> {
    let mut file = PathBuf::from(name);
    if file.extension().is_none() {
        file.set_extension(SOURCE_EXTENSION);
    }
    if file.is_absolute() {
        return if file.is_file() {
            Ok(file)
        } else {
            Err(MutantError::RequireNotFound {
                name: name.to_string(),
                searched: vec![file],
            })
        };
    }

    let searched: Vec<PathBuf> = includes.iter().map(|dir| dir.join(&file)).collect();
    match searched.iter().find(|candidate| candidate.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(MutantError::RequireNotFound {
            name: name.to_string(),
            searched,
        }),
    }
}

impl Env {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The unmutated program image
    pub fn image(&self) -> &ProgramImage {
        &self.image
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn subjects(&self) -> &[Arc<Subject>] {
        &self.subjects
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    /// Run the selected tests against `mutation`
    ///
    /// Errors on the way to a test result never escape: they become a
    /// failing result with the diagnostic in [`MutationResult::error`].
    pub fn kill(&self, mutation: &Mutation) -> MutationResult {
        let start = Instant::now();
        let tests = match self.selector.call(mutation.subject()) {
            Ok(tests) => tests,
            Err(error) => return self.failed(mutation, Vec::new(), error.to_string(), start),
        };

        let image = Arc::clone(&self.image);
        let integration = Arc::clone(&self.integration);
        let isolated = mutation.clone();
        let selected = tests.clone();
        let outcome = self.isolation.call(move || -> Result<TestResult> {
            let mutated = isolated.insert(&image)?;
            Ok(integration.call(&mutated, &selected))
        });

        match outcome {
            Ok(Ok(test_result)) => MutationResult {
                mutation: mutation.clone(),
                test_result,
                error: None,
            },
            Ok(Err(error)) => self.failed(mutation, tests, error.to_string(), start),
            Err(error) => self.failed(mutation, tests, error.to_string(), start),
        }
    }

    fn failed(
        &self,
        mutation: &Mutation,
        tests: Vec<Test>,
        error: String,
        start: Instant,
    ) -> MutationResult {
        tracing::warn!(mutation = %mutation.identification(), %error, "mutation errored");
        MutationResult {
            mutation: mutation.clone(),
            test_result: TestResult::failure(tests, error.clone(), start.elapsed()),
            error: Some(error),
        }
    }

    /// Report a non-fatal problem
    pub fn warn(&self, message: &str) {
        tracing::warn!("{}", message);
        self.reporter.warn(message);
    }
}

/// Relative include paths are resolved against `root`
pub fn rebase_includes(config: &mut Config, root: &Path) {
    for include in &mut config.includes {
        if include.is_relative() {
            *include = root.join(&*include);
        }
    }
}
