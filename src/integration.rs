//! Test framework integrations
//!
//! An [`Integration`] knows the available tests and runs a selection of them
//! against a program image. Integrations are looked up by name in an
//! explicit [`Registry`].

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::process::{self, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{MutantError, Result};
use crate::expression::Expression;
use crate::program::ProgramImage;
use crate::result::TestResult;
use crate::sexp;

/// Environment variable pointing commands at the materialized image
pub const ROOT_VARIABLE: &str = "MUTANT_ROOT";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A test known to an integration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Test {
    pub id: String,
    /// Part of the program the test covers
    pub expression: Expression,
}

pub trait Integration: Send + Sync {
    /// Prepare for test runs, failing if the integration is unusable
    fn setup(&mut self) -> Result<()>;

    /// Run `tests` against `image`
    fn call(&self, image: &ProgramImage, tests: &[Test]) -> TestResult;

    fn all_tests(&self) -> &[Test];
}

/// Integration whose tests always pass
#[derive(Debug, Default)]
pub struct Null {
    tests: Vec<Test>,
}

impl Null {
    pub fn new(tests: Vec<Test>) -> Self {
        Self { tests }
    }
}

impl Integration for Null {
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn call(&self, _image: &ProgramImage, tests: &[Test]) -> TestResult {
        TestResult {
            tests: tests.to_vec(),
            output: String::new(),
            runtime: Duration::ZERO,
            passed: true,
        }
    }

    fn all_tests(&self) -> &[Test] {
        &self.tests
    }
}

/// Integration running an external command
///
/// The image is written as `.sexp` files below a temporary directory named
/// by `MUTANT_ROOT`, and the ids of the selected tests are appended to the
/// command line. The tests pass iff the command exits successfully.
#[derive(Debug)]
pub struct Command {
    command: Vec<String>,
    tests: Vec<Test>,
    timeout: Duration,
}

impl Command {
    pub fn new(command: Vec<String>, tests: Vec<Test>, timeout: Duration) -> Self {
        Self {
            command,
            tests,
            timeout,
        }
    }

    fn run(&self, image: &ProgramImage, tests: &[Test]) -> io::Result<(bool, String)> {
        let root = tempfile::tempdir()?;
        write_image(image, root.path())?;

        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;
        let (program, arguments) = self
            .command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        let start = Instant::now();
        let mut child = process::Command::new(program)
            .args(arguments)
            .args(tests.iter().map(|test| &test.id))
            .env(ROOT_VARIABLE, root.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()?;

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if start.elapsed() >= self.timeout {
                child.kill()?;
                child.wait()?;
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let mut output = read_from_start(&mut stdout)?;
        output.push_str(&read_from_start(&mut stderr)?);
        match status {
            Some(status) => Ok((status.success(), output)),
            None => {
                output.push_str(&format!(
                    "\ncommand timed out after {:.1}s",
                    self.timeout.as_secs_f64()
                ));
                Ok((false, output))
            }
        }
    }
}

impl Integration for Command {
    fn setup(&mut self) -> Result<()> {
        if self.command.is_empty() {
            return Err(MutantError::IntegrationSetup {
                name: "command".to_string(),
                message: "integration.command is empty".to_string(),
            });
        }
        Ok(())
    }

    fn call(&self, image: &ProgramImage, tests: &[Test]) -> TestResult {
        let start = Instant::now();
        if tests.is_empty() {
            return TestResult {
                tests: Vec::new(),
                output: String::new(),
                runtime: start.elapsed(),
                passed: true,
            };
        }

        match self.run(image, tests) {
            Ok((passed, output)) => TestResult {
                tests: tests.to_vec(),
                output,
                runtime: start.elapsed(),
                passed,
            },
            Err(e) => TestResult::failure(
                tests.to_vec(),
                format!("failed to run {:?}: {}", self.command, e),
                start.elapsed(),
            ),
        }
    }

    fn all_tests(&self) -> &[Test] {
        &self.tests
    }
}

/// Write every file of `image` below `root`
pub fn write_image(image: &ProgramImage, root: &Path) -> io::Result<()> {
    for (path, tree) in image.files() {
        let destination = root.join(relative(path));
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&destination, sexp::write(tree) + "\n")?;
    }
    Ok(())
}

/// `path` without root, prefix or parent components
fn relative(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

fn read_from_start(file: &mut File) -> io::Result<String> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Constructor of an integration from configuration
pub type Builder = fn(&Config) -> Result<Box<dyn Integration>>;

/// Integrations available by name
#[derive(Clone, Default)]
pub struct Registry {
    builders: BTreeMap<String, Builder>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `null` and `command` integrations
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("null", |config| {
            Ok(Box::new(Null::new(config.integration.tests.clone())))
        });
        registry.register("command", |config| {
            Ok(Box::new(Command::new(
                config.integration.command.clone(),
                config.integration.tests.clone(),
                config.settings.timeout(),
            )))
        });
        registry
    }

    pub fn register(&mut self, name: &str, builder: Builder) {
        self.builders.insert(name.to_string(), builder);
    }

    pub fn names(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }

    /// Build and set up the integration named in `config`
    pub fn build(&self, config: &Config) -> Result<Box<dyn Integration>> {
        let name = &config.integration.name;
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| MutantError::UnknownIntegration {
                name: name.clone(),
                available: self.names(),
            })?;
        let mut integration = builder(config)?;
        integration.setup()?;
        Ok(integration)
    }
}
