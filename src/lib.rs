//! Mutation Testing Engine
//!
//! This library mutates method bodies of a program held as syntax trees,
//! runs the tests covering each method against every mutation and reports
//! the mutations no test detected. Programs are read from `.sexp` files,
//! subjects are selected with expressions such as `App::Greeter#greet` or
//! `App*`, and mutations run in parallel behind an isolation boundary.
//!
//! # Example Configuration
//!
//! ```yaml
//! version: "1.0"
//! settings:
//!   timeout: 30
//!
//! integration:
//!   name: command
//!   command: ["sh", "run_tests.sh"]
//!   tests:
//!     - id: greeter_spec
//!       expression: "App::Greeter*"
//!
//! includes: [lib]
//! requires: [app]
//!
//! matcher:
//!   match_expressions: ["App*"]
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use mutant::{bootstrap, run_mutation_tests, Cache, CliReporter, Config, Registry, SexpParser};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = Config::load(Path::new("mutant.yml")).unwrap();
//! let reporter = Arc::new(CliReporter::new(config.settings.delay()));
//! let env = bootstrap(config, &Cache::new(SexpParser), &Registry::with_defaults(), reporter).unwrap();
//! let result = run_mutation_tests(&Arc::new(env)).unwrap();
//! println!("score: {:.1}%", result.score());
//! ```

pub mod cache;
pub mod codegen;
pub mod config;
pub mod env;
pub mod error;
pub mod expression;
pub mod integration;
pub mod isolation;
pub mod matcher;
pub mod mutator;
pub mod node;
pub mod parallel;
pub mod program;
pub mod report;
pub mod result;
pub mod runner;
pub mod selector;
pub mod sexp;
pub mod subject;

// Re-export main types at crate root
pub use cache::{Cache, Parser};
pub use config::{Config, IntegrationConfig, MatcherConfig, Settings};
pub use env::{bootstrap, rebase_includes, Env};
pub use error::{IsolationError, MutantError, Result};
pub use expression::Expression;
pub use integration::{Integration, Registry, Test};
pub use isolation::{Isolation, IsolationKind};
pub use node::{Node, NodeRef};
pub use report::{CliReporter, NullReporter, Reporter};
pub use result::{EnvResult, MutationResult, TestResult};
pub use runner::run_mutation_tests;
pub use sexp::SexpParser;
pub use subject::{Mutation, Subject};
