//! CLI for the mutation testing engine

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use mutant::{
    bootstrap, rebase_includes, run_mutation_tests, Cache, CliReporter, Config, Env, Registry,
    SexpParser,
};

#[derive(Parser)]
#[command(name = "mutant")]
#[command(author, version, about = "Mutation testing for syntax-tree programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run mutation tests
    Run {
        /// Path to the config file
        #[arg(short, long, default_value = "mutant.yml")]
        config: PathBuf,
    },

    /// List the subjects selected by the config
    Subjects {
        /// Path to the config file
        #[arg(short, long, default_value = "mutant.yml")]
        config: PathBuf,
    },

    /// Print every mutation without running tests
    Mutations {
        /// Path to the config file
        #[arg(short, long, default_value = "mutant.yml")]
        config: PathBuf,
    },

    /// Show example configuration
    Example,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = match cli.command {
        Commands::Run { config } => run(&config),
        Commands::Subjects { config } => list_subjects(&config),
        Commands::Mutations { config } => list_mutations(&config),
        Commands::Example => {
            print_example();
            Ok(ExitCode::SUCCESS)
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mutant=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load, validate and bootstrap the config at `path`
fn load_env(path: &Path) -> anyhow::Result<Arc<Env>> {
    let mut config = Config::load(path)?;
    if let Some(root) = path.parent() {
        rebase_includes(&mut config, root);
    }
    config.validate().map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| format!("  • {}", e)).collect();
        anyhow!("invalid configuration\n{}", messages.join("\n"))
    })?;

    let reporter = Arc::new(CliReporter::new(config.settings.delay()));
    let env = bootstrap(
        config,
        &Cache::new(SexpParser),
        &Registry::with_defaults(),
        reporter,
    )
    .with_context(|| format!("failed to bootstrap from '{}'", path.display()))?;
    Ok(Arc::new(env))
}

fn run(path: &Path) -> anyhow::Result<ExitCode> {
    println!("{}", "Loading configuration...".dimmed());
    let env = load_env(path)?;
    let result = run_mutation_tests(&env)?;

    if result.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn list_subjects(path: &Path) -> anyhow::Result<ExitCode> {
    let env = load_env(path)?;
    for subject in env.subjects() {
        let mutations = env
            .mutations()
            .iter()
            .filter(|mutation| Arc::ptr_eq(mutation.subject(), subject))
            .count();
        println!(
            "{} {}",
            subject.identification(),
            format!("({} mutations)", mutations).dimmed()
        );
    }
    println!();
    println!(
        "{} subject(s), {} mutation(s)",
        env.subjects().len(),
        env.mutations().len()
    );
    Ok(ExitCode::SUCCESS)
}

fn list_mutations(path: &Path) -> anyhow::Result<ExitCode> {
    let env = load_env(path)?;
    for mutation in env.mutations() {
        println!("{}", mutation.identification().yellow());
        for line in mutation.subject().source().lines() {
            println!("  {}", format!("-{}", line).red());
        }
        for line in mutation.source().lines() {
            println!("  {}", format!("+{}", line).green());
        }
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

fn print_example() {
    let example = r#"# Example mutant.yml configuration file
version: "1.0"

settings:
  jobs: 4            # worker threads (default: number of CPUs)
  timeout: 30        # seconds per test run
  delay: 50          # milliseconds between progress updates
  isolation: sandbox # or: none
  fail_fast: false

integration:
  name: command
  # Selected test ids are appended; MUTANT_ROOT names the mutated program
  command: ["sh", "run_tests.sh"]
  tests:
    - id: greeter_spec
      expression: "App::Greeter*"
    - id: greeter_greet_spec
      expression: "App::Greeter#greet"

# Searched in order for every entry of `requires`
includes:
  - lib

requires:
  - app/greeter

matcher:
  match_expressions:
    - "App*"
  ignore_expressions:
    - "App::Greeter#debug"
"#;

    println!("{}", example);
}
