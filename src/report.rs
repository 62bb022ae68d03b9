//! Progress and result reporting
//!
//! This module formats and displays mutation testing progress and results.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use colored::Colorize;

use crate::env::Env;
use crate::parallel::Status;
use crate::result::{EnvResult, MutationResult};

/// Receives run lifecycle events
pub trait Reporter: Send + Sync {
    /// Called once before any mutation is run
    fn start(&self, env: &Env);

    /// Called on every poll of the running scheduler
    fn progress(&self, status: &Status<EnvResult>);

    /// Called once with the final result
    fn report(&self, result: &EnvResult);

    fn warn(&self, message: &str);

    /// Interval between progress polls
    fn delay(&self) -> Duration;
}

/// Reporter that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn start(&self, _env: &Env) {}

    fn progress(&self, _status: &Status<EnvResult>) {}

    fn report(&self, _result: &EnvResult) {}

    fn warn(&self, _message: &str) {}

    fn delay(&self) -> Duration {
        Duration::from_millis(10)
    }
}

/// Coloured terminal reporter
///
/// Progress goes to stderr, the final report to stdout.
#[derive(Debug)]
pub struct CliReporter {
    delay: Duration,
    total: AtomicUsize,
}

impl CliReporter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            total: AtomicUsize::new(0),
        }
    }
}

impl Reporter for CliReporter {
    fn start(&self, env: &Env) {
        let mutations = env.mutations().len();
        self.total.store(mutations, Ordering::SeqCst);

        println!("{}", "Mutation Testing".bold());
        println!("{}", "=".repeat(60));
        println!("Integration:       {}", env.config().integration.name);
        println!("Jobs:              {}", env.config().settings.jobs);
        println!("Subjects:          {}", env.subjects().len());
        println!("Mutations:         {}", mutations);
        println!();
    }

    fn progress(&self, status: &Status<EnvResult>) {
        let payload = &status.payload;
        eprint!(
            "\r{} {}/{} {} {} {} {} active",
            "progress:".dimmed(),
            payload.total(),
            self.total.load(Ordering::SeqCst),
            "killed:".dimmed(),
            payload.killed().to_string().green(),
            format!("alive: {}", payload.survived()).red(),
            status.active_jobs,
        );
        if status.done {
            eprintln!();
        }
    }

    fn report(&self, result: &EnvResult) {
        println!();
        println!("{}", "Mutation Testing Report".bold());
        println!("{}", "=".repeat(60));
        println!();

        for mutation_result in result.mutation_results.iter() {
            let status = if mutation_result.errored() {
                "[ERROR]".yellow().bold()
            } else if mutation_result.killed() {
                "[KILLED]".green().bold()
            } else {
                "[SURVIVED]".red().bold()
            };
            println!(
                "{} {}",
                status,
                mutation_result.mutation.identification().dimmed()
            );
            if let Some(error) = &mutation_result.error {
                println!("        {}", error.yellow());
            }
        }

        println!();
        println!("{}", "Summary".bold());
        println!("{}", "-".repeat(40));
        println!("Total mutations:   {}", result.total());
        println!(
            "Killed:            {} {}",
            result.killed(),
            "(good - tests caught the mutation)".dimmed()
        );
        println!(
            "Survived:          {} {}",
            result.survived(),
            "(bad - tests missed the mutation)".dimmed()
        );
        if result.errors() > 0 {
            println!("Errors:            {}", result.errors());
        }

        println!();
        let score = result.score();
        let score_str = format!("{:.1}%", score);
        let score_colored = if score >= 90.0 {
            score_str.green().bold()
        } else if score >= 70.0 {
            score_str.yellow().bold()
        } else {
            score_str.red().bold()
        };
        println!("Mutation Score:    {}", score_colored);
        println!("Duration:          {}", format_duration(result.runtime));

        let survivors = result.survivors();
        if !survivors.is_empty() {
            println!();
            println!("{}", "Surviving Mutations (improve your tests!)".red().bold());
            println!("{}", "-".repeat(40));
            for survivor in survivors {
                print_survivor(survivor);
            }
        }
    }

    fn warn(&self, message: &str) {
        eprintln!("{}: {}", "Warning".yellow().bold(), message);
    }

    fn delay(&self) -> Duration {
        self.delay
    }
}

fn print_survivor(result: &MutationResult) {
    let mutation = &result.mutation;
    println!("  • {}", mutation.identification().yellow());
    for line in mutation.subject().source().lines() {
        println!("    {}", format!("-{}", line).red());
    }
    for line in mutation.source().lines() {
        println!("    {}", format!("+{}", line).green());
    }
    let tests: Vec<&str> = result
        .test_result
        .tests
        .iter()
        .map(|test| test.id.as_str())
        .collect();
    if tests.is_empty() {
        println!("    {}", "no tests selected".dimmed());
    } else {
        println!("    {} {}", "tests:".dimmed(), tests.join(", "));
    }
}

/// Format duration in a human-readable way
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_null_reporter_delay() {
        assert!(NullReporter.delay() > Duration::ZERO);
    }
}
