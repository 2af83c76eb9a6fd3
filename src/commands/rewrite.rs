//! Rewrite command: recover a SQL statement from a model response.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use plancheck::{Config, ParsedRewrite, RewriteInterpreter};

use super::{is_stdin, read_input};
use crate::exit_codes;
use crate::output::{schema, CommandOutput, Output, Severity};

#[derive(Args, Debug)]
pub struct RewriteArgs {
    /// File holding the raw model response (`-` for stdin)
    #[arg(long)]
    pub response: PathBuf,

    /// The statement that was sent for rewriting
    #[arg(long)]
    pub original: Option<PathBuf>,
}

pub fn rewrite(args: &RewriteArgs, config: &Config, output: &Output) -> Result<i32> {
    if is_stdin(&args.response) && args.original.as_deref().is_some_and(is_stdin) {
        bail!("Only one input can be read from stdin");
    }

    let raw = read_input(&args.response)?;
    let original = match &args.original {
        Some(path) => read_input(path)?,
        None => String::new(),
    };

    let parsed = RewriteInterpreter::new(config.rewrite.clone()).interpret(&raw, &original);

    if output.is_json() {
        let severity = if parsed.success {
            Severity::Healthy
        } else {
            Severity::Warning
        };
        CommandOutput::new(schema::REWRITE, &parsed, severity).print()?;
    } else {
        print_human(&parsed, output);
    }

    Ok(if parsed.success {
        exit_codes::HEALTHY
    } else {
        exit_codes::WARNING
    })
}

fn print_human(parsed: &ParsedRewrite, output: &Output) {
    if !parsed.success {
        println!("{}", "No usable SQL found in response".red().bold());
        if !output.is_quiet() {
            println!();
            println!("ATTEMPTS:");
            for attempt in &parsed.attempts {
                println!(
                    "  {} {}",
                    attempt.method,
                    attempt.rejection.as_deref().unwrap_or("accepted")
                );
            }
            println!();
            println!("RESPONSE:");
            for line in parsed.raw_response_excerpt.lines() {
                println!("  {}", line);
            }
        }
        return;
    }

    if output.is_quiet() {
        println!("{}", parsed.sql);
        return;
    }

    println!("REWRITE");
    println!("{}", "=".repeat(60));
    println!();
    println!("Method: {}", parsed.parse_method);
    if parsed.is_valid_sql {
        println!("Parses: {}", "yes".green());
    } else {
        println!("Parses: {}", "no".yellow());
    }
    if parsed.unchanged {
        println!("{}", "Same statement as the original".yellow());
    }
    println!();

    println!("SQL:");
    for line in parsed.sql.lines() {
        println!("  {}", line);
    }
    println!();

    if !parsed.explanation.is_empty() {
        println!("EXPLANATION:");
        println!("  {}", parsed.explanation);
        println!();
    }
    if !parsed.recommendations.is_empty() {
        println!("RECOMMENDATIONS:");
        for line in parsed.recommendations.lines() {
            println!("  {}", line);
        }
        println!();
    }

    if output.verbose {
        println!("ATTEMPTS:");
        for attempt in &parsed.attempts {
            println!(
                "  {} {}",
                attempt.method,
                attempt.rejection.as_deref().unwrap_or("accepted")
            );
        }
    }
}
