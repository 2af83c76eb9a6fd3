//! Analyze command: run the detectors over a statement and, optionally,
//! its execution plan, table statistics and a captured batch.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use plancheck::{AnalysisRequest, Analyzer, Config, DetectionReport, RawPlan, Severity, TableStats};

use super::{is_stdin, read_input};
use crate::exit_codes;
use crate::output::{self, schema, CommandOutput, Output};

/// Characters of the query shown in the report header
const QUERY_DISPLAY_CHARS: usize = 97;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// SQL file to analyze (`-` for stdin)
    #[arg(long)]
    pub sql: PathBuf,

    /// Engine that produced the plan (postgresql, oracle, mysql)
    #[arg(long, requires = "plan")]
    pub engine: Option<String>,

    /// Execution plan file: JSON, or plain text for text-format plans
    #[arg(long, requires = "engine")]
    pub plan: Option<PathBuf>,

    /// Table statistics as a JSON object keyed by table name
    #[arg(long)]
    pub stats: Option<PathBuf>,

    /// Statements captured in the same request, for N+1 detection
    /// (JSON array of strings, or one statement per line)
    #[arg(long)]
    pub batch: Option<PathBuf>,
}

impl AnalyzeArgs {
    fn inputs(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.sql.as_path())
            .chain(self.plan.as_deref())
            .chain(self.stats.as_deref())
            .chain(self.batch.as_deref())
    }
}

pub fn analyze(args: &AnalyzeArgs, config: &Config, output: &Output) -> Result<i32> {
    if args.inputs().filter(|p| is_stdin(p)).count() > 1 {
        bail!("Only one input can be read from stdin");
    }

    let sql = read_input(&args.sql)?;
    let mut request = AnalysisRequest::new(sql.trim());

    if let (Some(engine), Some(plan_path)) = (&args.engine, &args.plan) {
        let contents = read_input(plan_path)?;
        output.verbose(&format!("Plan: {} ({})", plan_path.display(), engine));
        request = request.with_plan(engine.as_str(), RawPlan::from_contents(&contents));
    }

    if let Some(path) = &args.stats {
        let contents = read_input(path)?;
        let stats: TableStats = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid stats file {}", path.display()))?;
        output.verbose(&format!("Stats: {} tables", stats.len()));
        request = request.with_stats(stats);
    }

    if let Some(path) = &args.batch {
        let contents = read_input(path)?;
        let batch = parse_batch(&contents)
            .with_context(|| format!("Invalid batch file {}", path.display()))?;
        output.verbose(&format!("Batch: {} statements", batch.len()));
        request = request.with_batch(batch);
    }

    let report = Analyzer::new(config.clone()).analyze(&request);

    if output.is_json() {
        let severity = output::Severity::from_issue(report.max_severity());
        CommandOutput::new(schema::ANALYSIS, &report, severity)
            .with_warnings(report.warnings.clone())
            .print()?;
    } else {
        for warning in &report.warnings {
            output.warn(&format!("{} {}", "warning:".yellow(), warning));
        }
        print_human(&request, &report, output);
    }

    Ok(exit_codes::for_finding(
        report.max_severity() == Some(Severity::Critical),
        !report.is_clean(),
    ))
}

/// Split a batch file into statements. A JSON array of strings is taken
/// as-is; anything else is one statement per non-empty line, `--` comment
/// lines skipped.
fn parse_batch(contents: &str) -> Result<Vec<String>> {
    if contents.trim_start().starts_with('[') {
        return serde_json::from_str(contents).context("expected a JSON array of strings");
    }
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .map(str::to_string)
        .collect())
}

fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.as_str().to_uppercase();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.normal(),
    }
}

fn print_human(request: &AnalysisRequest, report: &DetectionReport, output: &Output) {
    if output.is_quiet() {
        println!("{}", report.summary);
        return;
    }

    println!("QUERY PLAN ANALYSIS");
    println!("{}", "=".repeat(60));
    println!();

    let one_line = request.sql.split_whitespace().collect::<Vec<_>>().join(" ");
    println!("Query: {}", plancheck::sql::excerpt(&one_line, QUERY_DISPLAY_CHARS));
    match &request.plan {
        Some(plan) => println!("Plan: {}", plan.engine),
        None => println!("Plan: none (text checks only)"),
    }
    println!();

    if report.is_clean() {
        println!("{}", report.summary.green());
        return;
    }

    println!("ISSUES:");
    for issue in &report.issues {
        println!(
            "  {} [{}] {}",
            issue.severity().emoji(),
            severity_label(issue.severity()),
            issue.title()
        );
        println!("    {}", issue.description());
        if !issue.affected_objects().is_empty() {
            println!("    Affected: {}", issue.affected_objects().join(", "));
        }
        if output.verbose {
            for (key, value) in issue.metrics() {
                println!("    {}: {}", key, value);
            }
        }
    }
    println!();

    // Detectors often recommend the same index or ANALYZE twice
    let mut seen = BTreeSet::new();
    let recommendations: Vec<&String> = report
        .issues
        .iter()
        .flat_map(|i| i.recommendations())
        .filter(|r| seen.insert(r.as_str()))
        .collect();
    if !recommendations.is_empty() {
        println!("RECOMMENDATIONS:");
        for (i, rec) in recommendations.iter().enumerate() {
            println!("  {}. {}", i + 1, rec);
        }
        println!();
    }

    println!("{}", report.summary.bold());
}
