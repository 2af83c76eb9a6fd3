//! Issue aggregation: merge detector outputs into one ranked report.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::issue::{Issue, Severity};

/// Issue counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }

    fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

/// All issues found for one analysis call.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    /// Ranked critical first; detector order is kept within a severity
    pub issues: Vec<Issue>,
    pub total_issues: usize,
    pub severity_counts: SeverityCounts,
    pub summary: String,
    /// Diagnostics that did not stop the analysis (plan fallback, detector failure)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl DetectionReport {
    /// Highest severity present, if any issue was found.
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity()).max()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Flatten detector outputs, rank by severity, and summarize.
///
/// No deduplication across detectors: the same defect seen from two angles
/// carries different evidence and both issues are kept.
pub fn aggregate(results: Vec<Vec<Issue>>) -> DetectionReport {
    let mut issues: Vec<Issue> = results.into_iter().flatten().collect();
    // sort_by is stable
    issues.sort_by(|a, b| b.severity().cmp(&a.severity()));

    let mut counts = SeverityCounts::default();
    for issue in &issues {
        counts.record(issue.severity());
    }

    let summary = summarize(&issues, &counts);
    DetectionReport {
        total_issues: issues.len(),
        severity_counts: counts,
        summary,
        issues,
        warnings: Vec::new(),
    }
}

fn summarize(issues: &[Issue], counts: &SeverityCounts) -> String {
    if issues.is_empty() {
        return "No performance issues detected.".to_string();
    }
    let categories: BTreeSet<_> = issues.iter().map(|i| i.issue_type()).collect();
    format!(
        "Found {} issues: {} critical, {} high, {} medium, {} low across {} categories.",
        issues.len(),
        counts.critical,
        counts.high,
        counts.medium,
        counts.low,
        categories.len()
    )
}
