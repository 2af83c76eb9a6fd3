//! Analysis entry point: pattern scan, plan normalization, plan detectors,
//! aggregation.

use chrono::{DateTime, Utc};

use crate::config::{Config, Thresholds};
use crate::detect::{self, orm, pattern, DetectionContext};
use crate::plan::{self, RawPlan};
use crate::report::{self, DetectionReport};
use crate::stats::TableStats;

/// An execution plan tagged with the engine that produced it.
#[derive(Debug, Clone)]
pub struct PlanInput {
    pub engine: String,
    pub raw: RawPlan,
}

/// Inputs for one analysis call.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub sql: String,
    pub plan: Option<PlanInput>,
    pub stats: Option<TableStats>,
    /// Statements captured alongside `sql`, for N+1 detection
    pub batch: Vec<String>,
    /// Reference time for statistics age; defaults to now
    pub as_of: Option<DateTime<Utc>>,
}

impl AnalysisRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, engine: impl Into<String>, raw: RawPlan) -> Self {
        self.plan = Some(PlanInput {
            engine: engine.into(),
            raw,
        });
        self
    }

    pub fn with_stats(mut self, stats: TableStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_batch(mut self, batch: Vec<String>) -> Self {
        self.batch = batch;
        self
    }

    pub fn as_of(mut self, at: DateTime<Utc>) -> Self {
        self.as_of = Some(at);
        self
    }
}

/// Stateless analyzer; one instance can serve any number of calls.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: Config,
}

impl Analyzer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.config.thresholds
    }

    /// Run every applicable detector and merge the results.
    ///
    /// Never fails. A plan that cannot be normalized drops the analysis to
    /// text-only detection; a detector that fails contributes nothing. Both
    /// are recorded in the report's warnings. Without a plan, a supplied
    /// batch is still checked for N+1 loops.
    pub fn analyze(&self, request: &AnalysisRequest) -> DetectionReport {
        let mut results = vec![pattern::scan(&request.sql)];
        let mut warnings = Vec::new();

        let root = match &request.plan {
            None => None,
            Some(input) => match plan::normalize(&input.engine, &input.raw) {
                Ok(root) => Some(root),
                Err(e) => {
                    tracing::warn!(error = %e, "plan ignored, falling back to text-only detection");
                    warnings.push(format!("plan ignored: {}; ran text-only detection", e));
                    None
                }
            },
        };

        if let Some(root) = &root {
            let ctx = DetectionContext {
                root,
                sql: &request.sql,
                stats: request.stats.as_ref(),
                batch: &request.batch,
                thresholds: &self.config.thresholds,
                as_of: request.as_of.unwrap_or_else(Utc::now),
            };

            for detector in detect::plan_detectors() {
                match detector.detect(&ctx) {
                    Ok(issues) => results.push(issues),
                    Err(e) => {
                        tracing::warn!(detector = detector.name(), error = %e, "detector failed");
                        warnings.push(e.to_string());
                    }
                }
            }
        } else if !request.batch.is_empty() {
            // The N+1 check reads only the batch
            tracing::debug!(statements = request.batch.len(), "no plan, checking batch only");
            results.push(orm::n_plus_one_issues(
                &request.batch,
                self.config.thresholds.n_plus_one_min_batch,
            ));
        }

        let mut report = report::aggregate(results);
        report.warnings = warnings;
        tracing::debug!(
            issues = report.total_issues,
            plan = root.is_some(),
            "analysis complete"
        );
        report
    }
}
