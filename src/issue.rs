//! Issue vocabulary shared by every detector.
//!
//! An [`Issue`] is one performance defect with its evidence (affected objects
//! and metrics) and at least one remediation. Severity is fixed when the
//! detector builds the issue; nothing downstream can change it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Issue severity levels, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "ℹ",
            Severity::Medium => "⚠",
            Severity::High => "⚠",
            Severity::Critical => "✗",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Types of defects the engine detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    MissingIndex,
    InefficientIndex,
    PoorJoinStrategy,
    FullTableScan,
    SuboptimalPattern,
    StaleStatistics,
    WrongCardinality,
    OrmGenerated,
    HighIoWorkload,
    InefficientReporting,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::MissingIndex => "missing_index",
            IssueType::InefficientIndex => "inefficient_index",
            IssueType::PoorJoinStrategy => "poor_join_strategy",
            IssueType::FullTableScan => "full_table_scan",
            IssueType::SuboptimalPattern => "suboptimal_pattern",
            IssueType::StaleStatistics => "stale_statistics",
            IssueType::WrongCardinality => "wrong_cardinality",
            IssueType::OrmGenerated => "orm_generated",
            IssueType::HighIoWorkload => "high_io_workload",
            IssueType::InefficientReporting => "inefficient_reporting",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric value attached to an issue as evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{:.4}", v),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

/// A detected performance defect.
///
/// Fields are read-only outside this module. Build one with [`Issue::new`],
/// which requires the first recommendation, then chain the `with_*` methods.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    issue_type: IssueType,
    severity: Severity,
    title: String,
    description: String,
    affected_objects: Vec<String>,
    recommendations: Vec<String>,
    metrics: BTreeMap<String, MetricValue>,
}

impl Issue {
    pub fn new(
        issue_type: IssueType,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            severity,
            title: title.into(),
            description: description.into(),
            affected_objects: Vec::new(),
            recommendations: vec![recommendation.into()],
            metrics: BTreeMap::new(),
        }
    }

    /// Append an affected object, skipping duplicates.
    pub fn with_affected(mut self, object: impl Into<String>) -> Self {
        let object = object.into();
        if !object.is_empty() && !self.affected_objects.contains(&object) {
            self.affected_objects.push(object);
        }
        self
    }

    pub fn with_affected_all<I, S>(mut self, objects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for object in objects {
            self = self.with_affected(object);
        }
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }

    pub fn issue_type(&self) -> IssueType {
        self.issue_type
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn affected_objects(&self) -> &[String] {
        &self.affected_objects
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    pub fn metric(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(key)
    }
}
