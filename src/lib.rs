//! plancheck: query-plan diagnostics.
//!
//! Normalizes execution plans from several database engines into one node
//! model, runs independent detectors over the plan and the SQL text, and
//! ranks what they find. Separately, [`rewrite`] recovers a SQL statement
//! from a free-text model response and refuses to pass off error text as SQL.
//!
//! ```no_run
//! use plancheck::{AnalysisRequest, Analyzer, RawPlan};
//!
//! let plan = RawPlan::from_contents(r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users", "Plan Rows": 500000, "Filter": "(email = 'a'::text)"}}]"#);
//! let request = AnalysisRequest::new("SELECT * FROM users WHERE email = 'a'")
//!     .with_plan("postgresql", plan);
//! let report = Analyzer::default().analyze(&request);
//! println!("{}", report.summary);
//! ```
//!
//! The library does no I/O and holds no state between calls.

pub mod analyzer;
pub mod config;
pub mod detect;
pub mod error;
pub mod issue;
pub mod plan;
pub mod report;
pub mod rewrite;
pub mod sql;
pub mod stats;
mod suggest;

pub use analyzer::{AnalysisRequest, Analyzer, PlanInput};
pub use config::{Config, RewriteConfig, Thresholds};
pub use error::{DetectorError, PlanError};
pub use issue::{Issue, IssueType, MetricValue, Severity};
pub use plan::{normalize, Buffers, EngineId, NormalizedPlanNode, Operation, RawPlan};
pub use report::{aggregate, DetectionReport, SeverityCounts};
pub use rewrite::{interpret, ParseMethod, ParsedRewrite, RewriteInterpreter};
pub use stats::{TableStat, TableStats};
