//! I/O-workload detector: nodes that miss the buffer cache.

use std::collections::HashSet;

use super::{DetectionContext, PlanDetector};
use crate::error::DetectorError;
use crate::issue::{Issue, IssueType, Severity};

const NAME: &str = "io";

pub struct IoWorkloadDetector;

impl PlanDetector for IoWorkloadDetector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> Result<Vec<Issue>, DetectorError> {
        let t = ctx.thresholds;
        let mut issues = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for node in ctx.root.iter() {
            let Some(buffers) = node.buffers else {
                continue;
            };
            let Some(ratio) = buffers.hit_ratio() else {
                continue;
            };
            if ratio >= t.min_cache_hit_ratio && buffers.reads <= t.high_read_blocks {
                continue;
            }

            let object = node.display_name().to_string();
            if !seen.insert(object.to_lowercase()) {
                continue;
            }

            let reason = if ratio < t.min_cache_hit_ratio {
                format!(
                    "only {:.1}% of its {} blocks came from cache",
                    ratio * 100.0,
                    buffers.hits + buffers.reads
                )
            } else {
                format!("it read {} blocks from disk", buffers.reads)
            };

            issues.push(
                Issue::new(
                    IssueType::HighIoWorkload,
                    Severity::High,
                    format!("High I/O on {}", object),
                    format!("{} is I/O bound: {}.", node.node_label, reason),
                    format!(
                        "Reduce the blocks read from {} with a more selective index or filter",
                        object
                    ),
                )
                .with_recommendation(
                    "If the working set should fit in memory, review shared_buffers sizing",
                )
                .with_affected(object)
                .with_metric("cache_hit_ratio", ratio)
                .with_metric("blocks_hit", buffers.hits)
                .with_metric("blocks_read", buffers.reads),
            );
        }

        tracing::debug!(detector = NAME, issues = issues.len(), "detector finished");
        Ok(issues)
    }
}
