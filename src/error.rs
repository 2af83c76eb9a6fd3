//! Error types for plan normalization and detector execution.

use thiserror::Error;

/// Errors raised while turning a raw engine plan into a normalized tree.
///
/// Both variants are fatal to normalization only. The analyzer reacts to
/// either one by falling back to text-only detection.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("unsupported engine '{engine}'{}", suggestion_suffix(.suggestion))]
    UnsupportedEngine {
        engine: String,
        suggestion: Option<&'static str>,
    },

    #[error("malformed {engine} plan: {reason}")]
    MalformedPlan { engine: &'static str, reason: String },
}

impl PlanError {
    pub(crate) fn malformed(engine: &'static str, reason: impl Into<String>) -> Self {
        PlanError::MalformedPlan {
            engine,
            reason: reason.into(),
        }
    }
}

fn suggestion_suffix(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

/// A plan-based detector failed on an unexpected sub-structure.
///
/// Contained by the analyzer: the detector contributes nothing and the
/// remaining detectors still run.
#[derive(Debug, Error)]
#[error("{detector} detector failed: {reason}")]
pub struct DetectorError {
    pub detector: &'static str,
    pub reason: String,
}

impl DetectorError {
    pub fn new(detector: &'static str, reason: impl Into<String>) -> Self {
        Self {
            detector,
            reason: reason.into(),
        }
    }
}
