//! Exit code policy for plancheck.
//!
//! ## Findings (0-2)
//!
//! - `0` = Clean (no issues found, or a rewrite was recovered)
//! - `1` = Warning (non-critical issues found, or no valid rewrite)
//! - `2` = Critical (critical issues found)
//!
//! ## Operational Failures (10+)
//!
//! Operational failures use codes >= 10 to distinguish from findings:
//! - `10` = General operational failure (unreadable input, bad arguments)
//! - `12` = Configuration error
//!
//! This separation allows automation to distinguish between:
//! - "The query has problems" (findings, 1-2)
//! - "We couldn't check the query" (operational failure, 10+)

/// Exit code: clean (no issues)
pub const HEALTHY: i32 = 0;

/// Exit code: warning findings (non-critical issues)
pub const WARNING: i32 = 1;

/// Exit code: critical findings
pub const CRITICAL: i32 = 2;

/// Exit code: general operational failure
pub const OPERATIONAL_FAILURE: i32 = 10;

/// Exit code: configuration error
pub const CONFIG_ERROR: i32 = 12;

/// Exit code for a set of findings.
pub fn for_finding(has_critical: bool, has_warning: bool) -> i32 {
    if has_critical {
        CRITICAL
    } else if has_warning {
        WARNING
    } else {
        HEALTHY
    }
}
