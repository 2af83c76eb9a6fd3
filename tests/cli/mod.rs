//! Binary tests: argument handling, JSON envelope, exit codes.

mod analyze;
mod engines;
mod rewrite;
