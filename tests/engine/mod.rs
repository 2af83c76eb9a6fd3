//! Library-level tests: the analyzer and rewrite interpreter driven through
//! the public API with plans from every supported engine.

mod analyze;
mod normalize;
mod rewrite;
