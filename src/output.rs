//! Output layer for the plancheck CLI.
//!
//! Centralizes stdout/stderr separation and human vs JSON output modes.
//! - stdout: data (the "answer" - results, JSON)
//! - stderr: diagnostics (progress, debug messages, human-mode errors)

use serde::Serialize;

/// Output mode for the CLI
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Output helper that centralizes all CLI output
#[derive(Debug, Clone)]
pub struct Output {
    pub mode: OutputMode,
    pub quiet: bool,
    pub verbose: bool,
}

impl Output {
    pub fn new(json: bool, quiet: bool, verbose: bool) -> Self {
        Self {
            mode: if json {
                OutputMode::Json
            } else {
                OutputMode::Human
            },
            quiet,
            verbose,
        }
    }

    /// Write a verbose diagnostic message to stderr
    /// Only shown with --verbose in human mode
    pub fn verbose(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet || !self.verbose {
            return;
        }
        eprintln!("{}", message);
    }

    /// Write a warning to stderr
    /// Shown in human mode unless --quiet, suppressed in JSON mode
    pub fn warn(&self, message: &str) {
        if self.mode == OutputMode::Json || self.quiet {
            return;
        }
        eprintln!("{}", message);
    }

    /// Check if we're in JSON mode
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Check if we're in quiet mode
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

// =============================================================================
// JSON Response Types
// =============================================================================

/// Schema version for JSON outputs.
/// Follows semver: breaking=major, additive=minor, bugfix=patch.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Tool version from Cargo.toml.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema IDs for command outputs.
pub mod schema {
    pub const ANALYSIS: &str = "plancheck.analysis";
    pub const REWRITE: &str = "plancheck.rewrite";
    pub const ENGINES: &str = "plancheck.engines";
    pub const ERROR: &str = "plancheck.error";
}

/// JSON error response using envelope structure (written to stdout with non-zero exit).
/// Matches [`CommandOutput`] so consumers get a consistent envelope.
#[derive(Debug, Serialize)]
pub struct JsonError {
    pub ok: bool,
    pub schema_id: &'static str,
    pub schema_version: &'static str,
    pub tool_version: &'static str,
    pub generated_at: String,
    pub severity: &'static str,
    pub errors: Vec<JsonErrorInfo>,
    /// Always null for error responses
    pub data: Option<()>,
}

#[derive(Debug, Serialize)]
pub struct JsonErrorInfo {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JsonError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            schema_id: schema::ERROR,
            schema_version: SCHEMA_VERSION,
            tool_version: TOOL_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            severity: "error",
            errors: vec![JsonErrorInfo {
                code,
                message: message.into(),
                details: None,
            }],
            data: None,
        }
    }

    pub fn with_details(
        code: &'static str,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        let mut err = Self::new(code, message);
        if let Some(info) = err.errors.first_mut() {
            info.details = Some(details.into());
        }
        err
    }

    /// Print this error as JSON to stdout
    pub fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
}

/// Overall outcome level for command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Nothing found
    Healthy,
    /// Non-critical findings, or a rewrite that could not be recovered
    Warning,
    /// Critical findings
    Critical,
}

impl Severity {
    /// Envelope severity for a detection report's worst issue.
    pub fn from_issue(worst: Option<plancheck::Severity>) -> Self {
        match worst {
            None => Severity::Healthy,
            Some(plancheck::Severity::Critical) => Severity::Critical,
            Some(_) => Severity::Warning,
        }
    }
}

/// Wrapper for command JSON output.
/// Includes schema metadata for stable automation and versioning.
#[derive(Debug, Serialize)]
pub struct CommandOutput<T: Serialize> {
    pub ok: bool,
    pub schema_id: &'static str,
    pub schema_version: &'static str,
    /// Tool version (plancheck version that generated this output)
    pub tool_version: &'static str,
    /// ISO 8601 timestamp when this output was generated
    pub generated_at: String,
    /// Overall severity: healthy, warning, or critical
    pub severity: Severity,
    /// Non-fatal diagnostics (plan fallback, failed detector)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Command-specific data payload
    pub data: T,
}

impl<T: Serialize> CommandOutput<T> {
    pub fn new(schema_id: &'static str, data: T, severity: Severity) -> Self {
        Self {
            ok: true,
            schema_id,
            schema_version: SCHEMA_VERSION,
            tool_version: TOOL_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            severity,
            warnings: Vec::new(),
            data,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Print this output as JSON to stdout.
    pub fn print(&self) -> Result<(), serde_json::Error> {
        let json = serde_json::to_string_pretty(self)?;
        println!("{}", json);
        Ok(())
    }
}

/// JSON response for --help flag
#[derive(Debug, Serialize)]
pub struct HelpResponse {
    pub ok: bool,
    pub help: String,
}

impl HelpResponse {
    pub fn new(help_text: String) -> Self {
        Self {
            ok: true,
            help: help_text,
        }
    }

    pub fn print(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            println!("{}", json);
        }
    }
}

/// JSON response for --version flag
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub ok: bool,
    pub version: String,
}

impl VersionResponse {
    pub fn new(version: String) -> Self {
        Self { ok: true, version }
    }

    pub fn print(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            println!("{}", json);
        }
    }
}
