//! Compilation options.
//!
//! Options are built in code (`Default` plus builder methods) and can be
//! overlaid from the environment:
//!
//! | Variable | Effect |
//! |---|---|
//! | `KEEL_THREADS` | worker threads for parallel lowering (positive integer) |
//! | `KEEL_SEQUENTIAL` | `1`/`true`/`yes` lowers units on the calling thread |
//! | `KEEL_ERROR_LIMIT` | maximum errors kept (`0` = unlimited) |

use keel_diagnostic::DiagnosticConfig;
use keel_lower::{PlatformPrimitive, PrimitiveTable};

pub const THREADS_VAR: &str = "KEEL_THREADS";
pub const SEQUENTIAL_VAR: &str = "KEEL_SEQUENTIAL";
pub const ERROR_LIMIT_VAR: &str = "KEEL_ERROR_LIMIT";

#[derive(Debug, thiserror::Error, Clone, Eq, PartialEq)]
pub enum OptionsError {
    #[error("{var}: expected a non-negative integer, found `{value}`")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var}: expected a boolean, found `{value}`")]
    InvalidBool { var: &'static str, value: String },
    #[error("thread count must be at least 1")]
    ZeroThreads,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompilationOptions {
    /// Platform primitives the target provides.
    pub primitives: PrimitiveTable,
    /// Limits applied to the merged diagnostics and to each unit's queue.
    pub diagnostics: DiagnosticConfig,
    /// Lower independent units on a worker pool.
    pub parallel: bool,
    /// Pool size; `None` lets rayon decide.
    pub threads: Option<usize>,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        CompilationOptions {
            primitives: PrimitiveTable::all(),
            diagnostics: DiagnosticConfig::default(),
            parallel: true,
            threads: None,
        }
    }
}

impl CompilationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, OptionsError> {
        Self::default().overlay(|var| std::env::var(var).ok())
    }

    /// Overlay values found through `lookup` (variable name to value).
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OptionsError> {
        if let Some(value) = lookup(THREADS_VAR) {
            let threads = parse_number(THREADS_VAR, &value)?;
            if threads == 0 {
                return Err(OptionsError::ZeroThreads);
            }
            self.threads = Some(threads);
        }
        if let Some(value) = lookup(SEQUENTIAL_VAR) {
            if parse_bool(SEQUENTIAL_VAR, &value)? {
                self.parallel = false;
            }
        }
        if let Some(value) = lookup(ERROR_LIMIT_VAR) {
            self.diagnostics.error_limit = parse_number(ERROR_LIMIT_VAR, &value)?;
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_primitives(mut self, primitives: PrimitiveTable) -> Self {
        self.primitives = primitives;
        self
    }

    #[must_use]
    pub fn without_primitive(mut self, primitive: PlatformPrimitive) -> Self {
        self.primitives.mark_missing(primitive);
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.threads == Some(0) {
            return Err(OptionsError::ZeroThreads);
        }
        Ok(())
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<usize, OptionsError> {
    value
        .trim()
        .parse()
        .map_err(|_| OptionsError::InvalidNumber {
            var,
            value: value.to_owned(),
        })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, OptionsError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OptionsError::InvalidBool {
            var,
            value: value.to_owned(),
        }),
    }
}
