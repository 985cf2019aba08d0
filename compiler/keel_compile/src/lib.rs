//! Keel Compile - the compilation driver.
//!
//! Owns the pieces that outlive a single unit (type table, recognition
//! cache, helper table, options) and lowers batches of independent units
//! with them:
//!
//! ```text
//! let mut compilation = Compilation::new(table, CompilationOptions::from_env()?)?;
//! let output = compilation.lower_units(&units)?;
//! for helper in &output.helpers { /* emit */ }
//! ```

mod compilation;
mod options;

pub use compilation::{CancellationFlag, Compilation, CompilationOutput, CompileError};
pub use options::{
    CompilationOptions, OptionsError, ERROR_LIMIT_VAR, SEQUENTIAL_VAR, THREADS_VAR,
};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=keel_lower=debug` or `RUST_LOG=keel_lower=trace`; set
/// `KEEL_LOG_TREE` to print spans as an indented tree.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let tree = std::env::var_os("KEEL_LOG_TREE").is_some();
            tracing_subscriber::registry()
                .with((!tree).then(|| fmt::layer().with_target(true).with_level(true)))
                .with(tree.then(|| {
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_bracketed_fields(true)
                }))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
