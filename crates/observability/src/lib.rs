//! Tracing and logging setup shared by binaries and tests.

/// Initialize process-wide tracing (JSON, filtered by `RUST_LOG`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
