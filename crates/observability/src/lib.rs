//! Process-wide tracing setup shared by binaries and tests.

/// Initialize JSON logging filtered by `RUST_LOG` (default `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init("info");
}

/// Human-readable output captured by the test harness. Idempotent.
pub fn init_for_tests() {
    tracing::init_test("debug");
}

/// Subscriber construction.
pub mod tracing;
