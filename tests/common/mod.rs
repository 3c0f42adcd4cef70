//! Common test utilities shared across integration tests.

use std::time::{Duration, Instant};

/// Poll a condition every 10ms until it holds or the timeout elapses.
///
/// More reliable than fixed sleeps since execution timing can vary.
///
/// # Panics
///
/// Panics with the given message when the timeout is reached first.
pub fn wait_until(timeout: Duration, message: &str, mut condition: impl FnMut() -> bool) {
    let start = Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            panic!("timeout waiting for: {}", message);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
