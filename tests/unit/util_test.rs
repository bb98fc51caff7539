//! Tests for utility functions

use chrono::Duration;
use prometheus_scan_queue::util::{elapsed_ms, init_tracing, now};

#[test]
fn test_elapsed_ms_clamps_negative() {
    let start = now();
    assert_eq!(elapsed_ms(start, start + Duration::seconds(2)), 2_000);
    assert_eq!(elapsed_ms(start + Duration::seconds(2), start), 0);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
