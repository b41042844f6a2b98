//! Shared helpers for tabsync benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;

/// Generates a random record payload with the given field count.
#[must_use]
pub fn random_payload(fields: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut parts = vec!["X".to_string()];
    for _ in 0..fields {
        parts.push(format!("{:.3}", rng.gen_range(-1000.0..1000.0)));
    }
    parts.join(",")
}

/// Generates `count` distinct application ids.
#[must_use]
pub fn application_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("bench-{i:06}")).collect()
}
