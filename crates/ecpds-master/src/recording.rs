// SPDX-FileCopyrightText: 2026 ECPDS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions and recording helpers for the control plane.

use metrics::describe_counter;

/// Register descriptions of every control-plane metric.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("ecpds_tickets_issued_total", "Tickets issued by direction");
    describe_counter!("ecpds_tickets_checked_total", "Ticket checks by outcome");
    describe_counter!(
        "ecpds_cache_lookups_total",
        "Cache lookups by cache and hit or miss"
    );
    describe_counter!(
        "ecpds_state_transitions_total",
        "Committed administrative operations by entity"
    );
    describe_counter!("ecpds_cleanup_items_total", "Cleaned transfers by outcome");
    describe_counter!(
        "ecpds_hook_failures_total",
        "Post-commit hooks that failed"
    );
}

/// Record a committed state change.
pub fn record_transition(entity: &'static str, operation: &'static str) {
    metrics::counter!("ecpds_state_transitions_total", "entity" => entity, "operation" => operation)
        .increment(1);
}

pub fn record_hook_failure(hook: &'static str) {
    metrics::counter!("ecpds_hook_failures_total", "hook" => hook).increment(1);
}
