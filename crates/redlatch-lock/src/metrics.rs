// Metrics module for lock observability
// Provides counters and histograms through the `metrics` facade; installing an
// exporter is left to the application

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register metric descriptions. Call once at application startup.
pub fn describe_metrics() {
    describe_counter!(
        "redlatch_lock_acquired_total",
        "Total number of successful lock acquisitions"
    );
    describe_counter!(
        "redlatch_lock_contended_total",
        "Total number of acquisition attempts that found the key held"
    );
    describe_counter!(
        "redlatch_lock_failed_total",
        "Total number of lock calls that ended in an error"
    );
    describe_counter!(
        "redlatch_lock_released_total",
        "Total number of successful lock releases"
    );
    describe_counter!(
        "redlatch_watchdog_renewals_total",
        "Total number of watchdog lease renewals"
    );
    describe_counter!(
        "redlatch_watchdog_renewal_failures_total",
        "Total number of watchdog renewals that failed"
    );
    describe_histogram!(
        "redlatch_lock_wait_seconds",
        "Time spent in lock() until it returned"
    );
    describe_counter!(
        "redlatch_redlock_quorum_failures_total",
        "Total number of quorum lock attempts that missed the majority"
    );

    tracing::info!("Lock metrics initialized");
}

pub(crate) fn record_acquired(wait: Duration) {
    counter!("redlatch_lock_acquired_total").increment(1);
    histogram!("redlatch_lock_wait_seconds").record(wait.as_secs_f64());
}

pub(crate) fn record_contended() {
    counter!("redlatch_lock_contended_total").increment(1);
}

pub(crate) fn record_failed(reason: &'static str) {
    counter!("redlatch_lock_failed_total", "reason" => reason).increment(1);
}

pub(crate) fn record_released() {
    counter!("redlatch_lock_released_total").increment(1);
}

pub(crate) fn record_renewal(success: bool) {
    if success {
        counter!("redlatch_watchdog_renewals_total").increment(1);
    } else {
        counter!("redlatch_watchdog_renewal_failures_total").increment(1);
    }
}

pub(crate) fn record_quorum_failure(acquired: usize, total: usize) {
    counter!(
        "redlatch_redlock_quorum_failures_total",
        "acquired" => acquired.to_string(),
        "total" => total.to_string()
    )
    .increment(1);
}
