//! Metric names and recording helpers.
//!
//! # Metrics
//! - `proxysql_admin_reconcile_total` (counter): requests by class and outcome
//! - `proxysql_admin_propagation_total` (counter): statements by settings group
//! - `proxysql_admin_apply_duration_seconds` (histogram): transactional apply time

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};

use crate::propagation::ConfigSettings;
use crate::schema::ObjectClass;

pub const RECONCILE_TOTAL: &str = "proxysql_admin_reconcile_total";
pub const PROPAGATION_TOTAL: &str = "proxysql_admin_propagation_total";
pub const APPLY_DURATION_SECONDS: &str = "proxysql_admin_apply_duration_seconds";

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn recording on or off for the whole process.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Count one reconcile request. `outcome` is a plan kind or an error kind.
pub fn record_reconcile(class: ObjectClass, outcome: &'static str) {
    if !enabled() {
        return;
    }
    counter!(RECONCILE_TOTAL, "class" => class.as_str(), "outcome" => outcome).increment(1);
}

pub fn record_propagation(settings: ConfigSettings) {
    if !enabled() {
        return;
    }
    counter!(PROPAGATION_TOTAL, "settings" => settings.as_str()).increment(1);
}

pub fn record_apply_duration(class: ObjectClass, elapsed: Duration) {
    if !enabled() {
        return;
    }
    histogram!(APPLY_DURATION_SECONDS, "class" => class.as_str()).record(elapsed.as_secs_f64());
}
