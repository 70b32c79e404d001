//! Metrics definitions for the failover router.

use shared::metrics_defs::{MetricDef, MetricType};

pub const DISPATCH_ATTEMPTS: MetricDef = MetricDef {
    name: "router.dispatch.attempts",
    metric_type: MetricType::Counter,
    description: "Endpoint attempts made across all dispatches",
};

pub const DISPATCH_FAILURES: MetricDef = MetricDef {
    name: "router.dispatch.failures",
    metric_type: MetricType::Counter,
    description: "Failed endpoint attempts. Tagged with kind.",
};

pub const DISPATCH_EXHAUSTED: MetricDef = MetricDef {
    name: "router.dispatch.exhausted",
    metric_type: MetricType::Counter,
    description: "Dispatches that failed on every endpoint",
};

pub const DISPATCH_DURATION: MetricDef = MetricDef {
    name: "router.dispatch.duration",
    metric_type: MetricType::Histogram,
    description: "Dispatch duration in seconds across all attempts. Tagged with outcome.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    DISPATCH_ATTEMPTS,
    DISPATCH_FAILURES,
    DISPATCH_EXHAUSTED,
    DISPATCH_DURATION,
];
