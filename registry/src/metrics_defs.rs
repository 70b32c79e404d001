//! Metrics definitions for the endpoint registry.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REGISTRY_UPDATE: MetricDef = MetricDef {
    name: "registry.update",
    metric_type: MetricType::Counter,
    description: "Endpoint list replacements, labelled applied, rejected or failed",
};

pub const REGISTRY_LOAD_FALLBACK: MetricDef = MetricDef {
    name: "registry.load.fallback",
    metric_type: MetricType::Counter,
    description: "Loads that fell back to the built-in endpoint list",
};

pub const REGISTRY_ENDPOINTS: MetricDef = MetricDef {
    name: "registry.endpoints",
    metric_type: MetricType::Gauge,
    description: "Number of endpoints currently held by the registry",
};

pub const ALL_METRICS: &[MetricDef] = &[REGISTRY_UPDATE, REGISTRY_LOAD_FALLBACK, REGISTRY_ENDPOINTS];
