//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request metrics and survey gauges.
//! - [`rate_limit`]: fixed-window rate limiting per client address.

pub mod metrics;
pub mod rate_limit;
