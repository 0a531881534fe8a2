//! # Route Modules
//!
//! Each module exposes a `router()` over [`AppState`](crate::state::AppState);
//! [`crate::app`] merges them.

pub mod analytics;
pub mod associations;
pub mod coupons;
pub mod options;
pub mod responses;
pub mod survey;
