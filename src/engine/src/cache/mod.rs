//! Caching primitives shared by the calculator, resolver and engine
//!
//! # Features
//!
//! - [`ExpiringCache`]: single value with a time-to-live
//! - [`MostRecentCache`]: single value guarded by an invalidation generation
//! - [`ComputeOnMissMap`]: concurrent map that computes missing values
//! - [`BufferedRequest`]: debounced work with a shared completion handle

pub mod buffered;
pub mod compute_map;
pub mod expiring;
pub mod most_recent;

pub use buffered::{BufferedRequest, RequestHandle};
pub use compute_map::ComputeOnMissMap;
pub use expiring::ExpiringCache;
pub use most_recent::MostRecentCache;
