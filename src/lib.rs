//! Rate-limited collection of EPA Victoria air-quality readings.
//!
//! A run lists the monitoring sites, fetches every site's parameter
//! time series through a shared token budget with retry on throttling, and
//! flattens the nested payloads into uniform [`models::Reading`] rows.

pub mod catalog;
pub mod collector;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod formatters;
pub mod models;
pub mod normalizer;
pub mod rate_limiter;
pub mod service;
pub mod transport;
