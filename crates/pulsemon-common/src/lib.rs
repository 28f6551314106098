//! Shared wire model and helpers for the pulsemon agent and server:
//! the metric envelope codec, gzip helpers, HMAC-SHA256 request signing,
//! retry-with-backoff, and the update-URL builder.

pub mod compress;
pub mod retry;
pub mod sign;
pub mod types;
pub mod url;
