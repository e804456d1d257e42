//! Signed-URL media streaming backend.
//!
//! The pipeline for a stream request: issue an HMAC-signed expiring URL,
//! verify it on fetch, admit through a per-(media, client) sliding-window
//! rate limiter, serve the requested byte range from local storage, and
//! record the view for cached analytics.

pub mod core;
pub mod delivery;
pub mod observability;
pub mod storage;
pub mod views;
