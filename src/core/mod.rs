pub mod config;
pub mod error;
pub mod ratelimit;
pub mod redact;
pub mod shutdown;
pub mod signer;
pub mod types;
