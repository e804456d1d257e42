pub mod handlers;
pub mod middleware;
pub mod range;
pub mod router;
pub mod stream;
