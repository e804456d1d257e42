pub mod analytics;
pub mod tracker;
