pub mod client;
pub mod queries;
pub mod types;

pub use client::ApiClient;
pub use queries::{QueryDefaults, StatsQueries};
