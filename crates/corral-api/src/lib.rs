// corral-api: Async Rust client for the corral alert-correlation backend.

pub mod client;
pub mod error;
pub mod models;
pub mod push;
pub mod rules;
pub mod transport;

pub use client::ApiClient;
pub use error::Error;
