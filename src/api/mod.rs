pub mod auth;
pub mod client;
pub mod files;

pub use client::ApiClient;
