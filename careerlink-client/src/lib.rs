pub mod api;
pub mod client;
mod record;

pub use api::{ApiError, SocialApi};
pub use client::ApiClient;
