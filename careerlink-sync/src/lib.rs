pub mod comments;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod identity;
pub mod reconciler;
pub mod search;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;
