//! Application-facing client

mod context;
mod kook_client;

pub use context::ClientContext;
pub use kook_client::KookClient;
