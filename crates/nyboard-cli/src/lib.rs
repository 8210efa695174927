pub mod client;
pub mod commands;
pub mod error;
pub mod local;
pub mod render;

pub use client::ApiClient;
pub use commands::App;
pub use error::ClientError;
