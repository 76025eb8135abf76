pub mod config;
pub mod error;
pub mod identity;
pub mod routing;
pub mod scoring;
pub mod server;
pub mod cli;

pub use config::FolioConfig;
pub use error::{AppError, AppResult};
