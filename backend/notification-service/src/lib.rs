pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use config::DispatcherConfig;
pub use error::{AppError, AppResult};
pub use services::*;
