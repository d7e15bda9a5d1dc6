pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod store;
pub mod websocket;

pub use config::ChatConfig;
pub use error::{AppError, AppResult};
