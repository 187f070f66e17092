/// Shared modules used across the application
pub mod config;
pub mod format;
pub mod logging;

// Re-export commonly used items
pub use config::Config;
pub use format::{format_cost, format_duration, format_tokens};
