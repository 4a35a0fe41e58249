/// Database configuration and connection management
pub mod database;

/// User seed configuration loading from config.toml
pub mod users;
