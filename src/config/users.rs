//! User seed configuration loading from config.toml
//!
//! Users are owned by the external authentication system, but a standalone ledger
//! still needs borrowers and administrators to exist before loans can reference
//! them. The users listed in config.toml are inserted on startup when missing.

use crate::entities::user::Role;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct Config {
    /// List of users to seed
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// Configuration for a single user
#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    /// Login email, used to match an existing row
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// `"USER"` or `"ADMIN"`
    pub role: Role,
}

/// Loads user seed configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing or a role is unknown
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads user seed configuration from the default location (./config.toml)
pub fn load_default_config() -> Result<Config> {
    load_config("config.toml")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_user_config() {
        let toml_str = r#"
            [[users]]
            email = "admin@example.com"
            first_name = "Ada"
            role = "ADMIN"

            [[users]]
            email = "borrower@example.com"
            role = "USER"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.users.len(), 2);
        assert_eq!(config.users[0].email, "admin@example.com");
        assert_eq!(config.users[0].first_name.as_deref(), Some("Ada"));
        assert_eq!(config.users[0].role, Role::Admin);

        assert_eq!(config.users[1].role, Role::User);
        assert!(config.users[1].last_name.is_none());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let toml_str = r#"
            [[users]]
            email = "root@example.com"
            role = "SUPERUSER"
        "#;

        let result: std::result::Result<Config, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_config("does/not/exist.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_empty_config_has_no_users() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.users.is_empty());
    }
}
