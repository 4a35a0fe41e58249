//! Caller identity - who is invoking a ledger operation.
//!
//! Authentication happens outside the ledger. Whatever verifies the caller hands
//! the engine an [`Identity`], and every loan or EMI operation receives it as an
//! explicit argument.

use crate::entities::user::Role;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Id of the caller's user row
    pub user_id: i64,
    /// Login email, the authenticated principal
    pub email: String,
    pub role: Role,
}

impl Identity {
    /// Builds an identity as handed over by the authentication layer.
    pub fn new(user_id: i64, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: email.into(),
            role,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with [`Error::Unauthorized`] unless the caller holds `role`.
    pub fn require_role(&self, role: Role, action: &str) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(Error::unauthorized(format!(
                "Only {role} callers can {action}"
            )))
        }
    }
}

/// Supplies the identity of the current caller.
pub trait IdentityProvider {
    /// Returns the caller, or [`Error::Unauthenticated`] when there is none.
    fn current_identity(&self) -> Result<Identity>;
}

impl IdentityProvider for Identity {
    fn current_identity(&self) -> Result<Identity> {
        Ok(self.clone())
    }
}

impl IdentityProvider for Option<Identity> {
    fn current_identity(&self) -> Result<Identity> {
        self.clone().ok_or(Error::Unauthenticated)
    }
}
