//! ---
//! cip_section: "05-catalog"
//! cip_subsection: "module"
//! cip_type: "source"
//! cip_scope: "code"
//! cip_description: "Operator login for the remote lab front end."
//! cip_version: "v0.1.0"
//! cip_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AuthError;

/// Login form contents. No credential store is consulted: any non-blank
/// username and password pair is accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Signed-in operator attached to sessions and history records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub username: String,
    pub signed_in_at: DateTime<Utc>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn authenticate(&self) -> Result<Operator, AuthError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(AuthError::MissingUsername);
        }
        if self.password.trim().is_empty() {
            return Err(AuthError::MissingPassword);
        }
        info!(user = username, "operator signed in");
        Ok(Operator {
            username: username.to_owned(),
            signed_in_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_any_non_blank_pair() {
        let operator = Credentials::new("  ana ", "x").authenticate();
        assert_eq!(operator.map(|op| op.username), Ok("ana".to_owned()));
    }

    #[test]
    fn rejects_blank_fields() {
        assert_eq!(
            Credentials::new("   ", "secret").authenticate().unwrap_err(),
            AuthError::MissingUsername
        );
        assert_eq!(
            Credentials::new("ana", " \t").authenticate().unwrap_err(),
            AuthError::MissingPassword
        );
    }
}
