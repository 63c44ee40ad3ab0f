//! Bearer token validation for identity-provider sessions
//!
//! Tokens are signed HS256 with a secret shared with the identity
//! provider. Validation yields the opaque stable user id (`sub`) plus
//! display attributes; no user record lookup happens here.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::types::{AshramError, Result};

/// Claims carried in an identity-provider token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Opaque stable user identifier
    pub sub: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Whether this identity may use the admin surface
    #[serde(default)]
    pub admin: bool,
    pub iat: u64,
    pub exp: u64,
}

/// A validated caller identity
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
}

impl From<IdentityClaims> for Identity {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            user_id: claims.sub,
            display_name: claims.name,
            is_admin: claims.admin,
        }
    }
}

/// Validator for identity-provider bearer tokens
#[derive(Clone)]
pub struct TokenValidator {
    secret: String,
}

impl TokenValidator {
    pub fn new(secret: String) -> Result<Self> {
        if secret.is_empty() {
            return Err(AshramError::Config(
                "identity token secret must not be empty".into(),
            ));
        }
        Ok(Self { secret })
    }

    /// Validate a token and extract the caller identity
    pub fn validate(&self, token: &str) -> Result<Identity> {
        let data = decode::<IdentityClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AshramError::Unauthorized(format!("invalid token: {}", e)))?;

        if data.claims.sub.is_empty() {
            return Err(AshramError::Unauthorized("token has no subject".into()));
        }

        Ok(data.claims.into())
    }

    /// Validate and additionally require the admin claim
    pub fn validate_admin(&self, token: &str) -> Result<Identity> {
        let identity = self.validate(token)?;
        if !identity.is_admin {
            return Err(AshramError::Forbidden("admin access required".into()));
        }
        Ok(identity)
    }
}

/// Extract the bearer token from an Authorization header value
pub fn extract_token_from_header(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "unit-test-identity-secret-0123456789abcdef";

    fn make_token(sub: &str, admin: bool, exp_offset: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = IdentityClaims {
            sub: sub.to_string(),
            name: Some("Asha".to_string()),
            email: None,
            admin,
            iat: now,
            exp: (now as i64 + exp_offset) as u64,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_identity() {
        let validator = TokenValidator::new(SECRET.to_string()).unwrap();
        let identity = validator.validate(&make_token("uid_1", false, 3600)).unwrap();
        assert_eq!(identity.user_id, "uid_1");
        assert_eq!(identity.display_name.as_deref(), Some("Asha"));
        assert!(!identity.is_admin);
    }

    #[test]
    fn expired_token_rejected() {
        let validator = TokenValidator::new(SECRET.to_string()).unwrap();
        assert!(validator.validate(&make_token("uid_1", false, -3600)).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let validator = TokenValidator::new("another-secret-another-secret-12".to_string()).unwrap();
        assert!(validator.validate(&make_token("uid_1", false, 3600)).is_err());
    }

    #[test]
    fn admin_claim_enforced() {
        let validator = TokenValidator::new(SECRET.to_string()).unwrap();
        assert!(validator
            .validate_admin(&make_token("uid_1", false, 3600))
            .is_err());
        assert!(validator
            .validate_admin(&make_token("uid_1", true, 3600))
            .is_ok());
    }

    #[test]
    fn bearer_prefix_extraction() {
        assert_eq!(extract_token_from_header("Bearer abc"), Some("abc"));
        assert_eq!(extract_token_from_header("bearer abc"), Some("abc"));
        assert_eq!(extract_token_from_header("Basic abc"), None);
        assert_eq!(extract_token_from_header("Bearer "), None);
    }
}
