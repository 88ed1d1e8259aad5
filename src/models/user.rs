//! Authenticated caller claims

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims issued by the host identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    /// Party representing the caller
    pub partner_id: i32,
    /// Librarians may edit the catalog and manage rentals
    #[serde(default)]
    pub librarian: bool,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.librarian {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian rights required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(librarian: bool) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: "reader".to_string(),
            partner_id: 7,
            librarian,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let token = claims(true).create_token("secret").unwrap();
        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.partner_id, 7);
        assert!(decoded.librarian);
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_require_librarian() {
        assert!(claims(true).require_librarian().is_ok());
        assert!(matches!(
            claims(false).require_librarian(),
            Err(AppError::Authorization(_))
        ));
    }
}
