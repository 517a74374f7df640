//! Signed bearer tokens: a short-lived access token carried in the
//! Authorization header and a long-lived refresh token carried in an
//! HttpOnly cookie. Both are HS256 compact tokens signed with the same
//! process key; the `type` claim discriminates.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const ACCESS_TTL_MINUTES: i64 = 15;
pub const REFRESH_TTL_DAYS: i64 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("wrong token type")]
    WrongType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let refresh_expires_at = now + Duration::days(REFRESH_TTL_DAYS);

        let access = self.sign(Claims {
            sub: user_id,
            exp: (now + Duration::minutes(ACCESS_TTL_MINUTES)).timestamp(),
            token_type: TokenType::Access,
        })?;
        let refresh = self.sign(Claims {
            sub: user_id,
            exp: refresh_expires_at.timestamp(),
            token_type: TokenType::Refresh,
        })?;

        Ok(TokenPair {
            access,
            refresh,
            refresh_expires_at,
        })
    }

    /// Verifies signature and expiry, then checks the `type` claim.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }

    fn sign(&self, claims: Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Invalid)
    }
}

/// SHA-256 hex digest of a token, the key of the revocation registry.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn issued_pair_round_trips() {
        let signer = signer();
        let pair = signer.issue_pair(42).unwrap();

        let access = signer.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(access.sub, 42);
        assert_eq!(access.token_type, TokenType::Access);

        let refresh = signer.verify(&pair.refresh, TokenType::Refresh).unwrap();
        assert_eq!(refresh.sub, 42);
        assert_eq!(refresh.exp, pair.refresh_expires_at.timestamp());
    }

    #[test]
    fn type_claim_discriminates() {
        let signer = signer();
        let pair = signer.issue_pair(7).unwrap();

        assert_eq!(
            signer.verify(&pair.access, TokenType::Refresh),
            Err(TokenError::WrongType)
        );
        assert_eq!(
            signer.verify(&pair.refresh, TokenType::Access),
            Err(TokenError::WrongType)
        );
    }

    #[test]
    fn tampered_token_is_rejected() {
        let signer = signer();
        let pair = signer.issue_pair(7).unwrap();

        let mut tampered = pair.access.clone();
        tampered.pop();
        tampered.push('A');
        assert_eq!(
            signer.verify(&tampered, TokenType::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn foreign_key_is_rejected() {
        let signer = signer();
        let other = TokenSigner::new(b"another-secret-another-secret-12");
        let pair = signer.issue_pair(7).unwrap();

        assert_eq!(
            other.verify(&pair.access, TokenType::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

        let secret = b"0123456789abcdef0123456789abcdef";
        let claims = Claims {
            sub: 7,
            exp: (Utc::now() - Duration::minutes(1)).timestamp(),
            token_type: TokenType::Refresh,
        };
        let stale = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let signer = TokenSigner::new(secret);
        assert_eq!(
            signer.verify(&stale, TokenType::Refresh),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn token_hash_is_stable_and_hex() {
        let a = hash_token("some.refresh.token");
        let b = hash_token("some.refresh.token");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, hash_token("some.other.token"));
    }
}
