pub mod access;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config;

pub use access::Role;

/// Minimum accepted password length for new credentials
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: Role, department_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            email,
            role: role.as_str().to_string(),
            department_id,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
    #[error("JWT secret not configured")]
    MissingSecret,
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    encode_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn verify_jwt(token: &str) -> Result<Claims, JwtError> {
    decode_with_secret(token, &config::config().security.jwt_secret)
}

fn encode_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

fn decode_with_secret(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims)
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

/// Password policy check applied before hashing a new credential
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            role: "manager".to_string(),
            department_id: Some(Uuid::new_v4()),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            iat: Utc::now().timestamp(),
        }
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        let claims = claims();
        let token = encode_with_secret(&claims, "unit-test-secret").unwrap();
        let decoded = decode_with_secret(&token, "unit-test-secret").unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.email, claims.email);
        assert_eq!(decoded.role, claims.role);
        assert_eq!(decoded.department_id, claims.department_id);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = encode_with_secret(&claims(), "secret-a").unwrap();
        assert!(matches!(
            decode_with_secret(&token, "secret-b"),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut claims = claims();
        claims.exp = (Utc::now() - Duration::hours(2)).timestamp();
        let token = encode_with_secret(&claims, "unit-test-secret").unwrap();
        assert!(decode_with_secret(&token, "unit-test-secret").is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            encode_with_secret(&claims(), ""),
            Err(JwtError::MissingSecret)
        ));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn short_passwords_fail_policy() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough password").is_ok());
    }
}
