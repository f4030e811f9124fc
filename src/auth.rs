use actix_web::error::InternalError;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, HttpResponse, dev::Payload, web};
use anyhow::anyhow;
use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::routes::ErrorResponse;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
}

/// Signing material for bearer tokens, built once at startup from the
/// configured secret and shared through `web::Data`.
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_hours: i64,
}

impl AuthKeys {
    pub fn new(secret: &str, token_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            token_hours,
        }
    }

    /// Issues an HS256 token whose subject is the user id.
    pub fn issue(&self, user_id: i64) -> Result<String, jsonwebtoken::errors::Error> {
        let expiry = chrono::Utc::now() + chrono::Duration::hours(self.token_hours);
        let claims = Claims {
            sub: user_id,
            exp: expiry.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::default()).map(|data| data.claims)
    }
}

/// The authenticated caller, extracted from the `Authorization` header
/// before the handler runs. Carries only the identity; handlers that need
/// the full user row fetch it themselves.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = std::future::Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        std::future::ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, actix_web::Error> {
    let keys = req
        .app_data::<web::Data<AuthKeys>>()
        .ok_or_else(|| unauthenticated("Authorization is not configured"))?;

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthenticated("Authorization header missing"))?;
    let value = header
        .to_str()
        .map_err(|_| unauthenticated("Invalid token"))?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value);

    match keys.verify(token) {
        Ok(claims) => Ok(AuthUser { id: claims.sub }),
        Err(e) => {
            log::debug!("Rejected bearer token: {e}");
            Err(unauthenticated("Invalid token"))
        }
    }
}

fn unauthenticated(message: &'static str) -> actix_web::Error {
    let response = HttpResponse::Unauthorized().json(ErrorResponse {
        reason: "ERR_UNAUTHENTICATED",
        code: 4,
    });
    InternalError::from_response(message, response).into()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("password hashing failed: {e}"))
}

pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let keys = AuthKeys::new("test-secret", 1);
        let token = keys.issue(42).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let keys = AuthKeys::new("test-secret", 1);
        let other = AuthKeys::new("other-secret", 1);
        let token = keys.issue(42).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("hunter2!").unwrap();
        assert_ne!(hash, "hunter2!");
        assert!(verify_password(&hash, "hunter2!"));
        assert!(!verify_password(&hash, "hunter3!"));
        assert!(!verify_password("not-a-phc-string", "hunter2!"));
    }
}
