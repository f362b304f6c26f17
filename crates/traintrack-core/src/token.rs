use crate::error::{Result, TrainTrackError};
use crate::types::{Identity, Role};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Resolves an opaque session token to the caller's identity.
///
/// Implementations never fail the request: anything that cannot be verified
/// resolves to `None` and the caller is treated as anonymous.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<Identity>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    email: String,
    role: Role,
    iat: i64,
    exp: i64,
}

/// HS256 session tokens signed with a shared secret.
pub struct JwtAuthority {
    secret: Option<Vec<u8>>,
    ttl: chrono::Duration,
}

impl JwtAuthority {
    pub fn new(secret: Option<String>, ttl_minutes: u32) -> Self {
        Self {
            secret: secret.map(String::into_bytes),
            ttl: chrono::Duration::minutes(i64::from(ttl_minutes)),
        }
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Mint a session token for `identity`.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let secret = self.secret.as_deref().ok_or(TrainTrackError::SecretMissing)?;
        let now = Utc::now();
        let claims = Claims {
            sub: identity.id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .map_err(|e| TrainTrackError::Token(e.to_string()))
    }
}

impl CredentialVerifier for JwtAuthority {
    fn verify(&self, token: &str) -> Option<Identity> {
        let Some(secret) = self.secret.as_deref() else {
            tracing::error!("token signing secret is not configured; treating caller as anonymous");
            return None;
        };
        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret),
            &Validation::new(Algorithm::HS256),
        ) {
            Ok(data) => Some(Identity {
                id: data.claims.sub,
                username: data.claims.username,
                email: data.claims.email,
                role: data.claims.role,
            }),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada(role: Role) -> Identity {
        Identity {
            id: "7".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            role,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let auth = JwtAuthority::new(Some("s3cret".into()), 60);
        let token = auth.issue(&ada(Role::Premium)).unwrap();
        assert_eq!(auth.verify(&token), Some(ada(Role::Premium)));
    }

    #[test]
    fn malformed_token_is_anonymous() {
        let auth = JwtAuthority::new(Some("s3cret".into()), 60);
        assert_eq!(auth.verify("not-a-token"), None);
        assert_eq!(auth.verify(""), None);
    }

    #[test]
    fn token_from_other_secret_is_anonymous() {
        let issuer = JwtAuthority::new(Some("one".into()), 60);
        let verifier = JwtAuthority::new(Some("two".into()), 60);
        let token = issuer.issue(&ada(Role::Admin)).unwrap();
        assert_eq!(verifier.verify(&token), None);
    }

    #[test]
    fn expired_token_is_anonymous() {
        let auth = JwtAuthority::new(Some("s3cret".into()), 60);
        let past = Utc::now().timestamp() - 3600;
        let claims = Claims {
            sub: "7".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            role: Role::Admin,
            iat: past - 60,
            exp: past,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        assert_eq!(auth.verify(&token), None);
    }

    #[test]
    fn missing_secret_cannot_issue_and_verifies_nothing() {
        let auth = JwtAuthority::new(None, 60);
        assert!(!auth.has_secret());
        assert!(matches!(
            auth.issue(&ada(Role::Regular)),
            Err(TrainTrackError::SecretMissing)
        ));
        assert_eq!(auth.verify("a.b.c"), None);
    }
}
