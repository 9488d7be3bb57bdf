use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("token has no subject")]
    MissingSubject,
}

/// Signing and verification keys, built once from [`JwtConfig`] at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm: cfg.algorithm,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    /// Issues an access token for `username` with the configured lifetime.
    pub fn issue(&self, username: &str) -> anyhow::Result<String> {
        self.issue_with_ttl(username, self.ttl)
    }

    pub fn issue_with_ttl(&self, username: &str, ttl: Duration) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + ttl;
        let claims = Claims {
            sub: username.to_string(),
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(username = %username, "jwt signed");
        Ok(token)
    }

    /// Checks signature, expiry, issuer and audience, and returns the username.
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.sub.is_empty() {
            return Err(TokenError::MissingSubject);
        }
        debug!(username = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 30,
        })
    }

    #[test]
    fn issue_and_validate() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.issue("alice").expect("issue");
        assert_eq!(keys.validate(&token).expect("validate"), "alice");
    }

    #[test]
    fn rejects_expired_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys
            .issue_with_ttl("alice", Duration::seconds(-30))
            .expect("issue");
        let err = keys.validate(&token).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(_)));
    }

    #[test]
    fn rejects_tampered_signature() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = keys.issue("alice").expect("issue");
        let (head, sig) = token.rsplit_once('.').unwrap();
        let flipped = if sig.starts_with('A') { 'B' } else { 'A' };
        let tampered = format!("{head}.{flipped}{}", &sig[1..]);
        assert!(keys.validate(&tampered).is_err());
    }

    #[test]
    fn rejects_other_secret() {
        let token = make_keys("one", "iss", "aud").issue("alice").unwrap();
        assert!(make_keys("two", "iss", "aud").validate(&token).is_err());
    }

    #[test]
    fn rejects_wrong_issuer_or_audience() {
        let token = make_keys("same", "good-iss", "good-aud").issue("alice").unwrap();
        assert!(make_keys("same", "bad-iss", "good-aud").validate(&token).is_err());
        assert!(make_keys("same", "good-iss", "bad-aud").validate(&token).is_err());
    }

    #[test]
    fn rejects_malformed_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        assert!(keys.validate("not-a-jwt").is_err());
        assert!(keys.validate("").is_err());
    }

    #[test]
    fn rejects_token_without_subject() {
        #[derive(Serialize)]
        struct NoSub {
            exp: usize,
            iss: String,
            aud: String,
        }
        let keys = make_keys("dev-secret", "iss", "aud");
        let exp = (OffsetDateTime::now_utc() + Duration::minutes(5)).unix_timestamp() as usize;
        let token = encode(
            &Header::default(),
            &NoSub {
                exp,
                iss: "iss".into(),
                aud: "aud".into(),
            },
            &keys.encoding,
        )
        .unwrap();
        assert!(keys.validate(&token).is_err());

        let empty = keys.issue("").unwrap();
        assert!(matches!(
            keys.validate(&empty).unwrap_err(),
            TokenError::MissingSubject
        ));
    }
}
