/// Token service: signed access and refresh tokens
///
/// Both token kinds are HS256 JWTs over the same claim set. Access tokens are
/// checked by signature and expiry only; refresh tokens are additionally
/// matched against the value stored on the account by the session manager.
use crate::{
    config::AuthConfig,
    error::{KbError, KbResult},
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    /// Unique per issuance so two tokens minted in the same second differ
    jti: String,
}

/// A freshly signed token and the expiry embedded in it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a token was rejected. Only ever logged; callers see `InvalidToken`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenFault {
    Malformed,
    BadSignature,
    Expired,
}

impl From<&jsonwebtoken::errors::Error> for TokenFault {
    fn from(err: &jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenFault::Expired,
            ErrorKind::InvalidSignature => TokenFault::BadSignature,
            _ => TokenFault::Malformed,
        }
    }
}

/// Same boundary as `validate_exp` with zero leeway: a token is still good during its `exp` second.
fn lapsed(exp: i64, now: i64) -> bool {
    exp < now
}

/// Issues and verifies tokens with a process-wide secret
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            Duration::seconds(config.access_token_ttl_secs),
            Duration::seconds(config.refresh_token_ttl_secs),
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Short-lived token proving recent authentication
    pub fn issue_access_token(&self, username: &str) -> KbResult<IssuedToken> {
        self.issue(username, self.access_ttl)
    }

    /// Long-lived token that must also match the stored value to be honoured
    pub fn issue_refresh_token(&self, username: &str) -> KbResult<IssuedToken> {
        self.issue(username, self.refresh_ttl)
    }

    fn issue(&self, username: &str, ttl: Duration) -> KbResult<IssuedToken> {
        let now = Utc::now().timestamp();
        let exp = now + ttl.num_seconds();

        let claims = Claims {
            sub: username.to_string(),
            iat: now,
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let value = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| KbError::Jwt(format!("Failed to sign token: {}", e)))?;

        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| KbError::Internal(format!("Token expiry out of range: {}", exp)))?;

        Ok(IssuedToken { value, expires_at })
    }

    fn decode_claims(&self, token: &str, check_expiry: bool) -> Result<Claims, TokenFault> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenFault::from(&e))
    }

    /// Verify signature and structure, returning the subject. Expiry is not checked.
    pub fn parse_username(&self, token: &str) -> KbResult<String> {
        self.decode_claims(token, false)
            .map(|claims| claims.sub)
            .map_err(|fault| {
                tracing::warn!(?fault, "Rejected token");
                KbError::InvalidToken
            })
    }

    /// Whether the embedded expiry has passed. Unreadable tokens count as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        match self.decode_claims(token, false) {
            Ok(claims) => lapsed(claims.exp, Utc::now().timestamp()),
            Err(_) => true,
        }
    }

    pub fn is_structurally_valid(&self, token: &str) -> bool {
        self.decode_claims(token, false).is_ok()
    }

    /// Full access-token check: signature, structure and expiry.
    ///
    /// Every failure is reported as `InvalidToken`.
    pub fn verify_access_token(&self, token: &str) -> KbResult<String> {
        self.decode_claims(token, true)
            .map(|claims| claims.sub)
            .map_err(|fault| {
                if fault == TokenFault::Expired {
                    tracing::debug!("Access token expired");
                } else {
                    tracing::warn!(?fault, "Rejected access token");
                }
                KbError::InvalidToken
            })
    }
}
