//! Signed bearer tokens for the configuration routes.
//!
//! Tokens are HS256 JWTs carrying the principal's username, an issuer and
//! an expiry timestamp. They are stateless: nothing is stored server-side.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

/// Longest token lifetime accepted from settings or the admin CLI (ten years).
pub const MAX_TTL_HOURS: i64 = 10 * 366 * 24;

/// Converts a lifetime in hours, rejecting values outside `1..=MAX_TTL_HOURS`.
pub fn ttl_hours(hours: i64) -> Result<Duration, TokenError> {
    if !(1..=MAX_TTL_HOURS).contains(&hours) {
        return Err(TokenError::TtlOutOfRange(hours));
    }
    Duration::try_hours(hours).ok_or(TokenError::TtlOutOfRange(hours))
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

impl Header {
    fn hs256() -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    /// Expiry as a Unix timestamp in seconds.
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Reasons a token is rejected.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token was issued by another service")]
    WrongIssuer,

    #[error("token lifetime of {0} hours is out of range")]
    TtlOutOfRange(i64),

    #[error("token secret must not be empty")]
    EmptySecret,

    #[error("token secret is not a usable HMAC key")]
    InvalidKey,

    #[error("could not encode token: {0}")]
    Encode(String),
}

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    ttl: Duration,
    issuer: String,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        ttl: Duration,
        issuer: impl Into<String>,
    ) -> Result<Self, TokenError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self {
            secret,
            ttl,
            issuer: issuer.into(),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `username` that expires after the default lifetime.
    pub fn issue(&self, username: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(username, self.ttl)
    }

    pub fn issue_with_ttl(&self, username: &str, ttl: Duration) -> Result<String, TokenError> {
        let expires = Utc::now()
            .checked_add_signed(ttl)
            .ok_or(TokenError::TtlOutOfRange(ttl.num_hours()))?;
        let claims = Claims {
            username: username.to_string(),
            exp: expires.timestamp(),
            iss: self.issuer.clone(),
        };

        let header = encode_part(&Header::hs256())?;
        let payload = encode_part(&claims)?;
        let signing_input = format!("{}.{}", header, payload);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&signing_input)?.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Verifies signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let (header, payload) = signing_input
            .split_once('.')
            .ok_or(TokenError::Malformed)?;
        if payload.contains('.') {
            return Err(TokenError::Malformed);
        }

        let header: Header = decode_part(header)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        self.mac(signing_input)?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_part(payload)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if claims.iss != self.issuer {
            return Err(TokenError::WrongIssuer);
        }

        Ok(claims)
    }

    fn mac(&self, input: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .map_err(|_| TokenError::InvalidKey)?;
        mac.update(input.as_bytes());
        Ok(mac)
    }
}

fn encode_part<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::Encode(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_part<T: DeserializeOwned>(part: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

/// Generates a random signing secret.
///
/// Returns 32 random bytes encoded as base64url (no padding).
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
