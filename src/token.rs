use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// The header every token carries. Field order matters: the encoded header is compared byte for byte.
pub const HEADER_LITERAL: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Secret used to sign and verify tokens. Never printed.
#[derive(Clone)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

impl From<&[u8]> for SigningKey {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for SigningKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for SigningKey {
    fn from(secret: &str) -> Self {
        Self::new(secret.as_bytes())
    }
}

impl From<String> for SigningKey {
    fn from(secret: String) -> Self {
        Self::new(secret.into_bytes())
    }
}

/// Signed payload binding an identity to an expiry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claims {
    #[serde(rename = "email")]
    pub subject: String,
    /// Seconds since the unix epoch.
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl Claims {
    pub fn new(subject: impl Into<String>, expires_at: i64) -> Self {
        Self {
            subject: subject.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Produces and verifies `header.payload.signature` tokens signed with HMAC-SHA256.
///
/// All segments use the url-safe base64 alphabet without padding.
#[derive(Clone)]
pub struct TokenCodec {
    header: String,
    mac: HmacSha256,
}

impl TokenCodec {
    pub fn new(key: &SigningKey) -> Self {
        Self::with_header_literal(HEADER_LITERAL, key)
    }

    /// Build a codec pinned to a different header. Tokens are only accepted
    /// when their first segment encodes exactly this literal.
    pub fn with_header_literal(literal: &str, key: &SigningKey) -> Self {
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .expect("HMAC accepts keys of any length");

        Self {
            header: URL_SAFE_NO_PAD.encode(literal.as_bytes()),
            mac,
        }
    }

    /// The encoded header segment.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn serialize(&self, claims: &Claims) -> Result<String, AuthError> {
        let payload = serde_json::to_vec(claims)
            .map_err(|source| AuthError::ClaimEncoding { source })?;
        let payload = URL_SAFE_NO_PAD.encode(payload);

        let signature = URL_SAFE_NO_PAD.encode(self.sign(&self.header, &payload));

        Ok(format!("{}.{}.{}", self.header, payload, signature))
    }

    /// Verify a token and return its claims. Expiry is not checked here.
    pub fn deserialize(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::token_not_found("token is empty"));
        }

        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            tracing::debug!(parts = parts.len(), "rejecting malformed token");
            return Err(AuthError::invalid_token(format!(
                "expected 3 non-empty segments but found {} in token {}",
                parts.len(),
                token
            )));
        }
        let (header, payload, signature) = (parts[0], parts[1], parts[2]);

        if header != self.header {
            tracing::debug!("rejecting token with foreign header");
            return Err(AuthError::invalid_token(format!(
                "unexpected header segment {header}"
            )));
        }

        URL_SAFE_NO_PAD
            .decode(header)
            .map_err(|_| AuthError::invalid_token("header segment is not valid base64url"))?;
        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::invalid_token("payload segment is not valid base64url"))?;
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::invalid_token("signature segment is not valid base64url"))?;

        let expected = self.sign(header, payload);
        if !bool::from(expected.as_slice().ct_eq(&signature_bytes)) {
            tracing::debug!("rejecting token with mismatched signature");
            return Err(AuthError::invalid_token("signature mismatch"));
        }

        serde_json::from_slice(&payload_bytes).map_err(|source| AuthError::ClaimDecoding { source })
    }

    fn sign(&self, header: &str, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
