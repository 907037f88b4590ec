//! Credential Engine
//!
//! Stateless capability tokens derived from a single master secret by
//! keyed hashing. A token is
//!
//! ```text
//! pgcrud_{data}.{hex_mac}
//! ```
//!
//! where `data` is either a bare label (the legacy full-access form) or
//! `label:base64url(claims)` for scoped tokens, and the MAC is
//! HMAC-SHA-256 over `data` keyed by the master secret. Because the MAC
//! covers the optional claims segment, trimming the claims from a scoped
//! token or grafting claims onto a legacy token invalidates it; there is
//! no way to change the permission set without re-signing.
//!
//! Verification is constant time and collapses every failure mode into a
//! single opaque error. There is no token registry and no per-token
//! revocation; rotating the master secret invalidates every token at once.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::Sha256;

use pgcrud_core::{ClaimSet, GatewayConfig, TokenClaims, TokenError};

/// Fixed prefix of every token.
pub const TOKEN_PREFIX: &str = "pgcrud_";

static LABEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z0-9_-]+$").expect("label pattern compiles"));

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// CREDENTIAL ENGINE
// ============================================================================

/// Token derivation and verification against the master secret.
#[derive(Clone)]
pub struct CredentialEngine {
    secret: Option<Vec<u8>>,
    enabled: bool,
}

impl std::fmt::Debug for CredentialEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEngine")
            .field("secret", &self.secret.as_ref().map(|s| format!("[REDACTED, {} bytes]", s.len())))
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl CredentialEngine {
    /// Build the engine from gateway configuration.
    ///
    /// Configuration validation has already guaranteed that auth-enabled
    /// implies a secret is present.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            secret: config.master_secret.as_ref().map(|s| s.as_bytes().to_vec()),
            enabled: config.auth_enabled,
        }
    }

    /// Build an engine directly from a secret (tests, key tooling).
    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: Some(secret.as_bytes().to_vec()),
            enabled: true,
        }
    }

    /// Whether credentials are required on non-public paths.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Mint a token.
    ///
    /// `claims: None` produces the legacy full-access form. Scoped tokens
    /// must carry at least one namespace entry.
    ///
    /// # Errors
    /// - no master secret configured
    /// - label not matching `[A-Za-z0-9_-]+`
    /// - empty claim set
    pub fn mint(&self, label: &str, claims: Option<&ClaimSet>) -> Result<String, TokenError> {
        let secret = self.secret.as_deref().ok_or(TokenError::SecretUnavailable)?;
        if !LABEL_PATTERN.is_match(label) {
            return Err(TokenError::InvalidLabel);
        }

        let data = match claims {
            None => label.to_string(),
            Some(set) => {
                if set.is_empty() {
                    return Err(TokenError::EmptyClaims);
                }
                // BTreeMap serialization fixes the canonical byte order
                // (lexicographic keys) the MAC is computed over.
                let encoded = serde_json::to_vec(set).map_err(|_| TokenError::EmptyClaims)?;
                format!("{label}:{}", URL_SAFE_NO_PAD.encode(encoded))
            }
        };

        let mac = mac_hex(secret, &data);
        Ok(format!("{TOKEN_PREFIX}{data}.{mac}"))
    }

    /// Verify a token and derive its claims.
    ///
    /// Recomputes the MAC over the embedded `data` bytes and compares in
    /// constant time, then decodes the claims segment if one is present.
    /// The verifier accepts whatever claim byte order the generator
    /// emitted; the MAC covers the bytes themselves.
    ///
    /// # Errors
    /// [`TokenError::VerificationFailed`] on any failure, with no further
    /// detail.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or(TokenError::VerificationFailed)?;

        let body = token
            .strip_prefix(TOKEN_PREFIX)
            .ok_or(TokenError::VerificationFailed)?;
        let (data, mac) = body.rsplit_once('.').ok_or(TokenError::VerificationFailed)?;

        let expected = hex::decode(mac).map_err(|_| TokenError::VerificationFailed)?;
        let mut hmac = HmacSha256::new_from_slice(secret)
            .map_err(|_| TokenError::VerificationFailed)?;
        hmac.update(data.as_bytes());
        hmac.verify_slice(&expected)
            .map_err(|_| TokenError::VerificationFailed)?;

        match data.split_once(':') {
            None => {
                if !LABEL_PATTERN.is_match(data) {
                    return Err(TokenError::VerificationFailed);
                }
                Ok(TokenClaims::FullAccess)
            }
            Some((label, claims_b64)) => {
                if !LABEL_PATTERN.is_match(label) {
                    return Err(TokenError::VerificationFailed);
                }
                let bytes = URL_SAFE_NO_PAD
                    .decode(claims_b64)
                    .map_err(|_| TokenError::VerificationFailed)?;
                let set: ClaimSet =
                    serde_json::from_slice(&bytes).map_err(|_| TokenError::VerificationFailed)?;
                if set.is_empty() {
                    return Err(TokenError::VerificationFailed);
                }
                Ok(TokenClaims::Scoped(set))
            }
        }
    }
}

fn mac_hex(secret: &[u8], data: &str) -> String {
    let mut hmac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    hmac.update(data.as_bytes());
    hex::encode(hmac.finalize().into_bytes())
}

// ============================================================================
// PUBLIC PATHS
// ============================================================================

/// Routes that bypass the credential check regardless of configuration.
pub fn is_public_path(path: &str) -> bool {
    path == "/api/_health" || path == "/api/docs" || path.starts_with("/api/docs/")
}

// ============================================================================
// TESTS
// ============================================================================
