//! Signed, expiring JWTs for access, refresh and password-reset flows.

use std::{fs, path::Path};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
pub use jsonwebtoken::Algorithm;
use uuid::Uuid;

use super::{
    errors::{AuthError, AuthResult},
    models::{RefreshToken, TokenClaims, TokenKind, UserId},
};

/// Token lifetimes
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub reset: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(15),
            refresh: Duration::days(7),
            reset: Duration::minutes(30),
        }
    }
}

/// Issues and verifies tokens with an asymmetric key pair.
///
/// Only the public key is needed to verify, so the private key can stay on
/// the issuing service.
#[derive(Clone)]
pub struct TokenIssuer {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetimes: TokenLifetimes,
}

impl TokenIssuer {
    /// Create an issuer from PEM-encoded keys
    ///
    /// # Arguments
    ///
    /// * `algorithm` - Asymmetric JWT algorithm (RS*, PS*, ES*, EdDSA)
    /// * `private_pem` - Signing key
    /// * `public_pem` - Verification key
    /// * `lifetimes` - Token lifetimes
    ///
    /// # Errors
    ///
    /// * `AuthError::Configuration` - Symmetric algorithm or unreadable key
    pub fn from_pem(
        algorithm: Algorithm,
        private_pem: &[u8],
        public_pem: &[u8],
        lifetimes: TokenLifetimes,
    ) -> AuthResult<Self> {
        let (encoding_key, decoding_key) = load_keys(algorithm, private_pem, public_pem)?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;

        Ok(Self {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
            lifetimes,
        })
    }

    /// Create an issuer from PEM key files
    pub fn from_files(
        algorithm: Algorithm,
        private_key_path: impl AsRef<Path>,
        public_key_path: impl AsRef<Path>,
        lifetimes: TokenLifetimes,
    ) -> AuthResult<Self> {
        let private_pem = read_key(private_key_path.as_ref())?;
        let public_pem = read_key(public_key_path.as_ref())?;
        Self::from_pem(algorithm, &private_pem, &public_pem, lifetimes)
    }

    /// Configured lifetimes
    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Create an access token without a password-reset watermark
    pub fn create_access_token(&self, user_id: UserId, email: &str) -> AuthResult<String> {
        self.create_access_token_with_watermark(user_id, email, None)
    }

    /// Create an access token carrying the user's `last_password_reset` as `pwd_reset_at`
    pub fn create_access_token_with_watermark(
        &self,
        user_id: UserId,
        email: &str,
        pwd_reset_at: Option<DateTime<Utc>>,
    ) -> AuthResult<String> {
        let mut claims = session_claims(TokenKind::Access, user_id, email, self.lifetimes.access);
        claims.pwd_reset_at = pwd_reset_at.map(|at| at.timestamp());
        self.sign(&claims)
    }

    /// Create a refresh token; `ttl_secs` is `exp - iat` and is used as the store TTL
    pub fn create_refresh_token(&self, user_id: UserId, email: &str) -> AuthResult<RefreshToken> {
        let claims = session_claims(TokenKind::Refresh, user_id, email, self.lifetimes.refresh);
        let token = self.sign(&claims)?;
        let ttl_secs = u64::try_from(claims.exp - claims.iat)
            .map_err(|_| AuthError::Configuration("refresh token lifetime is negative".into()))?;

        Ok(RefreshToken {
            token,
            jti: claims.jti.unwrap_or_default(),
            ttl_secs,
        })
    }

    /// Create a password-reset token for an email address
    pub fn create_reset_token(&self, email: &str) -> AuthResult<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            typ: TokenKind::Reset,
            sub: Some(email.to_string()),
            iat: now.timestamp(),
            exp: (now + self.lifetimes.reset).timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
            user_id: None,
            pwd_reset_at: None,
        };
        self.sign(&claims)
    }

    /// Sign an arbitrary claim set
    pub fn sign(&self, claims: &TokenClaims) -> AuthResult<String> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))
    }

    /// Verify a token and require it to be of the given kind
    ///
    /// # Errors
    ///
    /// * `AuthError::ExpiredToken` - Past `exp`
    /// * `AuthError::InvalidToken` - Verification failed or wrong kind
    pub fn decode_kind(&self, token: &str, kind: TokenKind) -> AuthResult<TokenClaims> {
        let claims = self.decode(token)?;
        if claims.typ != kind {
            log::debug!("Token rejected: expected {kind:?}, got {:?}", claims.typ);
            return Err(AuthError::InvalidToken);
        }
        Ok(claims)
    }

    /// Verify signature and expiry, returning the claims
    ///
    /// # Errors
    ///
    /// * `AuthError::ExpiredToken` - Past `exp`
    /// * `AuthError::InvalidToken` - Any other verification failure
    pub fn decode(&self, token: &str) -> AuthResult<TokenClaims> {
        match decode::<TokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(AuthError::ExpiredToken),
                _ => {
                    log::debug!("Token rejected: {e}");
                    Err(AuthError::InvalidToken)
                }
            },
        }
    }
}

fn session_claims(
    kind: TokenKind,
    user_id: UserId,
    email: &str,
    lifetime: Duration,
) -> TokenClaims {
    let now = Utc::now();
    TokenClaims {
        typ: kind,
        sub: Some(email.to_string()),
        iat: now.timestamp(),
        exp: (now + lifetime).timestamp(),
        jti: Some(Uuid::new_v4().to_string()),
        user_id: Some(user_id),
        pwd_reset_at: None,
    }
}

fn read_key(path: &Path) -> AuthResult<Vec<u8>> {
    fs::read(path)
        .map_err(|e| AuthError::Configuration(format!("cannot read key {}: {e}", path.display())))
}

fn load_keys(
    algorithm: Algorithm,
    private_pem: &[u8],
    public_pem: &[u8],
) -> AuthResult<(EncodingKey, DecodingKey)> {
    let bad_key = |e: jsonwebtoken::errors::Error| AuthError::Configuration(format!("{e}"));

    match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => Ok((
            EncodingKey::from_rsa_pem(private_pem).map_err(bad_key)?,
            DecodingKey::from_rsa_pem(public_pem).map_err(bad_key)?,
        )),
        Algorithm::ES256 | Algorithm::ES384 => Ok((
            EncodingKey::from_ec_pem(private_pem).map_err(bad_key)?,
            DecodingKey::from_ec_pem(public_pem).map_err(bad_key)?,
        )),
        Algorithm::EdDSA => Ok((
            EncodingKey::from_ed_pem(private_pem).map_err(bad_key)?,
            DecodingKey::from_ed_pem(public_pem).map_err(bad_key)?,
        )),
        other => Err(AuthError::Configuration(format!(
            "{other:?} is symmetric; an asymmetric algorithm is required"
        ))),
    }
}
