//! Signed URLs for the image transform proxy.
//!
//! The proxy verifies `{signature}/{ops_path}/{file}` independently, so the
//! signature must match its HMAC exactly: HMAC-SHA1 over the path, standard
//! base64 with `+` and `/` swapped for `-` and `_`, trailing `=` kept.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;
use thiserror::Error;

use crate::config::MediaConfig;

type HmacSha1 = Hmac<Sha1>;

/// Errors raised while building a media URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    /// The signing secret is empty.
    #[error("media signing secret is empty")]
    EmptySecret,

    /// No file was requested.
    #[error("file param is required")]
    EmptyFile,
}

/// Sign `path` and return `"{signature}/{path}"`.
///
/// # Errors
///
/// Returns `MediaError::EmptySecret` if `secret` is empty.
pub fn sign_path(path: &str, secret: &str) -> Result<String, MediaError> {
    if secret.is_empty() {
        return Err(MediaError::EmptySecret);
    }

    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| MediaError::EmptySecret)?;
    mac.update(path.as_bytes());
    let digest = STANDARD
        .encode(mac.finalize().into_bytes())
        .replace('+', "-")
        .replace('/', "_");

    Ok(format!("{digest}/{path}"))
}

/// Builds signed proxy URLs for stored media files.
#[derive(Clone)]
pub struct MediaSigner {
    secret: SecretString,
    base_url: String,
    ops_path: String,
}

impl std::fmt::Debug for MediaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSigner")
            .field("secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("ops_path", &self.ops_path)
            .finish()
    }
}

impl MediaSigner {
    /// Create a signer from configuration.
    #[must_use]
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ops_path: config.ops_path.trim_matches('/').to_string(),
        }
    }

    /// Proxy URL serving `file` with the configured transform.
    ///
    /// # Errors
    ///
    /// Returns an error if `file` is empty or the secret is empty.
    pub fn signed_url(&self, file: &str) -> Result<String, MediaError> {
        let file = file.trim_start_matches('/');
        if file.is_empty() {
            return Err(MediaError::EmptyFile);
        }

        let path = if self.ops_path.is_empty() {
            file.to_string()
        } else {
            format!("{}/{file}", self.ops_path)
        };
        let signed = sign_path(&path, self.secret.expose_secret())?;
        Ok(format!("{}/{signed}", self.base_url))
    }
}
