//! Object key generation.
//!
//! Keys have the form `<orientation>/<token>.<extension>` where the token is
//! [`TOKEN_BYTES`] bytes from a CSPRNG encoded as unpadded base64url.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use std::fmt;
use tubely_models::OrientationClass;

/// Random bytes per key token.
pub const TOKEN_BYTES: usize = 32;

/// Extension of processed video objects.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Key of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Generate a fresh key for a processed video of the given orientation.
    pub fn generate(orientation: OrientationClass) -> Self {
        Self::generate_with_extension(orientation, VIDEO_EXTENSION)
    }

    pub fn generate_with_extension(orientation: OrientationClass, extension: &str) -> Self {
        Self(format!(
            "{}/{}.{}",
            orientation.prefix(),
            random_token(),
            extension
        ))
    }

    /// The orientation namespace (`landscape`, `portrait` or `other`).
    pub fn namespace(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
