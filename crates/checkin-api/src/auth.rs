use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Operator credential attached to every backend request.
///
/// The backend issues a bearer token at login; the console only carries it.
/// Both endpoints reject a missing or expired token with 401/403, which the
/// client surfaces as [`Error::Unauthorized`].
#[derive(Debug, Clone)]
pub struct BearerToken {
    token: SecretString,
}

impl BearerToken {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }

    /// Build the default header map carrying `Authorization: Bearer …`.
    ///
    /// The header value is flagged sensitive so it never shows up in
    /// `reqwest` debug output.
    pub fn headers(&self) -> Result<HeaderMap, Error> {
        let raw = self.token.expose_secret().trim();
        if raw.is_empty() {
            return Err(Error::InvalidToken {
                message: "bearer token is empty".into(),
            });
        }

        let mut value =
            HeaderValue::from_str(&format!("Bearer {raw}")).map_err(|e| Error::InvalidToken {
                message: format!("invalid bearer header value: {e}"),
            })?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

impl From<SecretString> for BearerToken {
    fn from(token: SecretString) -> Self {
        Self::new(token)
    }
}
