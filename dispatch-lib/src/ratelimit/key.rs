use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::{ErrorKind, Result};

/// The destination key requests are rate limited by.
///
/// This is the lower-cased hostname (domain or IP address) of the request
/// URL. Ports and schemes are ignored, so `http://example.com:8080` and
/// `https://example.com` share a key.
///
/// # Examples
///
/// ```
/// use dispatch_lib::ratelimit::HostKey;
/// use url::Url;
///
/// let url = Url::parse("https://API.github.com/repos/user/repo").unwrap();
/// let host_key = HostKey::try_from(&url).unwrap();
/// assert_eq!(host_key.as_str(), "api.github.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostKey(String);

impl HostKey {
    /// Get the hostname as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the hostname as an owned String
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<&Url> for HostKey {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url.host_str().ok_or(ErrorKind::InvalidUrlHost)?;
        Ok(HostKey::from(host))
    }
}

impl TryFrom<&reqwest::Request> for HostKey {
    type Error = ErrorKind;

    fn try_from(request: &reqwest::Request) -> Result<Self> {
        Self::try_from(request.url())
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for HostKey {
    fn from(host: String) -> Self {
        HostKey(host.to_lowercase())
    }
}

impl From<&str> for HostKey {
    fn from(host: &str) -> Self {
        HostKey(host.to_lowercase())
    }
}
