use serde::{Serialize, Serializer};
use std::hash::Hash;
use thiserror::Error;

/// Possible errors when interacting with `dispatch_lib`
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Network error while executing a request
    #[error("Network error while executing request")]
    NetworkRequest(#[source] reqwest::Error),

    /// A request could not be built, e.g. because of a malformed URL
    #[error("Error building request")]
    BuildRequest(#[source] reqwest::Error),

    /// The request client cannot be built
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),

    /// The given header could not be parsed.
    /// A possible error when converting a `HeaderValue` from a string or byte
    /// slice.
    #[error("Header could not be parsed.")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    /// The given string can not be parsed into a valid URL
    #[error("Cannot parse string `{0}` as URL: {1}")]
    ParseUrl(String, #[source] url::ParseError),

    /// An URL with an invalid host was found
    #[error("URL is missing a host")]
    InvalidUrlHost,

    /// The transport panicked while executing a request
    #[error("Transport panicked while executing request: {0}")]
    TransportPanic(String),

    /// A request was submitted after the pipeline had been closed
    #[error("Cannot submit request: the pipeline has already been closed")]
    PipelineClosed,
}

impl ErrorKind {
    /// Return the underlying `reqwest::Error`, if any
    #[must_use]
    pub const fn reqwest_error(&self) -> Option<&reqwest::Error> {
        match self {
            Self::NetworkRequest(e) | Self::BuildRequest(e) | Self::BuildRequestClient(e) => {
                Some(e)
            }
            _ => None,
        }
    }

    /// Returns `true` if the request timed out in the transport
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.reqwest_error().is_some_and(reqwest::Error::is_timeout)
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NetworkRequest(e1), Self::NetworkRequest(e2))
            | (Self::BuildRequest(e1), Self::BuildRequest(e2))
            | (Self::BuildRequestClient(e1), Self::BuildRequestClient(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (Self::ParseUrl(s1, e1), Self::ParseUrl(s2, e2)) => s1 == s2 && e1 == e2,
            (Self::TransportPanic(m1), Self::TransportPanic(m2)) => m1 == m2,
            (Self::InvalidHeader(_), Self::InvalidHeader(_))
            | (Self::InvalidUrlHost, Self::InvalidUrlHost)
            | (Self::PipelineClosed, Self::PipelineClosed) => true,
            _ => false,
        }
    }
}

impl Eq for ErrorKind {}

impl Hash for ErrorKind {
    fn hash<H>(&self, state: &mut H)
    where
        H: std::hash::Hasher,
    {
        match self {
            Self::NetworkRequest(e) | Self::BuildRequest(e) | Self::BuildRequestClient(e) => {
                e.to_string().hash(state);
            }
            Self::ParseUrl(s, e) => (s, e.to_string()).hash(state),
            Self::InvalidHeader(e) => e.to_string().hash(state),
            Self::TransportPanic(message) => message.hash(state),
            Self::InvalidUrlHost | Self::PipelineClosed => {
                std::mem::discriminant(self).hash(state);
            }
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorKind;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ErrorKind::PipelineClosed.to_string(),
            "Cannot submit request: the pipeline has already been closed"
        );
        let err = ErrorKind::ParseUrl(
            "not a url".to_string(),
            url::ParseError::RelativeUrlWithoutBase,
        );
        assert_eq!(
            err.to_string(),
            "Cannot parse string `not a url` as URL: relative URL without a base"
        );
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(ErrorKind::InvalidUrlHost, ErrorKind::InvalidUrlHost);
        assert_ne!(ErrorKind::InvalidUrlHost, ErrorKind::PipelineClosed);
        assert!(ErrorKind::PipelineClosed.reqwest_error().is_none());
        assert!(!ErrorKind::PipelineClosed.is_timeout());
    }
}
