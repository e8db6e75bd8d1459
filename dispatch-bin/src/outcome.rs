use std::error::Error;
use std::time::Duration;

use dispatch_lib::{ErrorKind, Request, Response};
use serde::Serialize;

/// What happened to a single request, as reported to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Outcome {
    pub(crate) url: String,
    pub(crate) method: String,
    /// HTTP status, `None` if no response was received
    pub(crate) status: Option<u16>,
    pub(crate) error: Option<String>,
    /// Time from submission until the response (or error) arrived
    pub(crate) duration_ms: u64,
    #[serde(skip)]
    pub(crate) timed_out: bool,
}

impl Outcome {
    /// Outcome of a request which has been executed
    pub(crate) fn new(
        request: &Request,
        result: &dispatch_lib::Result<Response>,
        elapsed: Duration,
    ) -> Self {
        let (status, error, timed_out) = match result {
            Ok(response) => (Some(response.status().as_u16()), None, false),
            Err(e) => (None, Some(error_chain(e)), e.is_timeout()),
        };
        Self {
            url: request.url().to_string(),
            method: request.method().to_string(),
            status,
            error,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            timed_out,
        }
    }

    /// Outcome of an input which never became a request
    pub(crate) fn rejected(input: &str, method: &str, error: &ErrorKind) -> Self {
        Self {
            url: input.to_string(),
            method: method.to_string(),
            status: None,
            error: Some(error_chain(error)),
            duration_ms: 0,
            timed_out: false,
        }
    }

    /// A response with a status below 400 was received
    pub(crate) fn is_success(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|status| status < 400)
    }
}

/// Render an error followed by its sources, e.g.
/// `Network error while executing request: error sending request: connection refused`
fn error_chain(error: &ErrorKind) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        // reqwest repeats the inner message in its own display at times
        if !message.ends_with(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_lib::Method;
    use http::StatusCode;

    fn request() -> Request {
        Request::new(Method::GET, "https://example.com/a".parse().unwrap())
    }

    #[test]
    fn test_outcome_from_response() {
        let response: Response = http::Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body("")
            .unwrap()
            .into();

        let outcome = Outcome::new(&request(), &Ok(response), Duration::from_millis(12));
        assert_eq!(outcome.url, "https://example.com/a");
        assert_eq!(outcome.method, "GET");
        assert_eq!(outcome.status, Some(404));
        assert_eq!(outcome.duration_ms, 12);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_outcome_from_error() {
        let outcome = Outcome::new(
            &request(),
            &Err(ErrorKind::InvalidUrlHost),
            Duration::ZERO,
        );
        assert_eq!(outcome.status, None);
        assert_eq!(outcome.error.as_deref(), Some("URL is missing a host"));
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let error = ErrorKind::ParseUrl(
            "not a url".to_string(),
            url::ParseError::RelativeUrlWithoutBase,
        );
        let outcome = Outcome::rejected("not a url", "GET", &error);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Cannot parse string `not a url` as URL: relative URL without a base")
        );
    }

    #[test]
    fn test_json_fields() {
        let outcome = Outcome::new(
            &request(),
            &Err(ErrorKind::InvalidUrlHost),
            Duration::from_millis(3),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "url": "https://example.com/a",
                "method": "GET",
                "status": null,
                "error": "URL is missing a host",
                "duration_ms": 3
            })
        );
    }
}
