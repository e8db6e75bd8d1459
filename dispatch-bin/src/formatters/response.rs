use anyhow::Result;

use crate::outcome::Outcome;

/// A trait for formatting the outcome of a single request as one line of
/// output
pub(crate) trait ResponseFormatter: Send + Sync {
    fn format_response(&self, outcome: &Outcome) -> Result<String>;
}

/// `[200] https://example.com/` or `[ERROR] https://example.com/ | <error>`
pub(crate) struct Plain;

impl ResponseFormatter for Plain {
    fn format_response(&self, outcome: &Outcome) -> Result<String> {
        Ok(match (&outcome.status, &outcome.error) {
            (_, Some(error)) => format!("[ERROR] {} | {error}", outcome.url),
            (Some(status), None) => format!("[{status}] {}", outcome.url),
            (None, None) => format!("[ERROR] {}", outcome.url),
        })
    }
}

/// One JSON object per line
pub(crate) struct Json;

impl ResponseFormatter for Json {
    fn format_response(&self, outcome: &Outcome) -> Result<String> {
        Ok(serde_json::to_string(outcome)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: Option<u16>, error: Option<&str>) -> Outcome {
        Outcome {
            url: "https://example.com/".to_string(),
            method: "GET".to_string(),
            status,
            error: error.map(ToString::to_string),
            duration_ms: 42,
            timed_out: false,
        }
    }

    #[test]
    fn test_plain_status() {
        assert_eq!(
            Plain.format_response(&outcome(Some(200), None)).unwrap(),
            "[200] https://example.com/"
        );
        assert_eq!(
            Plain.format_response(&outcome(Some(404), None)).unwrap(),
            "[404] https://example.com/"
        );
    }

    #[test]
    fn test_plain_error() {
        assert_eq!(
            Plain
                .format_response(&outcome(None, Some("connection refused")))
                .unwrap(),
            "[ERROR] https://example.com/ | connection refused"
        );
    }

    #[test]
    fn test_json_is_single_line() {
        let line = Json.format_response(&outcome(Some(201), None)).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(
            line,
            r#"{"url":"https://example.com/","method":"GET","status":201,"error":null,"duration_ms":42}"#
        );
    }
}
