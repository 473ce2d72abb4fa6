/// Gateway-wide result alias.
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// The gateway's error taxonomy. Every public facade operation returns
/// `Result<T, ErrorKind>` rather than unwinding — callers never have to
/// catch a panic to learn a call failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ErrorKind {
    /// No active provider is configured, or its API key is empty.
    #[error("no provider is configured")]
    NotConfigured,

    /// `provider_id` has no template on disk.
    #[error("unknown provider '{0}'")]
    TemplateNotFound(String),

    /// A template parsed but failed schema validation.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// A required field was missing, or a path descriptor pointed nowhere
    /// reachable, while translating a uniform request.
    #[error("translation error: {0}")]
    TranslationError(String),

    /// Connect, TLS or I/O failure talking to the provider. May have been
    /// retried by the HTTP executor before surfacing.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The provider responded with a non-2xx status after retries were
    /// exhausted. `body` has credentials redacted and is truncated.
    #[error("provider returned HTTP {status}: {body}")]
    ProviderHttpError {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Truncated, credential-redacted response body.
        body: String,
    },

    /// The provider's response JSON lacked a field the template's response
    /// paths require, or an embedding batch came back the wrong length.
    #[error("provider protocol mismatch: {0}")]
    ProviderProtocolMismatch(String),

    /// The caller's cancellation token fired before the call completed.
    #[error("cancelled")]
    Cancelled,

    /// The per-request deadline elapsed.
    #[error("request timed out")]
    Timeout,

    /// The background task driving a streaming call panicked or was aborted
    /// before it could produce a result.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// A single short string safe to hand back to a caller; never includes
    /// the raw provider body verbatim when it might carry a credential.
    pub fn short_message(&self) -> String {
        self.to_string()
    }
}

/// Redacts `Bearer <token>`/`Authorization: ...`-shaped substrings and
/// truncates the remainder, so an error body (or a log line built from one)
/// can never leak an API key.
pub fn redact_and_truncate(body: &str, max_len: usize) -> String {
    let redacted = redact_authorization(body);

    if redacted.chars().count() <= max_len {
        redacted
    } else {
        let truncated: String = redacted.chars().take(max_len).collect();
        format!("{truncated}...[truncated]")
    }
}

fn redact_authorization(body: &str) -> String {
    const NEEDLES: [&str; 3] = ["Bearer ", "Authorization:", "authorization:"];

    let mut result = body.to_string();

    for needle in NEEDLES {
        let mut search_from = 0;

        while let Some(relative_start) = result[search_from..].find(needle) {
            let start = search_from + relative_start;
            let value_start = start + needle.len();
            let value_end = result[value_start..]
                .find(['"', '\n', ',', '}'])
                .map(|offset| value_start + offset)
                .unwrap_or(result.len());

            result.replace_range(value_start..value_end, "[REDACTED]");
            search_from = value_start + "[REDACTED]".len();
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_bearer_token_from_body() {
        let body = r#"{"error": "upstream said Bearer sk-super-secret-value failed"}"#;
        let redacted = redact_and_truncate(body, 1000);

        assert!(!redacted.contains("sk-super-secret-value"));
        assert!(redacted.contains("[REDACTED]"));
    }

    #[test]
    fn truncates_long_body() {
        let body = "x".repeat(500);
        let redacted = redact_and_truncate(&body, 50);

        assert!(redacted.ends_with("...[truncated]"));
        assert!(redacted.len() < body.len());
    }
}
