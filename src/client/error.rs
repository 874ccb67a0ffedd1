use serde::Deserialize;

/// Errors returned by the remote API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit hit and retries exhausted.
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success response.
    #[error("API error {status} ({code}): {summary}")]
    Api {
        status: u16,
        code: String,
        summary: String,
        causes: Vec<String>,
    },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// HTTP status of the failed response, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound(_) => Some(404),
            ClientError::RateLimited { .. } => Some(429),
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Request(e) => e.status().map(|s| s.as_u16()),
            ClientError::Parse(_) | ClientError::InvalidConfig(_) => None,
        }
    }

    /// Build an error from a non-success response.
    pub(crate) fn from_response(status: u16, retry_after_secs: Option<u64>, body: &[u8]) -> Self {
        let parsed: Option<ApiErrorBody> = serde_json::from_slice(body).ok();

        match status {
            404 => ClientError::NotFound(
                parsed
                    .map(|b| b.error_summary)
                    .unwrap_or_else(|| "resource not found".to_string()),
            ),
            429 => ClientError::RateLimited { retry_after_secs },
            _ => match parsed {
                Some(body) => ClientError::Api {
                    status,
                    code: body.error_code,
                    summary: body.error_summary,
                    causes: body
                        .error_causes
                        .into_iter()
                        .map(|c| c.error_summary)
                        .collect(),
                },
                None => ClientError::Api {
                    status,
                    code: String::new(),
                    summary: String::from_utf8_lossy(body).trim().to_string(),
                    causes: Vec::new(),
                },
            },
        }
    }
}

/// Error body returned by the remote API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_summary: String,
    #[serde(default)]
    error_causes: Vec<ApiErrorCause>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorCause {
    #[serde(default)]
    error_summary: String,
}

/// Absorb 404 responses.
pub trait NotFoundExt<T> {
    /// `Ok(None)` when the resource was not found, the error otherwise.
    fn ok_if_not_found(self) -> ClientResult<Option<T>>;
}

impl<T> NotFoundExt<T> for ClientResult<T> {
    fn ok_if_not_found(self) -> ClientResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_decodes_api_error() {
        let body = br#"{
            "errorCode": "E0000001",
            "errorSummary": "Api validation failed: login",
            "errorCauses": [{"errorSummary": "login: An object with this field already exists"}]
        }"#;
        match ClientError::from_response(400, None, body) {
            ClientError::Api {
                status,
                code,
                summary,
                causes,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "E0000001");
                assert_eq!(summary, "Api validation failed: login");
                assert_eq!(causes.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_response_not_found() {
        let err = ClientError::from_response(
            404,
            None,
            br#"{"errorCode":"E0000007","errorSummary":"Not found: Resource not found: 00u1 (User)"}"#,
        );
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_from_response_non_json_body() {
        let err = ClientError::from_response(502, None, b"Bad Gateway\n");
        assert!(matches!(err, ClientError::Api { ref summary, .. } if summary == "Bad Gateway"));
    }

    #[test]
    fn test_ok_if_not_found() {
        let gone: ClientResult<u8> = Err(ClientError::NotFound("x".into()));
        assert!(gone.ok_if_not_found().unwrap().is_none());

        let found: ClientResult<u8> = Ok(1);
        assert_eq!(found.ok_if_not_found().unwrap(), Some(1));

        let failed: ClientResult<u8> = Err(ClientError::Parse("x".into()));
        assert!(failed.ok_if_not_found().is_err());
    }
}
