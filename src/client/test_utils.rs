//! wiremock helpers shared by the client tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use serde_json::{Value, json};
use url::Url;
use wiremock::{MockServer, ResponseTemplate};

use super::OktaClient;
use crate::config::RetryConfig;

struct SequentialResponderState {
    responses: Vec<ResponseTemplate>,
    call_count: AtomicUsize,
}

/// A wiremock responder that returns different responses on successive calls.
/// After exhausting the list, it repeats the last response.
///
/// Clone it before mounting to read `call_count` afterwards.
#[derive(Clone)]
pub struct SequentialResponder {
    state: Arc<SequentialResponderState>,
}

impl SequentialResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(
            !responses.is_empty(),
            "SequentialResponder requires at least one response"
        );
        Self {
            state: Arc::new(SequentialResponderState {
                responses,
                call_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Fail `fail_count` times with a 500, then return `success_response`.
    pub fn fail_then_succeed(fail_count: usize, success_response: ResponseTemplate) -> Self {
        let mut responses: Vec<_> = (0..fail_count).map(|_| server_error()).collect();
        responses.push(success_response);
        Self::new(responses)
    }

    pub fn always_fail() -> Self {
        Self::new(vec![server_error()])
    }

    pub fn call_count(&self) -> usize {
        self.state.call_count.load(Ordering::SeqCst)
    }
}

impl wiremock::Respond for SequentialResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let count = self.state.call_count.fetch_add(1, Ordering::SeqCst);
        let idx = count.min(self.state.responses.len() - 1);
        self.state.responses[idx].clone()
    }
}

fn server_error() -> ResponseTemplate {
    ResponseTemplate::new(500).set_body_json(error_body(
        "E0000009",
        "Internal Server Error",
    ))
}

/// Error body in the remote API's format.
pub fn error_body(code: &str, summary: &str) -> Value {
    json!({
        "errorCode": code,
        "errorSummary": summary,
        "errorLink": code,
        "errorId": "oae-test",
        "errorCauses": []
    })
}

/// A remote user document.
pub fn user_body(id: &str, status: &str, profile: Value) -> Value {
    json!({
        "id": id,
        "status": status,
        "transitioningToStatus": null,
        "created": "2024-01-01T00:00:00.000Z",
        "profile": profile
    })
}

/// A client pointed at the mock server with fast retries.
pub fn mock_client(server: &MockServer) -> OktaClient {
    let retry = RetryConfig {
        max_retries: 2,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        jitter: 0.0,
        ..Default::default()
    };
    OktaClient::with_http_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).expect("mock server uri"),
        "test-token",
        retry,
        2,
    )
}
