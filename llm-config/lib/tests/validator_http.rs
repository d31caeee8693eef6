//! Validator behavior over real HTTP against a mock OpenAI-compatible server.

use std::time::Duration;

use llm_config_lib::{HttpTransport, TransportError, ValidationError, Validator};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn lists_models_with_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"id": "gpt-4o", "object": "model"},
                {"id": "gpt-4o-mini", "object": "model"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let validator = Validator::new(HttpTransport::new());
    let result = validator
        .validate(&format!("{}/v1/", mock_server.uri()), "test-key")
        .await
        .unwrap();

    assert_eq!(result.models, ["gpt-4o", "gpt-4o-mini"]);
}

#[tokio::test]
async fn empty_key_sends_no_authorization_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": ["llama3"]})))
        .mount(&mock_server)
        .await;

    let validator = Validator::new(HttpTransport::new());
    let result = validator.validate(&mock_server.uri(), "").await.unwrap();
    assert_eq!(result.models, ["llama3"]);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn auth_failure_and_not_found_are_both_unauthorized() {
    for status in [401, 404] {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;

        let err = Validator::new(HttpTransport::new())
            .validate(&format!("{}/v1", mock_server.uri()), "bad")
            .await
            .unwrap_err();

        assert!(
            matches!(err, ValidationError::Unauthorized { status: s } if s == status),
            "unexpected error for {status}: {err}"
        );
    }
}

#[tokio::test]
async fn success_without_data_array_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": ["m1"]})))
        .mount(&mock_server)
        .await;

    let err = Validator::new(HttpTransport::new())
        .validate(&format!("{}/v1", mock_server.uri()), "k")
        .await
        .unwrap_err();

    assert!(matches!(err, ValidationError::MalformedResponse { .. }));
}

#[tokio::test]
async fn timeout_surfaces_as_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": []}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let err = Validator::new(transport)
        .validate(&mock_server.uri(), "")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ValidationError::Transport(TransportError::Request(_))
    ));
}
