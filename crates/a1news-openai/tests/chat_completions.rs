use std::time::Duration;

use a1news_core::{config::ModelEndpoint, errors::Error, ports::ChatModel};
use a1news_openai::ChatCompletionsClient;
use mockito::Matcher;

fn client(base_url: String) -> ChatCompletionsClient {
    ChatCompletionsClient::new(
        ModelEndpoint {
            api_key: "fake-api-key".to_string(),
            base_url,
            model: "gpt-4o-mini".to_string(),
        },
        Duration::from_secs(10),
    )
    .unwrap()
}

#[tokio::test]
async fn returns_first_choice_content() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer fake-api-key")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "Γεια"}]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "model": "gpt-4o-mini",
                "choices": [{
                    "message": {"role": "assistant", "content": "Καλημέρα"},
                    "finish_reason": "stop"
                }]
            }"#,
        )
        .create_async()
        .await;

    // Trailing slash on the base URL is tolerated.
    let out = client(format!("{}/", server.url()))
        .complete("Γεια")
        .await
        .unwrap();
    assert_eq!(out, "Καλημέρα");

    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_external_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("rate limited")
        .create_async()
        .await;

    let err = client(server.url()).complete("x").await.unwrap_err();
    match err {
        Error::External(msg) => {
            assert!(msg.contains("429"));
            assert!(msg.contains("rate limited"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn empty_content_is_model_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "  "}}]}"#)
        .create_async()
        .await;

    let err = client(server.url()).complete("x").await.unwrap_err();
    assert!(matches!(err, Error::Model(_)));

    mock.assert_async().await;
}

#[tokio::test]
async fn missing_choices_is_model_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let err = client(server.url()).complete("x").await.unwrap_err();
    assert!(matches!(err, Error::Model(_)));
}
