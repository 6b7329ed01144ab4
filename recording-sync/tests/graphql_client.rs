use mockito::Matcher;
use recording_sync::graphql::GraphqlClient;
use recording_sync_core::contract::CallDataSource;
use recording_sync_core::error::CollaboratorError;
use recording_sync_core::recordings::DateRange;
use serde_json::json;

#[tokio::test]
async fn returns_records_from_data_field() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/graphql")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Regex(
            r#"getCallDataTranscribe\(fromDate: \\"2025-10-01T00:00:00.000Z\\", toDate: \\"2025-10-29T23:59:59.999Z\\"\)"#.into(),
        ))
        .with_status(200)
        .with_body(
            json!({"data": {"getCallDataTranscribe": [
                {"callId": "C1", "Recordings": [{"s3Url": "http://x/a.mp3"}]},
                {"callId": "C2", "Recordings": []}
            ]}})
            .to_string(),
        )
        .create_async()
        .await;

    let client = GraphqlClient::new(format!("{}/graphql", server.url()));
    let range = DateRange::parse(Some("2025-10-01"), Some("2025-10-29")).unwrap();
    let records = client.fetch_call_data(Some(range)).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["callId"], "C1");
    assert_eq!(records[0]["Recordings"][0]["s3Url"], "http://x/a.mp3");
}

#[tokio::test]
async fn missing_data_is_an_empty_list() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(r#"{"errors": [{"message": "boom"}], "data": null}"#)
        .create_async()
        .await;

    let client = GraphqlClient::new(format!("{}/graphql", server.url()));
    assert!(client.fetch_call_data(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/graphql")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let client = GraphqlClient::new(format!("{}/graphql", server.url()));
    match client.fetch_call_data(None).await {
        Err(CollaboratorError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let client = GraphqlClient::new("http://127.0.0.1:1/graphql");
    assert!(matches!(
        client.fetch_call_data(None).await,
        Err(CollaboratorError::Transport(_))
    ));
}
