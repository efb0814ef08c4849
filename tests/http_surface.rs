mod support;

#[tokio::test]
async fn test_health_reports_ok() {
    let res = reqwest::get(support::http_url("/health"))
        .await
        .expect("request should succeed");
    assert_eq!(res.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = res.json().await.expect("health body should be JSON");
    assert_eq!(body["status"], "ok");
    assert!(body["uptimeSecs"].is_u64());
    assert!(body["players"].is_u64());
    assert!(body["tick"].is_u64());
}

#[tokio::test]
async fn test_plain_get_on_ws_is_rejected() {
    let res = reqwest::get(support::http_url("/ws"))
        .await
        .expect("request should succeed");

    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let res = reqwest::get(support::http_url("/lobbies"))
        .await
        .expect("request should succeed");

    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
}
