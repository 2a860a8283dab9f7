// Token manager driven against a mocked token endpoint over real HTTP.

#[cfg(test)]
mod test {
    use std::time::Duration;

    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;
    use tokio::sync::broadcast;

    use crate::config::types::ManagerConfig;
    use crate::manager::{TokenEvent, TokenManager};

    const TOKEN_PATH: &str = "/cgi-bin/token";

    async fn recv(rx: &mut broadcast::Receiver<TokenEvent>) -> TokenEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within 5s")
            .expect("event channel closed")
    }

    fn manager_for(server: &MockServer, retry_delay_ms: u64) -> TokenManager {
        let config = ManagerConfig::new("wx-app", "wx-secret")
            .with_endpoint(server.url(TOKEN_PATH))
            .with_retry_delay_ms(retry_delay_ms);
        TokenManager::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn start_fetches_token_from_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(TOKEN_PATH)
                    .query_param("grant_type", "client_credential")
                    .query_param("appid", "wx-app")
                    .query_param("secret", "wx-secret");
                then.status(200)
                    .json_body(json!({"access_token": "ACCESS_TOKEN", "expires_in": 7200}));
            })
            .await;

        let manager = manager_for(&server, 50);
        let mut events = manager.subscribe();
        manager.start().await;

        assert_eq!(recv(&mut events).await, TokenEvent::Start);
        assert_eq!(recv(&mut events).await, TokenEvent::Token("ACCESS_TOKEN".to_owned()));
        assert_eq!(manager.delay_ms().await, 7_080_000);
        assert_eq!(manager.access_token().await.as_deref(), Some("ACCESS_TOKEN"));
        mock.assert_calls_async(1).await;

        manager.stop().await;
        assert_eq!(recv(&mut events).await, TokenEvent::Stop);
        assert!(manager.credential().await.is_none());
    }

    #[tokio::test]
    async fn errcode_responses_keep_retrying() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(TOKEN_PATH);
                then.status(200)
                    .json_body(json!({"errcode": 40013, "errmsg": "invalid appid"}));
            })
            .await;

        let manager = manager_for(&server, 50);
        let mut events = manager.subscribe();
        manager.start().await;
        assert_eq!(recv(&mut events).await, TokenEvent::Start);

        for _ in 0..2 {
            match recv(&mut events).await {
                TokenEvent::Error(e) => {
                    assert_eq!(e.code(), Some(40013));
                    assert_eq!(e.to_string(), "invalid appid");
                }
                other => panic!("expected error event, got {:?}", other),
            }
        }
        assert_eq!(manager.delay_ms().await, 50);
        assert!(manager.access_token().await.is_none());

        manager.stop().await;
    }

    #[tokio::test]
    async fn server_error_is_reported_as_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(TOKEN_PATH);
                then.status(502);
            })
            .await;

        let manager = manager_for(&server, 50);
        let mut events = manager.subscribe();
        manager.start().await;
        assert_eq!(recv(&mut events).await, TokenEvent::Start);

        match recv(&mut events).await {
            TokenEvent::Error(e) => assert_eq!(e.to_string(), "Unexpected Status Code: 502"),
            other => panic!("expected error event, got {:?}", other),
        }
        manager.stop().await;
    }

    #[tokio::test]
    async fn concurrent_refreshes_hit_endpoint_once() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path(TOKEN_PATH);
                then.status(200)
                    .delay(Duration::from_millis(300))
                    .json_body(json!({"access_token": "FORCED", "expires_in": 7200}));
            })
            .await;

        let manager = manager_for(&server, 50);
        let first = manager.refresh().await;
        let second = manager.refresh().await;
        let third = manager.refresh().await;
        assert!(!first.is_coalesced());
        assert!(second.is_coalesced());
        assert!(third.is_coalesced());

        let (a, b, c) = tokio::join!(first, second, third);
        assert_eq!(a.unwrap(), "FORCED");
        assert_eq!(b.unwrap(), "FORCED");
        assert_eq!(c.unwrap(), "FORCED");
        assert!(!manager.is_refreshing().await);
        mock.assert_calls_async(1).await;

        manager.stop().await;
    }
}
