//! # Runtime Flow
//!
//! The wired `SwitchRuntime` serving real HTTP on an ephemeral port, with the
//! participant directory mocked by wiremock and the in-memory backbone.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use switch_runtime::{SwitchConfig, SwitchRuntime};
    use transfer_prepare::TransferPrepareApi;

    fn prepare_body(transfer_id: &str, payee: &str) -> serde_json::Value {
        json!({
            "transferId": transfer_id,
            "payeeFsp": payee,
            "payerFsp": "5678",
            "amount": { "currency": "USD", "amount": "123.45" },
            "condition": "f5sqb7tBTWPd5Y8BDFdMm9BJR_MNI4isf8p8n4D5pHA",
            "expiration": "2016-05-24T08:38:08.699-04:00"
        })
    }

    async fn start(directory: &MockServer) -> (Arc<SwitchRuntime>, String) {
        let mut config = SwitchConfig::default();
        config.directory.base_url = directory.uri();
        config.prepare_timeout_ms = Some(5_000);

        let runtime = Arc::new(SwitchRuntime::new(config).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let server = Arc::clone(&runtime);
        tokio::spawn(async move { server.serve(listener).await });
        (runtime, base)
    }

    #[tokio::test]
    async fn test_http_prepare_end_to_end() {
        let directory = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/participants/1234"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "address": "dfsp2" })))
            .mount(&directory)
            .await;
        let (runtime, base) = start(&directory).await;

        let client = reqwest_client();
        let accepted = client
            .post(format!("{base}/transfers"))
            .header("fspiop-address", "moja.dfsp2")
            .json(&prepare_body("t-accepted", "1234"))
            .send()
            .await
            .unwrap();
        assert_eq!(accepted.status().as_u16(), 202);

        let unknown = client
            .post(format!("{base}/transfers"))
            .json(&prepare_body("t-unknown", "9999"))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status().as_u16(), 404);
        let body: serde_json::Value = unknown.json().await.unwrap();
        assert_eq!(body["errorInformation"]["errorCode"], "3201");

        assert_eq!(runtime.service().prepares_published(), 1);
        assert_eq!(runtime.service().prepares_failed(), 1);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_service_usable_without_http() {
        let directory = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "address": "dfsp9" })))
            .mount(&directory)
            .await;

        let mut config = SwitchConfig::default();
        config.directory.base_url = directory.uri();
        let runtime = SwitchRuntime::new(config).unwrap();

        let request = serde_json::from_value(prepare_body("t-direct", "1234")).unwrap();
        let mut headers = shared_types::Headers::new();
        headers.insert("fspiop-address".into(), "moja.dfsp9".into());

        assert_eq!(runtime.service().prepare(&headers, &request).await, Ok(true));
    }

    fn reqwest_client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }
}
