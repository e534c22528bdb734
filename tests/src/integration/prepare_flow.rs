//! # Prepare Flow
//!
//! Participant directory (wiremock) → `PrepareService` → `InMemoryMessageBus`
//! → subscriber.
//!
//! Checks the produced wire shape, header enrichment, partition keys, and that
//! failed lookups never reach the backbone.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use serde_json::json;
    use tokio::time::timeout;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use shared_bus::{
        InMemoryMessageBus, MessageProducer, RecordFilter, RecordSubscriber, TopicResolver,
    };
    use shared_types::{Headers, TransferPrepareRequest, TRANSFER_CONTENT_TYPE};
    use transfer_prepare::{
        DirectoryClientConfig, HttpAddressResolver, PrepareError, PrepareService,
        ResolutionError, TransferPrepareApi,
    };

    const TRANSFER_ID: &str = "b51ec534-ee48-4575-b6a9-ead2955b8069";
    const PREPARE_TOPIC: &str = "topic-transfer-prepare";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn prepare_request(transfer_id: &str) -> TransferPrepareRequest {
        serde_json::from_value(json!({
            "transferId": transfer_id,
            "payeeFsp": "1234",
            "payerFsp": "5678",
            "amount": { "currency": "USD", "amount": 123.45 },
            "ilpPacket": "AYIBgQAAAAAAAASwNGxldmVsb25lLmRmc3AxLm1lci45T2RTOF81MDdqUUZERmZlakgyOVc4bXFmNEpLMHlGTFGCAUBQU0svMS4wCk5vbmNlOiB1SXlweUYzY3pYSXBFdzVVc05TYWh3CkVuY3J5cHRpb246IG5vbmUKUGF5bWVudC1JZDogMTMyMzZhM2ItOGZhOC00MTYzLTg0NDctNGMzZWQzZGE5OGE3CgpDb250ZW50LUxlbmd0aDogMTM1CkNvbnRlbnQtVHlwZTogYXBwbGljYXRpb24vanNvbgpTZW5kZXItSWRlbnRpZmllcjogOTI4MDYzOTEKCiJ7XCJmZWVcIjowLFwidHJhbnNmZXJDb2RlXCI6XCJpbnZvaWNlXCIsXCJkZWJpdE5hbWVcIjpcImFsaWNlIGNvb3BlclwiLFwiY3JlZGl0TmFtZVwiOlwibWVyIGNoYW50XCIsXCJkZWJpdElkZW50aWZpZXJcIjpcIjkyODA2MzkxXCJ9IgA",
            "condition": "f5sqb7tBTWPd5Y8BDFdMm9BJR_MNI4isf8p8n4D5pHA",
            "expiration": "2016-05-24T08:38:08.699-04:00",
            "extensionList": { "extension": [
                { "key": "errorDescription", "value": "This is a more detailed error description" },
                { "key": "errorDescription", "value": "This is a more detailed error description" }
            ] }
        }))
        .unwrap()
    }

    fn address_headers() -> Headers {
        let mut headers = Headers::new();
        headers.insert("fspiop-address".into(), "moja.dfsp2".into());
        headers
    }

    async fn directory_with_payee() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/participants/1234"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "address": "dfsp2" })))
            .mount(&server)
            .await;
        server
    }

    fn service(directory: &MockServer, bus: Arc<InMemoryMessageBus>) -> PrepareService {
        let resolver = HttpAddressResolver::new(DirectoryClientConfig::new(directory.uri())).unwrap();
        PrepareService::new(
            Arc::new(resolver),
            bus,
            Arc::new(TopicResolver::with_defaults("")),
        )
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_prepare_reaches_subscriber_with_enriched_headers() {
        let directory = directory_with_payee().await;
        let bus = Arc::new(InMemoryMessageBus::new());
        let mut subscription = bus.subscribe(RecordFilter::topic(PREPARE_TOPIC));
        let service = service(&directory, bus.clone());

        let accepted = service
            .prepare(&address_headers(), &prepare_request(TRANSFER_ID))
            .await
            .unwrap();
        assert!(accepted);

        let record = timeout(Duration::from_secs(1), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.key.as_deref(), Some(TRANSFER_ID));

        let envelope = record.envelope().unwrap();
        assert_eq!(envelope.id, TRANSFER_ID);
        assert_eq!(envelope.to, "1234");
        assert_eq!(envelope.from, "5678");
        assert_eq!(envelope.content_type, TRANSFER_CONTENT_TYPE);
        assert_eq!(
            envelope.headers().get("fspiop-destination").map(String::as_str),
            Some("dfsp2")
        );
        assert_eq!(
            envelope.headers().get("fspiop-address").map(String::as_str),
            Some("moja.dfsp2")
        );
    }

    #[tokio::test]
    async fn test_wire_shape_is_exact() {
        let directory = directory_with_payee().await;
        let bus = Arc::new(InMemoryMessageBus::new());
        let service = service(&directory, bus.clone());

        service
            .prepare(&address_headers(), &prepare_request(TRANSFER_ID))
            .await
            .unwrap();

        let wire = bus.records()[0].json().unwrap();
        let mut keys: Vec<_> = wire.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["content", "from", "id", "metadata", "to", "type"]);

        let event = &wire["metadata"]["event"];
        assert_eq!(event["type"], "prepare");
        assert_eq!(event["action"], "prepare");
        assert_eq!(event["status"], "success");
        assert!(event["createdAt"].as_str().unwrap().ends_with('Z'));
        assert!(uuid::Uuid::parse_str(event["id"].as_str().unwrap()).is_ok());

        let payload = &wire["content"]["payload"];
        assert_eq!(payload["transferId"], TRANSFER_ID);
        assert_eq!(payload["amount"], json!({ "currency": "USD", "amount": "123.45" }));
        assert_eq!(payload["extensionList"]["extension"].as_array().unwrap().len(), 2);
        assert_eq!(payload["condition"], "f5sqb7tBTWPd5Y8BDFdMm9BJR_MNI4isf8p8n4D5pHA");
    }

    #[tokio::test]
    async fn test_unknown_payee_never_publishes() {
        let directory = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&directory)
            .await;
        let bus = Arc::new(InMemoryMessageBus::new());
        let service = service(&directory, bus.clone());

        let result = service
            .prepare(&address_headers(), &prepare_request(TRANSFER_ID))
            .await;

        assert_eq!(
            result,
            Err(PrepareError::Resolution(ResolutionError::UnknownParticipant(
                "1234".into()
            )))
        );
        assert_eq!(bus.messages_published(), 0);
        assert!(!bus.is_connected(PREPARE_TOPIC));
    }

    #[tokio::test]
    async fn test_directory_outage_never_publishes() {
        let directory = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&directory)
            .await;
        let bus = Arc::new(InMemoryMessageBus::new());
        let service = service(&directory, bus.clone());

        let result = service
            .prepare(&address_headers(), &prepare_request(TRANSFER_ID))
            .await;

        assert!(matches!(
            result,
            Err(PrepareError::Resolution(ResolutionError::Directory { status: 500, .. }))
        ));
        assert!(bus.records().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_prepares_keyed_per_transfer() {
        let directory = directory_with_payee().await;
        let bus = Arc::new(InMemoryMessageBus::new());
        let service = Arc::new(service(&directory, bus.clone()));

        let transfer_ids: Vec<String> = (0..20).map(|_| uuid::Uuid::new_v4().to_string()).collect();
        let results = join_all(transfer_ids.iter().map(|id| {
            let service = Arc::clone(&service);
            let request = prepare_request(id);
            async move { service.prepare(&address_headers(), &request).await }
        }))
        .await;

        assert!(results.iter().all(|r| r == &Ok(true)));
        assert_eq!(service.prepares_published(), 20);

        for id in &transfer_ids {
            let records: Vec<_> = bus
                .records_for_topic(PREPARE_TOPIC)
                .into_iter()
                .filter(|r| r.key.as_deref() == Some(id.as_str()))
                .collect();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].envelope().unwrap().id, *id);
        }
    }

    #[tokio::test]
    async fn test_resubmission_publishes_twice_with_fresh_event_ids() {
        let directory = directory_with_payee().await;
        let bus = Arc::new(InMemoryMessageBus::new());
        let service = service(&directory, bus.clone());

        for _ in 0..2 {
            service
                .prepare(&address_headers(), &prepare_request(TRANSFER_ID))
                .await
                .unwrap();
        }

        let envelopes: Vec<_> = bus
            .records()
            .iter()
            .map(|r| r.envelope().unwrap())
            .collect();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].id, envelopes[1].id);
        assert_ne!(envelopes[0].event_id(), envelopes[1].event_id());
    }

    #[tokio::test]
    async fn test_no_address_header_no_destination() {
        let directory = directory_with_payee().await;
        let bus = Arc::new(InMemoryMessageBus::new());
        let service = service(&directory, bus.clone());

        let mut headers = Headers::new();
        headers.insert("fspiop-source".into(), "5678".into());
        service
            .prepare(&headers, &prepare_request(TRANSFER_ID))
            .await
            .unwrap();

        let envelope = bus.records()[0].envelope().unwrap();
        assert_eq!(envelope.headers(), &headers);
    }
}
