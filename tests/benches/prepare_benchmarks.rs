//! # Transfer Prepare Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Envelope build (headers + payload encode) | < 50µs |
//! | Topic + producer config resolution | < 5µs |
//! | Full prepare against in-memory backbone | < 200µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use shared_bus::{Flow, InMemoryMessageBus, TopicResolver};
use shared_types::{Headers, TransferPrepareRequest};
use std::sync::Arc;
use transfer_prepare::{EnvelopeBuilder, MockAddressResolver, PrepareService, TransferPrepareApi};

fn request(extensions: usize) -> TransferPrepareRequest {
    let extension: Vec<_> = (0..extensions)
        .map(|i| json!({ "key": format!("k{i}"), "value": format!("v{i}") }))
        .collect();
    serde_json::from_value(json!({
        "transferId": "b51ec534-ee48-4575-b6a9-ead2955b8069",
        "payeeFsp": "1234",
        "payerFsp": "5678",
        "amount": { "currency": "USD", "amount": "123.45" },
        "condition": "f5sqb7tBTWPd5Y8BDFdMm9BJR_MNI4isf8p8n4D5pHA",
        "expiration": "2016-05-24T08:38:08.699-04:00",
        "extensionList": { "extension": extension }
    }))
    .expect("valid prepare fixture")
}

fn headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("fspiop-address".into(), "moja.dfsp2".into());
    headers.insert("fspiop-source".into(), "5678".into());
    headers
}

fn bench_envelope_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope-build");
    let builder = EnvelopeBuilder::default();
    let headers = headers();

    for extensions in [0, 10, 100] {
        let request = request(extensions);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("build", extensions),
            &request,
            |b, request| b.iter(|| black_box(builder.build(request, &headers, "dfsp2"))),
        );
    }
    group.finish();
}

fn bench_topic_resolution(c: &mut Criterion) {
    let resolver = TopicResolver::with_defaults("localhost:9092");

    c.bench_function("topic-resolution", |b| {
        b.iter(|| {
            let topic = resolver.topic_for("transfer", "prepare", None, Some("t-1"));
            let config = resolver.producer_config_for(Flow::Producer, "TRANSFER", "PREPARE");
            black_box((topic, config))
        })
    });
}

fn bench_prepare_in_memory(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let service = PrepareService::new(
        Arc::new(MockAddressResolver::new().with_address("1234", "dfsp2")),
        Arc::new(InMemoryMessageBus::new()),
        Arc::new(TopicResolver::with_defaults("")),
    );
    let request = request(2);
    let headers = headers();

    c.bench_function("prepare-in-memory", |b| {
        b.iter(|| runtime.block_on(async { black_box(service.prepare(&headers, &request).await) }))
    });
}

criterion_group!(
    benches,
    bench_envelope_build,
    bench_topic_resolution,
    bench_prepare_in_memory
);
criterion_main!(benches);
