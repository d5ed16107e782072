use std::sync::Arc;

use s3perf_backend::{CallKind, InMemoryBackend};
use s3perf_bench::wire::{self, WireFormat};
use s3perf_bench::workload::Operation;
use s3perf_bench::{
    BackendKind, Backends, BenchError, BenchmarkConfig, BenchmarkRequest, Defaults, RequestType,
    perftest,
};
use serde_json::json;

struct Fixture {
    reference: Arc<InMemoryBackend>,
    accelerated: Arc<InMemoryBackend>,
    backends: Backends,
}

impl Fixture {
    fn new() -> Self {
        s3perf_test::tracing::init();

        let reference = Arc::new(InMemoryBackend::new("reference"));
        let accelerated = Arc::new(InMemoryBackend::new("accelerated"));
        let backends = Backends::new(reference.clone(), accelerated.clone());
        Self {
            reference,
            accelerated,
            backends,
        }
    }

    /// Stores `key` in both backends.
    fn insert(&self, key: &str, body: &'static str) {
        self.reference.insert("bucket", key, body);
        self.accelerated.insert("bucket", key, body);
    }
}

fn config(request_type: &str, num_keys: usize) -> BenchmarkConfig {
    let request = BenchmarkRequest {
        request_type: Some(request_type.into()),
        bucket: "bucket".into(),
        num_keys: Some(num_keys),
        list_iterations: Some(2),
        ..Default::default()
    };
    BenchmarkConfig::from_request(request, &Defaults::default()).unwrap()
}

fn kinds(backend: &InMemoryBackend) -> Vec<CallKind> {
    backend.calls().into_iter().map(|call| call.kind).collect()
}

fn keys_of(backend: &InMemoryBackend, kind: CallKind) -> Vec<String> {
    backend
        .calls()
        .into_iter()
        .filter(|call| call.kind == kind)
        .filter_map(|call| call.key)
        .collect()
}

#[tokio::test]
async fn put_reports_both_backends() {
    let fixture = Fixture::new();

    let report = perftest::run(&fixture.backends, &config("PUT_OBJECT", 5))
        .await
        .unwrap();

    let keys: Vec<_> = report.keys().collect();
    assert_eq!(
        keys,
        ["accelerated_put_obj_perf_stats", "reference_put_obj_perf_stats"]
    );
    assert_eq!(fixture.reference.keys("bucket").len(), 5);
    assert_eq!(
        keys_of(&fixture.reference, CallKind::Put),
        keys_of(&fixture.accelerated, CallKind::Put)
    );

    let wire = report.to_wire();
    let put = &wire["reference_put_obj_perf_stats"];
    assert!(put["latency"]["p50"].as_str().unwrap().ends_with(" secs"));
    assert!(put["throughput"].as_str().unwrap().ends_with(" objects/sec"));
    assert!(put.get("object_size").is_none());
}

#[tokio::test]
async fn all_never_reads_deleted_keys() {
    let fixture = Fixture::new();
    fixture.insert("preexisting", "payload");

    let report = perftest::run(&fixture.backends, &config("ALL", 3))
        .await
        .unwrap();

    assert_eq!(report.len(), 8);
    for backend in BackendKind::ALL {
        for operation in [
            Operation::Put,
            Operation::Delete,
            Operation::ListObjectsV2,
            Operation::Get,
        ] {
            assert!(report.find(backend, operation).is_some(), "{backend} {operation}");
        }
    }

    assert_eq!(keys_of(&fixture.reference, CallKind::Get), ["preexisting"]);
    assert_eq!(keys_of(&fixture.accelerated, CallKind::Get), ["preexisting"]);
}

#[tokio::test]
async fn all_runs_phases_in_order() {
    let fixture = Fixture::new();
    fixture.insert("preexisting", "payload");

    perftest::run(&fixture.backends, &config("ALL", 2))
        .await
        .unwrap();

    use CallKind::*;
    assert_eq!(
        kinds(&fixture.reference),
        [
            Put, Put, Delete, Delete, List, List,
            // discovery before the read phase
            List, Get,
        ]
    );
    assert_eq!(
        kinds(&fixture.accelerated),
        [Put, Put, Delete, Delete, List, List, Get]
    );
}

#[tokio::test]
async fn all_fails_when_bucket_is_empty_after_deletes() {
    let fixture = Fixture::new();

    let error = perftest::run(&fixture.backends, &config("ALL", 2))
        .await
        .unwrap_err();

    assert!(matches!(error, BenchError::EmptyKeySet { .. }));
}

#[tokio::test]
async fn first_failure_aborts_the_run() {
    let fixture = Fixture::new();
    fixture.reference.fail_on_call(3, "InternalError");

    let result = perftest::run(&fixture.backends, &config("ALL", 10)).await;

    assert_eq!(
        wire::respond(&result),
        json!({
            "errorMessage": "injected failure on call 3",
            "errorCode": "InternalError",
        })
    );
    assert_eq!(kinds(&fixture.reference), [CallKind::Put; 3]);
    assert!(fixture.accelerated.calls().is_empty());
}

#[tokio::test]
async fn accelerated_starts_after_reference_completes() {
    let fixture = Fixture::new();
    fixture.accelerated.fail_on_call(1, "SlowDown");

    let error = perftest::run(&fixture.backends, &config("DELETE_OBJECT", 4))
        .await
        .unwrap_err();

    assert_eq!(error.error_code(), "SlowDown");
    assert_eq!(kinds(&fixture.reference), [CallKind::Delete; 4]);
    assert_eq!(kinds(&fixture.accelerated), [CallKind::Delete]);
}

#[tokio::test]
async fn key_count_is_clamped_before_discovery() {
    let fixture = Fixture::new();
    for index in 0..1200 {
        fixture.insert(&format!("obj{index:04}"), "x");
    }

    let config = config("GET_OBJECT", 5000);
    assert_eq!(config.num_keys, 1000);

    perftest::run(&fixture.backends, &config).await.unwrap();

    assert_eq!(keys_of(&fixture.reference, CallKind::Get).len(), 1000);
    assert_eq!(keys_of(&fixture.accelerated, CallKind::Get).len(), 1000);
}

#[tokio::test]
async fn gz_keys_count_as_compressed() {
    let fixture = Fixture::new();
    fixture.insert("data.gz", "not really compressed");
    fixture.insert("data.txt", "plain");
    fixture.insert("other.txt", "plain");

    let report = perftest::run(&fixture.backends, &config("GET_OBJECT", 10))
        .await
        .unwrap();

    let wire = report.to_wire();
    for key in ["reference_get_obj_perf_stats", "accelerated_get_obj_perf_stats"] {
        assert_eq!(wire[key]["compressed_obj_count"], json!(1), "{key}");
        assert_eq!(wire[key]["uncompressed_obj_count"], json!(2), "{key}");
        assert!(wire[key]["object_size"]["p90"].is_string(), "{key}");
    }
}

#[tokio::test]
async fn explicit_keys_are_used_as_given() {
    let fixture = Fixture::new();
    fixture.insert("a", "1");
    fixture.insert("b", "2");
    fixture.insert("c", "3");

    let request = BenchmarkRequest {
        request_type: Some("GET_OBJECT_TTFB".into()),
        bucket: "bucket".into(),
        keys: Some(vec!["c".into(), "a".into()]),
        ..Default::default()
    };
    let config = BenchmarkConfig::from_request(request, &Defaults::default()).unwrap();
    let report = perftest::run(&fixture.backends, &config).await.unwrap();

    assert!(report.find(BackendKind::Reference, Operation::GetTtfb).is_some());
    assert_eq!(kinds(&fixture.reference), [CallKind::Get, CallKind::Get]);
    assert_eq!(keys_of(&fixture.accelerated, CallKind::Get), ["c", "a"]);
}

#[tokio::test]
async fn passthrough_only_reads_from_accelerated() {
    let fixture = Fixture::new();
    fixture.insert("a", "1");
    fixture.insert("b", "2");

    let report = perftest::run(&fixture.backends, &config("GET_OBJECT_PASSTHROUGH", 10))
        .await
        .unwrap();

    let keys: Vec<_> = report.keys().collect();
    assert_eq!(keys, ["accelerated_get_obj_passthrough_perf_stats"]);
    assert_eq!(kinds(&fixture.reference), [CallKind::List]);
    assert_eq!(keys_of(&fixture.accelerated, CallKind::Get), ["a", "b"]);
}

#[tokio::test]
async fn list_reports_throughput_distribution() {
    let fixture = Fixture::new();
    fixture.insert("a", "1");

    let report = perftest::run(&fixture.backends, &config("LIST_OBJECTS_V2", 10))
        .await
        .unwrap();

    assert_eq!(kinds(&fixture.reference), [CallKind::List; 2]);
    let wire = report.to_wire();
    let throughput = &wire["accelerated_list_objects_v2_perf_stats"]["throughput"];
    assert!(throughput["average"].is_string());
    assert!(throughput["p90"].is_string());
}

#[tokio::test]
async fn read_without_keys_fails() {
    let fixture = Fixture::new();

    let error = perftest::run(&fixture.backends, &config("GET_OBJECT", 10))
        .await
        .unwrap_err();

    assert!(matches!(error, BenchError::EmptyKeySet { ref bucket } if bucket == "bucket"));
    assert_eq!(error.error_code(), "1");
}

#[tokio::test]
async fn unknown_request_type_is_rejected() {
    let fixture = Fixture::new();
    let event = json!({"requestType": "COPY_OBJECT", "bucket": "bucket"});

    let result = perftest::process_event(&fixture.backends, &Defaults::default(), event).await;

    assert!(matches!(result, Err(BenchError::UnsupportedRequestType(_))));
    assert_eq!(wire::respond(&result)["errorCode"], json!("1"));
    assert!(fixture.reference.calls().is_empty());
    assert!(fixture.accelerated.calls().is_empty());
}

#[tokio::test]
async fn events_default_to_all() {
    let fixture = Fixture::new();
    fixture.insert("preexisting", "payload");

    let event = json!({"bucket": "bucket", "numKeys": 2, "objLength": 16});
    let report = perftest::process_event(&fixture.backends, &Defaults::default(), event)
        .await
        .unwrap();

    assert_eq!(report.len(), 8);
    assert_eq!(RequestType::All.as_str(), "ALL");
}
