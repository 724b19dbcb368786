use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rift_match::matchers::MatcherContext;
use rift_match::model::MatchType;
use rift_match::{
    Body, Expectation, ExpectationStore, HttpRequest, HttpRequestPropertiesMatcher,
    MatchDifference, MatchLog, MatchLogEvent, MatcherConfig, NoOpMatchLog,
};
use std::sync::Arc;

/// Enabled sink that drops events, so only message building is measured.
#[derive(Debug)]
struct DiscardingLog;

impl MatchLog for DiscardingLog {
    fn log_event(&self, event: MatchLogEvent) {
        black_box(event);
    }
}

fn create_definition(id: usize) -> HttpRequest {
    HttpRequest::request()
        .with_method("GET")
        .with_path(format!("/api/v1/endpoint{id}"))
        .with_header("Accept", "application/json")
        .with_query_parameter("page", "[0-9]+")
}

fn create_store(count: usize, config: MatcherConfig) -> ExpectationStore {
    let store = ExpectationStore::new(config, Arc::new(NoOpMatchLog));
    for i in 0..count {
        store
            .add(Expectation::when(create_definition(i)).with_id(format!("exp-{i}")))
            .unwrap();
    }
    store
}

fn request(path: &str) -> HttpRequest {
    HttpRequest::request()
        .with_method("GET")
        .with_path(path)
        .with_header("Accept", "application/json")
        .with_query_parameter("page", "3")
}

fn bench_store_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_dispatch");

    for count in [10, 100, 1000].iter() {
        let store = create_store(*count, MatcherConfig::default());
        let first = request("/api/v1/endpoint0");
        let last = request(&format!("/api/v1/endpoint{}", count - 1));
        let miss = request("/api/v2/nothing");

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("first", count), count, |b, _| {
            b.iter(|| store.first_matching_expectation(black_box(&first)))
        });
        group.bench_with_input(BenchmarkId::new("last", count), count, |b, _| {
            b.iter(|| store.first_matching_expectation(black_box(&last)))
        });
        group.bench_with_input(BenchmarkId::new("miss", count), count, |b, _| {
            b.iter(|| store.first_matching_expectation(black_box(&miss)))
        });
    }

    group.finish();
}

fn bench_fail_fast(c: &mut Criterion) {
    let mut group = c.benchmark_group("fail_fast");
    let definition = create_definition(0).with_body(Body::json(
        r#"{"name": "rift", "tags": ["a", "b"]}"#,
        MatchType::OnlyMatchingFields,
    ));
    let candidate = request("/api/v1/other")
        .with_body(Body::exact(r#"{"name": "rift", "tags": ["a", "b", "c"], "extra": true}"#));

    for fail_fast in [true, false] {
        let ctx = MatcherContext::new(
            MatcherConfig::default().with_fail_fast(fail_fast),
            Arc::new(NoOpMatchLog),
        );
        let matcher = HttpRequestPropertiesMatcher::new(&ctx, Some(&definition), None).unwrap();
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("json_body_miss", fail_fast),
            &fail_fast,
            |b, _| {
                b.iter(|| {
                    let mut diff = MatchDifference::new(true);
                    matcher.matches_request(&mut diff, black_box(&candidate))
                })
            },
        );
    }

    group.finish();
}

fn bench_match_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_logging");
    let definition = create_definition(0);
    let candidate = request("/api/v1/other");
    let sinks: [(&str, Arc<dyn MatchLog>); 2] =
        [("disabled", Arc::new(NoOpMatchLog)), ("enabled", Arc::new(DiscardingLog))];

    for (name, log) in sinks {
        let ctx = MatcherContext::new(MatcherConfig::default(), log);
        let matcher = HttpRequestPropertiesMatcher::new(&ctx, Some(&definition), None).unwrap();
        group.throughput(Throughput::Elements(1));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut diff = MatchDifference::new(true);
                matcher.matches_request(&mut diff, black_box(&candidate))
            })
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let ctx = MatcherContext::default();
    let definition = create_definition(42).with_body(Body::json_path("$.items[?(@.price > 10)]"));
    c.bench_function("compile_request_matcher", |b| {
        b.iter(|| HttpRequestPropertiesMatcher::new(&ctx, Some(black_box(&definition)), None))
    });
}

criterion_group!(
    benches,
    bench_store_dispatch,
    bench_fail_fast,
    bench_match_logging,
    bench_compile
);
criterion_main!(benches);
