use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use one_on_one_coach::{
    AiClient, AppConfig, CacheConfig, CacheKey, CompletionOptions, InMemorySettingsStore, Member,
    OneOnOne, PromptBuilder, ResponseCache, SessionRecord,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn benchmark_cache_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_key");

    for size in [256usize, 4096, 65536].iter() {
        let prompt = "a".repeat(*size);
        group.bench_with_input(BenchmarkId::new("build", size), &prompt, |b, prompt| {
            b.iter(|| CacheKey::build(black_box(prompt), "gpt-4o", 0.7, 1000));
        });
    }

    group.finish();
}

fn benchmark_cache_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_operations");

    // Beyond 100 entries every insert evicts.
    for count in [50usize, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("insert_get", count), count, |b, &count| {
            b.iter(|| {
                let mut cache = ResponseCache::new(CacheConfig::default());
                for i in 0..count {
                    let key = CacheKey::build(&format!("prompt {}", i), "gpt-4o", 0.7, 1000);
                    cache.insert(key.clone(), format!("response {}", i));
                    black_box(cache.get(&key));
                }
                cache.stats().evictions
            });
        });
    }

    group.finish();
}

fn benchmark_prompt_rendering(c: &mut Criterion) {
    let prompts = PromptBuilder::new().unwrap();
    let member = Member::new(1, "Aiko Tanaka", "Engineer");
    let date = "2024-05-01".parse().unwrap();
    let session = OneOnOne::new(1, 1, date, "Discussed the roadmap and workload. ".repeat(20));

    let records: Vec<SessionRecord> = (0..50)
        .map(|i| {
            let member = Member::new(i % 5, format!("Member {}", i % 5), "Engineer");
            SessionRecord::new(OneOnOne::new(i, i % 5, date, "Weekly check-in notes."), member)
        })
        .collect();

    let mut group = c.benchmark_group("prompt_rendering");
    group.bench_function("coaching_advice", |b| {
        b.iter(|| prompts.coaching_advice(black_box(&session), &member).unwrap())
    });
    group.bench_function("overall_management_style_50", |b| {
        b.iter(|| prompts.overall_management_style(black_box(&records)).unwrap())
    });
    group.finish();
}

fn benchmark_cached_completion(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut config = AppConfig::default();
    config.provider.offline = true;
    let client = AiClient::from_config(&config, Arc::new(InMemorySettingsStore::new()));
    let options = CompletionOptions::default();
    rt.block_on(client.complete("warm", &options)).unwrap();

    c.bench_function("cached_completion", |b| {
        b.to_async(&rt)
            .iter(|| async { client.complete(black_box("warm"), &options).await.unwrap() });
    });
}

criterion_group!(
    benches,
    benchmark_cache_key,
    benchmark_cache_operations,
    benchmark_prompt_rendering,
    benchmark_cached_completion
);
criterion_main!(benches);
