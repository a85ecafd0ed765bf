use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use serde_json::json;
use taskwell_core::Priority;
use taskwell_queue::{handler_fn, Scheduler, TaskSpec};

const TASKS: usize = 200;

fn priorities() -> [Priority; 3] {
    [Priority::High, Priority::Medium, Priority::Low]
}

/// Submit-and-drain throughput of a no-op workload across concurrency
/// ceilings. Handlers return immediately, so this measures admission,
/// dispatch, and result bookkeeping rather than handler work.
fn bench_submit_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_drain");
    group.throughput(Throughput::Elements(TASKS as u64));

    for limit in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(limit), &limit, |b, &limit| {
            let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
            b.iter(|| {
                rt.block_on(async {
                    let scheduler = Scheduler::builder()
                        .concurrency_limit(limit)
                        .handler("noop", handler_fn(|payload| async move { Ok(payload) }))
                        .build()
                        .expect("valid config");

                    let levels = priorities();
                    let ids: Vec<_> = (0..TASKS)
                        .map(|i| {
                            scheduler.submit(TaskSpec::new(
                                "noop",
                                json!({"i": i}),
                                levels[i % levels.len()],
                            ))
                        })
                        .collect();

                    for id in ids {
                        scheduler.join(id).await;
                    }
                })
            });
        });
    }

    group.finish();
}

/// Cost of one failed task running through its full retry budget, with a
/// sub-millisecond base delay so the backoff itself stays cheap.
fn bench_retry_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("retry_path");

    group.bench_function("three_attempts", |b| {
        let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
        b.iter(|| {
            rt.block_on(async {
                let scheduler = Scheduler::builder()
                    .base_delay(std::time::Duration::from_micros(50))
                    .handler(
                        "flaky",
                        handler_fn(|_| async move { Err(anyhow::anyhow!("boom")) }),
                    )
                    .build()
                    .expect("valid config");

                let id = scheduler.submit(
                    TaskSpec::new("flaky", json!({}), Priority::Medium).with_max_retries(2),
                );
                scheduler.join(id).await
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_submit_drain, bench_retry_path);
criterion_main!(benches);
