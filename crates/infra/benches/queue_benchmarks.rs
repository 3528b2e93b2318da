use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use mailroom_core::PackageId;
use mailroom_infra::{EnrichmentQueue, RetryPolicy};

fn bench_queue_cycle(c: &mut Criterion) {
    c.bench_function("queue_enqueue_claim_settle_64", |b| {
        b.iter(|| {
            let queue = EnrichmentQueue::new();
            let ids: Vec<PackageId> = (0..64).map(|_| PackageId::new()).collect();
            for id in &ids {
                queue.enqueue(*id, "payload".to_string()).unwrap();
            }
            while let Some(job) = queue.claim() {
                queue.settle(job.package_id);
            }
            black_box(queue.pending_len())
        })
    });
}

fn bench_backoff(c: &mut Criterion) {
    let policy = RetryPolicy {
        max_attempts: 16,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(60),
        jitter: 0.1,
    };

    c.bench_function("retry_backoff_schedule", |b| {
        b.iter(|| {
            let mut total = Duration::ZERO;
            for attempt in 1..=16 {
                total += policy.delay_after(black_box(attempt));
            }
            black_box(total)
        })
    });
}

criterion_group!(benches, bench_queue_cycle, bench_backoff);
criterion_main!(benches);
