use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use futures::future::join_all;
use playground_renderer::PageLock;

// Hand-off cost of the page lock, uncontended and with a queue of waiters.
fn bench_page_lock(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime");

    let lock = PageLock::new();
    c.bench_function("page_lock_uncontended", |b| {
        b.iter(|| {
            rt.block_on(async {
                let _guard = lock.acquire().await;
            })
        })
    });

    let lock = Arc::new(PageLock::new());
    c.bench_function("page_lock_16_waiters", |b| {
        b.iter(|| {
            rt.block_on(async {
                join_all((0..16).map(|_| async {
                    let _guard = lock.acquire().await;
                    tokio::task::yield_now().await;
                }))
                .await;
            })
        })
    });
}

criterion_group!(benches, bench_page_lock);
criterion_main!(benches);
