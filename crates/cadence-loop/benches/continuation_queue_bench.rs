// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use cadence_loop::{ContinuationQueue, PlayerLoop, PlayerLoopTiming};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn bench_continuation_queue(c: &mut Criterion) {
    let queue = ContinuationQueue::new(PlayerLoopTiming::Update, 16, 1 << 20);
    let counter = Arc::new(AtomicU64::new(0));

    let mut group = c.benchmark_group("Continuation Queue");

    group.bench_function("Enqueue + drain 1,000 continuations", |b| {
        b.iter(|| {
            for _ in 0..1_000 {
                let counter = counter.clone();
                queue.enqueue(Box::new(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }));
            }
            black_box(queue.run());
        });
    });

    group.finish();
}

fn bench_frame_promises(c: &mut Criterion) {
    let player_loop = PlayerLoop::new();
    let handle = player_loop.handle();

    let mut group = c.benchmark_group("Frame Promises");

    // Pooled promises: after the first iteration every node comes from the pool.
    group.bench_function("1,000 pooled next_frame promises", |b| {
        b.iter(|| {
            let tasks: Vec<_> = (0..1_000)
                .map(|_| handle.next_frame(PlayerLoopTiming::Update))
                .collect();
            player_loop.tick(Duration::from_millis(16));
            for task in tasks {
                black_box(task.get_result().is_ok());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_continuation_queue, bench_frame_promises);
criterion_main!(benches);
