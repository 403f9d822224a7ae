use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use epoch_rcu::harness::{self, Strategy, WorkloadConfig};

/// Benchmark: The harness workload under each strategy
///
/// Every strategy runs the same 80/10/10 read/update/delete mix until the
/// read budget is spent.
fn bench_mixed_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_workload_80_10_10");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));

    for num_threads in [2, 4].iter() {
        for strategy in [Strategy::Rcu, Strategy::ReadWriteSpinLock, Strategy::SpinLock] {
            let config = WorkloadConfig {
                threads: *num_threads,
                stop_after_reads: 1 << 16,
                sample_every_reads: 1 << 12,
                sample_every_epochs: None,
                ..WorkloadConfig::default()
            };

            group.bench_with_input(
                BenchmarkId::new(format!("{strategy:?}"), num_threads),
                &config,
                |b, config| {
                    b.iter(|| {
                        let report = harness::run(config, strategy).unwrap();
                        assert!(report.is_clean());
                        black_box(report.totals);
                    });
                },
            );
        }
    }

    group.finish();
}

/// Benchmark: Update path cost (publish + grace period + reclaim)
fn bench_update_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_path");

    group.bench_function("rcu_publish_retire", |b| {
        let domain = epoch_rcu::RcuDomain::new();
        let me = domain.join().unwrap();
        let slot = epoch_rcu::RcuSlot::new(&domain);
        b.iter(|| {
            let retired = me.publish(&slot, harness::Payload::new());
            black_box(me.retire(retired));
        });
    });

    group.bench_function("rw_spin_lock_replace", |b| {
        let slot = epoch_rcu::LockedSlot::<harness::Payload, epoch_rcu::ReadWriteSpinLock>::new();
        b.iter(|| {
            let old = slot.replace(Some(Box::new(harness::Payload::new())));
            black_box(old);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_mixed_workload, bench_update_path);
criterion_main!(benches);
