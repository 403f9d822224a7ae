use crate::sync::{AtomicBool, AtomicU64, Mutex, Ordering};
use std::time::{Duration, Instant};
use std::vec::Vec;

/// The three operations a worker can perform against the shared slot.
/// 工作线程可以对共享槽执行的三种操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Update,
    Delete,
}

/// Per-participant operation counters.
///
/// Each counter has a single writer (its participant), so relaxed increments suffice.
#[derive(Debug, Default)]
pub(crate) struct OpCounters {
    reads: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

impl OpCounters {
    fn counter(&self, op: Operation) -> &AtomicU64 {
        match op {
            Operation::Read => &self.reads,
            Operation::Update => &self.updates,
            Operation::Delete => &self.deletes,
        }
    }
}

/// Cumulative operation counts across all participants.
/// 所有参与者的累计操作计数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpTotals {
    pub reads: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl OpTotals {
    #[inline]
    pub fn total(&self) -> u64 {
        self.reads + self.updates + self.deletes
    }
}

/// One progress sample.
///
/// `epoch` is set for samples taken by the grace-period detector and `None`
/// for read-driven samples taken by a lock-based run.
///
/// 一次进度采样。
/// 由宽限期检测器采样时 `epoch` 有值；由基于锁的运行按读取次数采样时为 `None`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    pub epoch: Option<u64>,
    pub totals: OpTotals,
    pub elapsed: Duration,
}

/// Sampling and stop thresholds. Every field is optional; `None` disables it.
/// 采样与停止阈值。每个字段都是可选的，`None` 表示禁用。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Sample whenever an advance leaves an epoch that is a non-zero multiple of this.
    pub sample_every_epochs: Option<u64>,
    /// Raise the stop signal when the advance leaves exactly this epoch.
    pub stop_at_epoch: Option<u64>,
    /// Raise the stop signal once cumulative reads exceed this.
    pub stop_after_reads: Option<u64>,
}

/// Advisory counters, samples and flags shared by every participant.
///
/// Nothing here takes part in reclamation safety.
///
/// 所有参与者共享的建议性计数器、采样和标志。
/// 这里的内容都不参与回收安全性。
#[derive(Debug)]
pub struct Telemetry {
    counters: Box<[OpCounters]>,
    config: TelemetryConfig,
    started: Instant,
    samples: Mutex<Vec<ProgressSample>>,
    stop: AtomicBool,
    violations: AtomicU64,
}

impl Telemetry {
    /// Create telemetry with one counter set per participant slot.
    pub fn new(participants: usize, config: TelemetryConfig) -> Self {
        Self {
            counters: (0..participants).map(|_| OpCounters::default()).collect(),
            config,
            started: Instant::now(),
            samples: Mutex::new(Vec::new()),
            stop: AtomicBool::new(false),
            violations: AtomicU64::new(0),
        }
    }

    /// Count one operation for participant `index`. Returns that participant's new count.
    ///
    /// # Panics
    /// Panics if `index` is not below the participant count given to `new`.
    #[inline]
    pub fn record(&self, index: usize, op: Operation) -> u64 {
        self.counters[index].counter(op).fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Sum the counters of every participant. The result is a racy snapshot.
    pub fn totals(&self) -> OpTotals {
        self.counters
            .iter()
            .fold(OpTotals::default(), |mut acc, counters| {
                acc.reads += counters.reads.load(Ordering::Relaxed);
                acc.updates += counters.updates.load(Ordering::Relaxed);
                acc.deletes += counters.deletes.load(Ordering::Relaxed);
                acc
            })
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record a sample of the current totals and check the read threshold.
    pub fn sample(&self, epoch: Option<u64>) -> ProgressSample {
        // Snapshot under the lock so the recorded trace is non-decreasing.
        let mut samples = self.samples.lock();
        let sample = ProgressSample {
            epoch,
            totals: self.totals(),
            elapsed: self.elapsed(),
        };
        samples.push(sample);
        drop(samples);

        tracing::info!(
            epoch = ?sample.epoch,
            reads = sample.totals.reads,
            updates = sample.totals.updates,
            deletes = sample.totals.deletes,
            elapsed_ms = u64::try_from(sample.elapsed.as_millis()).unwrap_or(u64::MAX),
            "progress"
        );

        if let Some(limit) = self.config.stop_after_reads {
            if sample.totals.reads > limit {
                self.request_stop();
            }
        }

        sample
    }

    /// Hook run by the grace-period detector after it moved the global
    /// epoch from `from` to `from + 1`.
    pub(crate) fn on_epoch_advanced(&self, from: u64) {
        if from == 0 {
            return;
        }

        if let Some(every) = self.config.sample_every_epochs {
            if every > 0 && from % every == 0 {
                self.sample(Some(from));
            }
        }

        if self.config.stop_at_epoch == Some(from) {
            tracing::info!(epoch = from, "stop epoch reached");
            self.request_stop();
        }
    }

    #[inline]
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Flag a reader that saw a value failing its consistency check.
    pub fn report_violation(&self, participant: usize) {
        let total = self.violations.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::error!(participant, total, "integrity violation: reader observed a corrupt value");
    }

    #[inline]
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Acquire)
    }

    /// All samples recorded so far, in recording order.
    pub fn samples(&self) -> Vec<ProgressSample> {
        self.samples.lock().clone()
    }
}
