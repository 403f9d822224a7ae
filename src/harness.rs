//! Stress driver: worker threads issuing a random mix of reads, updates and
//! deletes against one shared slot, validating every value they read.
//!
//! 压力驱动：多个工作线程对一个共享槽随机执行读、更新和删除，并校验读到的每个值。

use crate::domain::RcuDomain;
use crate::error::HarnessError;
use crate::lock::{LockedSlot, RawSpinLock, ReadWriteSpinLock, SpinLock};
use crate::participant::Participant;
use crate::ptr::RcuSlot;
use crate::telemetry::{OpTotals, Operation, ProgressSample, Telemetry, TelemetryConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Number of fields in a [`Payload`].
pub const PAYLOAD_FIELDS: usize = 32;

/// Field value written when a payload is dropped.
pub const POISON: u32 = 0xDEAD_BEEF;

/// The value shared between workers. Field `i` holds `i` until the payload is dropped.
///
/// 工作线程之间共享的值。字段 `i` 在 payload 被 drop 之前一直保存 `i`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    fields: [u32; PAYLOAD_FIELDS],
}

impl Payload {
    pub fn new() -> Self {
        let mut fields = [0; PAYLOAD_FIELDS];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = i as u32;
        }
        Self { fields }
    }

    /// Whether every field still equals its index.
    #[inline]
    pub fn is_intact(&self) -> bool {
        self.fields
            .iter()
            .enumerate()
            .all(|(i, &field)| field == i as u32)
    }

    #[inline]
    pub fn fields(&self) -> &[u32; PAYLOAD_FIELDS] {
        &self.fields
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        // A reader that still sees this payload after reclamation fails `is_intact`.
        self.fields.fill(POISON);
        std::hint::black_box(&self.fields);
    }
}

/// How the shared slot is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Rcu,
    SpinLock,
    ReadWriteSpinLock,
}

/// Workload parameters. Deletes take whatever share reads and updates leave.
///
/// 工作负载参数。删除操作占读和更新之外剩余的比例。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub threads: usize,
    pub read_percent: u32,
    pub update_percent: u32,
    /// Stop once cumulative reads exceed this.
    pub stop_after_reads: u64,
    /// Worker 0 records a sample every this many of its own reads.
    pub sample_every_reads: u64,
    /// RCU only: the detector records a sample every this many epochs.
    pub sample_every_epochs: Option<u64>,
    /// RCU only: stop once the epoch advances past this.
    pub stop_at_epoch: Option<u64>,
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            read_percent: 80,
            update_percent: 10,
            stop_after_reads: 1 << 23,
            sample_every_reads: 1 << 19,
            sample_every_epochs: Some(1 << 20),
            stop_at_epoch: None,
            seed: 0x5EED,
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.threads == 0 {
            return Err(HarnessError::NoThreads);
        }
        if self.read_percent + self.update_percent > 100 {
            return Err(HarnessError::InvalidMix {
                read: self.read_percent,
                update: self.update_percent,
            });
        }
        // The read threshold is only checked from worker 0's read samples.
        if self.read_percent == 0 || self.sample_every_reads == 0 {
            return Err(HarnessError::Unbounded);
        }
        Ok(())
    }

    #[inline]
    pub fn delete_percent(&self) -> u32 {
        100 - self.read_percent - self.update_percent
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            sample_every_epochs: self.sample_every_epochs,
            stop_at_epoch: self.stop_at_epoch,
            stop_after_reads: Some(self.stop_after_reads),
        }
    }

    fn pick(&self, rng: &mut StdRng) -> Operation {
        let roll = rng.random_range(0..100);
        if roll < self.update_percent {
            Operation::Update
        } else if roll < self.update_percent + self.delete_percent() {
            Operation::Delete
        } else {
            Operation::Read
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct WorkloadReport {
    pub strategy: Strategy,
    pub totals: OpTotals,
    pub violations: u64,
    /// Global epoch at the end of an RCU run; `None` for lock runs.
    pub final_epoch: Option<u64>,
    pub elapsed: Duration,
    pub samples: Vec<ProgressSample>,
}

impl WorkloadReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.violations == 0
    }
}

/// Run `config` against a slot protected by `strategy` until the stop signal.
pub fn run(config: &WorkloadConfig, strategy: Strategy) -> Result<WorkloadReport, HarnessError> {
    config.validate()?;

    tracing::info!(
        ?strategy,
        threads = config.threads,
        read = config.read_percent,
        update = config.update_percent,
        delete = config.delete_percent(),
        "starting workload"
    );

    let report = match strategy {
        Strategy::Rcu => run_rcu(config)?,
        Strategy::SpinLock => run_locked::<SpinLock>(config, strategy)?,
        Strategy::ReadWriteSpinLock => run_locked::<ReadWriteSpinLock>(config, strategy)?,
    };

    tracing::info!(
        ?strategy,
        reads = report.totals.reads,
        updates = report.totals.updates,
        deletes = report.totals.deletes,
        violations = report.violations,
        elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        "workload finished"
    );

    Ok(report)
}

fn run_rcu(config: &WorkloadConfig) -> Result<WorkloadReport, HarnessError> {
    let domain = RcuDomain::builder()
        .capacity(config.threads)
        .sample_every_epochs(config.sample_every_epochs)
        .stop_at_epoch(config.stop_at_epoch)
        .stop_after_reads(config.stop_after_reads)
        .build();
    let slot = Arc::new(RcuSlot::<Payload>::new(&domain));

    // Join up front so a full registry surfaces before any thread starts.
    let participants = (0..config.threads)
        .map(|_| domain.join())
        .collect::<Result<Vec<_>, _>>()?;

    let handles: Vec<_> = participants
        .into_iter()
        .enumerate()
        .map(|(worker, participant)| {
            let domain = domain.clone();
            let slot = slot.clone();
            let config = config.clone();
            thread::spawn(move || rcu_worker(worker, &domain, &participant, &slot, &config))
        })
        .collect();

    join_workers(handles)?;

    let telemetry = domain.telemetry();
    Ok(WorkloadReport {
        strategy: Strategy::Rcu,
        totals: telemetry.totals(),
        violations: telemetry.violations(),
        final_epoch: Some(domain.global_epoch()),
        elapsed: telemetry.elapsed(),
        samples: telemetry.samples(),
    })
}

fn rcu_worker(
    worker: usize,
    domain: &RcuDomain,
    participant: &Participant,
    slot: &RcuSlot<Payload>,
    config: &WorkloadConfig,
) {
    let telemetry = domain.telemetry();
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(worker as u64));

    while !telemetry.should_stop() {
        let op = config.pick(&mut rng);
        let count = participant.record(op);

        match op {
            Operation::Update => {
                let retired = participant.publish(slot, Payload::new());
                participant.retire(retired);
            }
            Operation::Delete => {
                let retired = participant.remove(slot);
                participant.retire(retired);
            }
            Operation::Read => {
                let section = participant.enter();
                if let Some(payload) = slot.read(&section) {
                    if !payload.is_intact() {
                        telemetry.report_violation(participant.index());
                    }
                }
                drop(section);

                sample_reads(worker, count, telemetry, config);
            }
        }
    }
}

fn run_locked<L: RawSpinLock + 'static>(
    config: &WorkloadConfig,
    strategy: Strategy,
) -> Result<WorkloadReport, HarnessError> {
    let telemetry = Arc::new(Telemetry::new(config.threads, config.telemetry_config()));
    let slot = Arc::new(LockedSlot::<Payload, L>::new());

    let handles: Vec<_> = (0..config.threads)
        .map(|worker| {
            let telemetry = telemetry.clone();
            let slot = slot.clone();
            let config = config.clone();
            thread::spawn(move || locked_worker(worker, &telemetry, &slot, &config))
        })
        .collect();

    join_workers(handles)?;

    Ok(WorkloadReport {
        strategy,
        totals: telemetry.totals(),
        violations: telemetry.violations(),
        final_epoch: None,
        elapsed: telemetry.elapsed(),
        samples: telemetry.samples(),
    })
}

fn locked_worker<L: RawSpinLock>(
    worker: usize,
    telemetry: &Telemetry,
    slot: &LockedSlot<Payload, L>,
    config: &WorkloadConfig,
) {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(worker as u64));

    while !telemetry.should_stop() {
        let op = config.pick(&mut rng);
        let count = telemetry.record(worker, op);

        match op {
            Operation::Update => drop(slot.replace(Some(Box::new(Payload::new())))),
            Operation::Delete => drop(slot.remove()),
            Operation::Read => {
                let intact = slot.read(|payload| payload.is_none_or(Payload::is_intact));
                if !intact {
                    telemetry.report_violation(worker);
                }

                sample_reads(worker, count, telemetry, config);
            }
        }
    }
}

/// Worker 0 samples every `sample_every_reads` of its own reads. The sample
/// raises the stop signal once total reads pass the limit.
fn sample_reads(worker: usize, reads: u64, telemetry: &Telemetry, config: &WorkloadConfig) {
    if worker == 0 && config.sample_every_reads > 0 && reads % config.sample_every_reads == 0 {
        telemetry.sample(None);
    }
}

fn join_workers(handles: Vec<thread::JoinHandle<()>>) -> Result<(), HarnessError> {
    let mut result = Ok(());
    for (worker, handle) in handles.into_iter().enumerate() {
        if handle.join().is_err() && result.is_ok() {
            result = Err(HarnessError::WorkerPanicked { worker });
        }
    }
    result
}
