use crate::error::RegistryError;
use crate::sync::{AtomicU64, Mutex, Ordering};
use crate::telemetry::Telemetry;
use std::vec::Vec;

/// Default maximum number of participants in one domain.
/// 单个域中参与者的默认最大数量。
pub(crate) const DEFAULT_CAPACITY: usize = 64;

/// Epoch stored in a participant slot nobody has claimed.
///
/// Larger than any real epoch, so an unclaimed slot never stalls an advance.
///
/// 无人占用的参与者槽中存放的纪元。
/// 它大于任何真实纪元，因此未占用的槽永远不会阻止纪元推进。
pub(crate) const INACTIVE_EPOCH: u64 = u64::MAX;

/// Process-wide epoch state shared by every participant of a domain.
///
/// Holds the global epoch and a fixed-size table with the last epoch each
/// participant published. Slot `i` is written only by the participant that
/// claimed index `i`; any thread running the grace-period detector reads it.
///
/// 一个域内所有参与者共享的纪元状态。
/// 包含全局纪元和一个固定大小的表，记录每个参与者最后发布的纪元。
/// 槽 `i` 只由占用索引 `i` 的参与者写入；任何运行宽限期检测器的线程都可以读取。
#[derive(Debug)]
pub(crate) struct EpochRegistry {
    /// Monotonic epoch counter. Only the detector moves it, one CAS per step.
    /// 单调纪元计数器。只有检测器通过每步一次 CAS 推进它。
    pub(crate) global_epoch: AtomicU64,
    /// Last epoch observed or published by each participant, or `INACTIVE_EPOCH`.
    /// 每个参与者最后观察或发布的纪元，或 `INACTIVE_EPOCH`。
    pub(crate) thread_epochs: Box<[AtomicU64]>,
    /// Unclaimed slot indices. Only touched on join and leave.
    free_slots: Mutex<Vec<usize>>,
    pub(crate) telemetry: Telemetry,
}

impl EpochRegistry {
    pub(crate) fn new(capacity: usize, telemetry: Telemetry) -> Self {
        Self {
            global_epoch: AtomicU64::new(0),
            thread_epochs: (0..capacity)
                .map(|_| AtomicU64::new(INACTIVE_EPOCH))
                .collect(),
            // Reversed so the lowest index is handed out first.
            free_slots: Mutex::new((0..capacity).rev().collect()),
            telemetry,
        }
    }

    /// Whether `other` is this very registry, not merely an equal one.
    #[inline]
    pub(crate) fn is(&self, other: &EpochRegistry) -> bool {
        std::ptr::eq(self, other)
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.thread_epochs.len()
    }

    /// Claim a free slot and publish the current epoch into it.
    pub(crate) fn claim(&self) -> Result<usize, RegistryError> {
        let index = self.free_slots.lock().pop().ok_or_else(|| {
            tracing::warn!(capacity = self.capacity(), "epoch registry is full");
            RegistryError::Full {
                capacity: self.capacity(),
            }
        })?;

        let epoch = self.observe(index);
        tracing::debug!(index, epoch, "participant joined");
        Ok(index)
    }

    /// Mark slot `index` inactive and return it to the free list.
    pub(crate) fn release(&self, index: usize) {
        self.thread_epochs[index].store(INACTIVE_EPOCH, Ordering::Release);
        self.free_slots.lock().push(index);
        tracing::debug!(index, "participant left");
    }

    /// Copy the current global epoch into slot `index` and return it.
    ///
    /// A plain load followed by a store, not a read-modify-write: the slot has
    /// a single writer. The acquire load keeps every later load of a protected
    /// pointer after the epoch read; the release store orders every earlier
    /// read of protected data before the detector can observe the new value.
    #[inline]
    pub(crate) fn observe(&self, index: usize) -> u64 {
        let epoch = self.global_epoch.load(Ordering::Acquire);
        self.thread_epochs[index].store(epoch, Ordering::Release);
        epoch
    }

    #[inline]
    pub(crate) fn publish(&self, index: usize, epoch: u64) {
        self.thread_epochs[index].store(epoch, Ordering::Release);
    }

    #[inline]
    pub(crate) fn global_epoch(&self) -> u64 {
        self.global_epoch.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn thread_epoch(&self, index: usize) -> u64 {
        self.thread_epochs[index].load(Ordering::Acquire)
    }
}
