use crate::detector::{self, Advance};
use crate::error::RegistryError;
use crate::participant::Participant;
use crate::state::{DEFAULT_CAPACITY, EpochRegistry};
use crate::sync::Arc;
use crate::telemetry::{Telemetry, TelemetryConfig};

/// Builder for configuring an `RcuDomain`.
///
/// Use this builder to customize the domain:
/// - `capacity`: Maximum number of participants joined at once
/// - `sample_every_epochs`: Record a progress sample every N epochs
/// - `stop_at_epoch` / `stop_after_reads`: Raise the advisory stop signal
///
/// # Example
/// ```
/// use epoch_rcu::RcuDomain;
///
/// let domain = RcuDomain::builder()
///     .capacity(8)
///     .sample_every_epochs(1u64 << 10)
///     .build();
/// assert_eq!(domain.capacity(), 8);
/// ```
///
/// 用于配置 `RcuDomain` 的构建器。
pub struct RcuDomainBuilder {
    capacity: usize,
    telemetry: TelemetryConfig,
}

impl RcuDomainBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Set the maximum number of participants.
    ///
    /// The epoch table is allocated once with this many slots; joins beyond it
    /// fail with `RegistryError::Full`.
    ///
    /// Default: `64`
    ///
    /// 设置参与者的最大数量。
    /// 纪元表按此数量一次性分配；超出后 join 会以 `RegistryError::Full` 失败。
    #[inline]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Record a progress sample each time the epoch leaves a multiple of `every`.
    ///
    /// Pass `None` (the default) to disable epoch sampling.
    ///
    /// 每当纪元离开 `every` 的倍数时记录一次进度采样。传 `None`（默认）禁用。
    #[inline]
    pub fn sample_every_epochs(mut self, every: impl Into<Option<u64>>) -> Self {
        self.telemetry.sample_every_epochs = every.into();
        self
    }

    /// Raise the stop signal when the epoch advances past `epoch`.
    #[inline]
    pub fn stop_at_epoch(mut self, epoch: impl Into<Option<u64>>) -> Self {
        self.telemetry.stop_at_epoch = epoch.into();
        self
    }

    /// Raise the stop signal once a sample sees more than `reads` reads.
    #[inline]
    pub fn stop_after_reads(mut self, reads: impl Into<Option<u64>>) -> Self {
        self.telemetry.stop_after_reads = reads.into();
        self
    }

    /// Build the `RcuDomain` with the configured settings.
    /// 使用配置的设置构建 `RcuDomain`。
    #[inline]
    pub fn build(self) -> RcuDomain {
        let telemetry = Telemetry::new(self.capacity, self.telemetry);
        RcuDomain {
            shared: Arc::new(EpochRegistry::new(self.capacity, telemetry)),
        }
    }
}

impl Default for RcuDomainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An epoch-based reclamation domain.
///
/// `RcuDomain` owns the epoch registry: the global epoch, the fixed-size table
/// of per-participant epochs and the shared telemetry. Every thread touching
/// an [`RcuSlot`](crate::RcuSlot) guarded by this domain joins it once and
/// keeps the resulting [`Participant`].
///
/// `RcuDomain` is `Clone` and can be safely shared across threads.
/// Typically, you create one domain at startup and clone it to every worker.
///
/// **Typical Usage**:
/// ```
/// use epoch_rcu::{RcuDomain, RcuSlot};
///
/// let domain = RcuDomain::new();
/// let slot = RcuSlot::with_value(&domain, 1u64);
///
/// let reader = domain.join().unwrap();
/// let section = reader.enter();
/// assert_eq!(slot.read(&section), Some(&1));
/// ```
///
/// 基于纪元的回收域。
/// `RcuDomain` 持有纪元注册表：全局纪元、固定大小的每参与者纪元表以及共享的遥测数据。
/// 每个访问受此域保护的 [`RcuSlot`](crate::RcuSlot) 的线程都加入一次，并保存得到的 [`Participant`]。
/// `RcuDomain` 是 `Clone` 的，可以安全地在线程间共享。
#[derive(Clone)]
pub struct RcuDomain {
    shared: Arc<EpochRegistry>,
}

impl RcuDomain {
    /// Create a domain with default settings.
    /// 使用默认设置创建一个域。
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the domain.
    /// 创建一个用于配置域的构建器。
    #[inline]
    pub fn builder() -> RcuDomainBuilder {
        RcuDomainBuilder::new()
    }

    /// Join the domain, claiming a participant slot.
    ///
    /// The caller is responsible for using each `Participant` from one thread only.
    ///
    /// 加入域，占用一个参与者槽。调用者有责任确保每个 `Participant` 仅由一个线程使用。
    pub fn join(&self) -> Result<Participant, RegistryError> {
        let index = self.shared.claim()?;
        Ok(Participant::new(self.shared.clone(), index))
    }

    /// Maximum number of participants.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Current value of the global epoch.
    #[inline]
    pub fn global_epoch(&self) -> u64 {
        self.shared.global_epoch()
    }

    /// Make one attempt to advance the global epoch.
    ///
    /// Does nothing harmful when called spuriously or concurrently.
    #[inline]
    pub fn try_advance(&self) -> Advance {
        detector::try_advance(&self.shared)
    }

    #[inline]
    pub(crate) fn registry(&self) -> &Arc<EpochRegistry> {
        &self.shared
    }

    /// Counters, samples and flags shared by every participant.
    #[inline]
    pub fn telemetry(&self) -> &Telemetry {
        &self.shared.telemetry
    }
}

impl Default for RcuDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RcuDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RcuDomain")
            .field("capacity", &self.capacity())
            .field("global_epoch", &self.global_epoch())
            .finish()
    }
}
