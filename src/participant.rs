use crate::detector::{self, Advance, GracePeriod};
use crate::ptr::{RcuSlot, Retired};
use crate::state::EpochRegistry;
use crate::sync::{Arc, Cell};
use crate::telemetry::Operation;

/// A thread's membership in an [`RcuDomain`](crate::RcuDomain).
///
/// Obtained from `RcuDomain::join()`. Owns one slot of the epoch table until
/// dropped, at which point the slot is marked inactive and can be reused.
///
/// It is `!Sync` (due to `Cell`) and should be kept by the one thread using it.
/// Both readers and writers are participants: readers bracket each access with
/// [`enter`](Self::enter), writers publish through [`publish`](Self::publish)
/// and reclaim through [`retire`](Self::retire).
///
/// **Liveness**: a participant that stops calling `enter`, `quiesce` or `retire`
/// stalls every grace period in the domain. Drop it when the thread is done.
///
/// 线程在 [`RcuDomain`](crate::RcuDomain) 中的成员身份。
/// 通过 `RcuDomain::join()` 获得。在被 drop 之前占用纪元表中的一个槽；
/// drop 时该槽被标记为不活跃并可被复用。
/// 它是 `!Sync` 的（因为 `Cell`），应由使用它的那个线程持有。
/// **活性**：一个不再调用 `enter`、`quiesce` 或 `retire` 的参与者会阻塞域内所有宽限期。
/// 线程结束时请 drop 它。
pub struct Participant {
    shared: Arc<EpochRegistry>,
    index: usize,
    depth: Cell<usize>,
}

impl Participant {
    pub(crate) fn new(shared: Arc<EpochRegistry>, index: usize) -> Self {
        Participant {
            shared,
            index,
            depth: Cell::new(0),
        }
    }

    /// Stable slot index of this participant.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The epoch currently published in this participant's slot.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.shared.thread_epoch(self.index)
    }

    /// Whether a read section is currently open on this participant.
    #[inline]
    pub fn in_section(&self) -> bool {
        self.depth.get() > 0
    }

    /// Enter a read-side critical section.
    ///
    /// Publishes the current global epoch into this participant's slot. Every
    /// value read from an [`RcuSlot`] through the returned guard stays allocated
    /// until the guard is dropped.
    ///
    /// **Reentrancy**: sections nest. Only the outermost `enter` and the last
    /// drop publish; inner guards just adjust a counter.
    ///
    /// 进入读端临界区。
    /// 将当前全局纪元发布到此参与者的槽中。通过返回的守卫从 [`RcuSlot`]
    /// 读取的每个值在守卫被 drop 之前都保持已分配状态。
    /// **可重入性**：临界区可以嵌套。只有最外层的 `enter` 和最后一次 drop 会发布纪元。
    #[inline]
    pub fn enter(&self) -> ReadSection<'_> {
        let depth = self.depth.get();

        if depth == 0 {
            self.shared.observe(self.index);
        }

        self.depth.set(depth + 1);

        ReadSection { participant: self }
    }

    /// Refresh this participant's epoch outside of any read section.
    ///
    /// Idle participants should call this now and then so they do not hold
    /// back writers waiting for a grace period.
    ///
    /// # Panics
    /// Panics if called while a read section is open.
    #[inline]
    pub fn quiesce(&self) -> u64 {
        assert!(
            !self.in_section(),
            "BUG: quiesce() called inside a read section. \
             This would drop the protection of values read in that section."
        );
        self.shared.observe(self.index)
    }

    /// Make one attempt to advance the global epoch.
    #[inline]
    pub fn try_advance(&self) -> Advance {
        detector::try_advance(&self.shared)
    }

    /// Swap `value` into `slot`, returning the displaced value.
    ///
    /// The returned [`Retired`] must be passed to [`retire`](Self::retire);
    /// readers may still be looking at it.
    ///
    /// # Panics
    /// Panics if `slot` was created in a different domain.
    ///
    /// 将 `value` 换入 `slot`，返回被替换的值。
    /// 返回的 [`Retired`] 必须交给 [`retire`](Self::retire)；读者可能仍在访问它。
    /// 如果 `slot` 创建于其他域，则 panic。
    #[inline]
    pub fn publish<T>(&self, slot: &RcuSlot<T>, value: T) -> Retired<T> {
        self.check_slot(slot);
        slot.replace(Some(Box::new(value)))
    }

    /// Empty `slot`, returning the displaced value.
    ///
    /// # Panics
    /// Panics if `slot` was created in a different domain.
    #[inline]
    pub fn remove<T>(&self, slot: &RcuSlot<T>) -> Retired<T> {
        self.check_slot(slot);
        slot.remove()
    }

    #[inline]
    fn check_slot<T>(&self, slot: &RcuSlot<T>) {
        assert!(
            slot.is_guarded_by(&self.shared),
            "BUG: RcuSlot written by a participant of another RcuDomain. \
             Readers of the slot's own domain would not be waited for."
        );
    }

    /// Wait until no reader can still hold anything displaced before this call.
    ///
    /// Waits out two epochs past the epoch currently published by this
    /// participant, driving the detector while it spins.
    ///
    /// # Panics
    /// Panics if called while a read section is open.
    ///
    /// 等待直到没有读者仍可能持有在此调用之前被替换的任何值。
    /// 等待本参与者当前发布的纪元之后的两个纪元，自旋期间驱动检测器。
    pub fn synchronize(&self) -> GracePeriod {
        assert!(
            !self.in_section(),
            "BUG: synchronize() called inside a read section. \
             A writer must leave its read section before waiting for a grace period."
        );

        let from = self.shared.thread_epoch(self.index);
        detector::wait_for_quiescence(&self.shared, self.index, from)
    }

    /// Wait for a grace period, then free `retired`.
    ///
    /// # Panics
    /// Panics if `retired` was displaced from a slot of a different domain,
    /// or if called while a read section is open.
    ///
    /// 等待一个宽限期，然后释放 `retired`。
    /// 如果 `retired` 来自其他域的槽，则 panic。
    pub fn retire<T>(&self, retired: Retired<T>) -> GracePeriod {
        assert!(
            retired.is_guarded_by(&self.shared),
            "BUG: retire() called with a value from another RcuDomain's slot. \
             This domain's grace period does not cover that slot's readers."
        );

        let grace = self.synchronize();
        retired.reclaim();
        grace
    }

    /// Count one operation for this participant in the domain telemetry.
    #[inline]
    pub fn record(&self, op: Operation) -> u64 {
        self.shared.telemetry.record(self.index, op)
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("index", &self.index)
            .field("depth", &self.depth.get())
            .finish()
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.shared.release(self.index);
    }
}

/// A read-side critical section.
///
/// Obtained from [`Participant::enter`]. It is `!Send` and `!Sync` because it
/// borrows a `!Sync` participant, and its lifetime is bound to that participant.
/// Dropping it exits the section, republishing the current global epoch.
///
/// 读端临界区。
/// 通过 [`Participant::enter`] 获得。它是 `!Send` 和 `!Sync` 的，因为它借用了一个
/// `!Sync` 的参与者，其生命周期被绑定到该参与者。drop 时退出临界区，并重新发布当前全局纪元。
#[must_use]
pub struct ReadSection<'a> {
    participant: &'a Participant,
}

impl ReadSection<'_> {
    #[inline]
    pub(crate) fn registry(&self) -> &EpochRegistry {
        &self.participant.shared
    }
}

impl<'a> Clone for ReadSection<'a> {
    /// Open a nested section on the same participant.
    #[inline]
    fn clone(&self) -> Self {
        self.participant.enter()
    }
}

impl<'a> Drop for ReadSection<'a> {
    #[inline]
    fn drop(&mut self) {
        let depth = self.participant.depth.get();

        assert!(
            depth > 0,
            "BUG: Dropping a ReadSection with no open section (depth = 0). \
             This indicates incorrect API usage or a library bug."
        );

        if depth == 1 {
            // The epoch may have moved during the section; publish the current one.
            self.participant.shared.observe(self.participant.index);
        }

        self.participant.depth.set(depth - 1);
    }
}
