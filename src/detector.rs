use crate::state::EpochRegistry;
use crate::sync::{Ordering, spin_loop};

/// Outcome of one [`try_advance`] attempt.
///
/// Every variant is harmless: a stalled or contended attempt changes nothing,
/// and callers simply poll again.
///
/// 一次 [`try_advance`] 尝试的结果。
/// 所有变体都是无害的：停滞或竞争的尝试不会改变任何东西，调用者只需再次轮询。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Participant `lagging` has not caught up with `epoch` yet.
    /// 参与者 `lagging` 尚未追上 `epoch`。
    Stalled { epoch: u64, lagging: usize },
    /// This call moved the global epoch from `from` to `from + 1`.
    /// 本次调用将全局纪元从 `from` 推进到 `from + 1`。
    Advanced { from: u64 },
    /// Another caller advanced past `from` first; treated as success.
    /// 另一个调用者先推进了 `from`；视为成功。
    Contended { from: u64 },
}

/// Summary of a completed grace-period wait.
/// 一次已完成的宽限期等待的摘要。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePeriod {
    /// `from_epoch + 2`, the last epoch a reader could share with the retired value.
    /// `from_epoch + 2`，读者可能与被退休值共享的最后一个纪元。
    pub target: u64,
    /// The global epoch that ended the wait. Always `> target`.
    /// 结束等待时的全局纪元。总是 `> target`。
    pub observed: u64,
    /// Number of `try_advance` polls spent waiting.
    /// 等待期间调用 `try_advance` 的次数。
    pub polls: u64,
}

/// Advance the global epoch by one if every participant has caught up with it.
///
/// Safe to call from any number of threads at once and at any time.
pub(crate) fn try_advance(registry: &EpochRegistry) -> Advance {
    let old = registry.global_epoch.load(Ordering::Acquire);

    for (index, slot) in registry.thread_epochs.iter().enumerate() {
        // Acquire pairs with the release store at section exit: reads made
        // inside the section happen-before whatever this advance enables.
        if slot.load(Ordering::Acquire) < old {
            return Advance::Stalled {
                epoch: old,
                lagging: index,
            };
        }
    }

    match registry.global_epoch.compare_exchange(
        old,
        old + 1,
        Ordering::AcqRel,
        Ordering::Acquire,
    ) {
        Ok(_) => {
            registry.telemetry.on_epoch_advanced(old);
            Advance::Advanced { from: old }
        }
        Err(_) => Advance::Contended { from: old },
    }
}

/// Spin until the global epoch passes `from_epoch + 2`.
///
/// The caller's own slot is set to the target first so the caller never holds
/// back its own wait. A reader that recorded epoch `E` just before the global
/// epoch moved to `E + 1` may still hold a value displaced around that move;
/// once the global epoch exceeds `E + 2` every such reader has exited.
pub(crate) fn wait_for_quiescence(
    registry: &EpochRegistry,
    index: usize,
    from_epoch: u64,
) -> GracePeriod {
    let target = from_epoch + 2;

    // Release keeps the preceding pointer swap ordered before the bump.
    registry.publish(index, target);

    let mut polls = 0;
    loop {
        let observed = registry.global_epoch.load(Ordering::Acquire);
        if observed > target {
            return GracePeriod {
                target,
                observed,
                polls,
            };
        }

        try_advance(registry);
        polls += 1;
        spin_loop();
    }
}
