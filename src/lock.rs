//! Spin-lock baselines the RCU path is measured against.
//!
//! Both locks busy-wait on a single `i32` state and never block in the
//! scheduler. Neither is fair: a steady stream of readers can starve a writer
//! and vice versa.
//!
//! RCU 路径所对比的自旋锁基线。
//! 两种锁都在单个 `i32` 状态上忙等待，从不在调度器中阻塞。两者都不公平：
//! 持续的读者流可以饿死写入者，反之亦然。

use crate::sync::{AtomicI32, Ordering, UnsafeCell, spin_loop};
use std::boxed::Box;

const UNLOCKED: i32 = 0;
const EXCLUSIVE: i32 = -1;

/// Raw lock interface shared by both baselines.
///
/// Callers pair every successful `lock*` with the matching `unlock*`.
///
/// 两种基线共享的原始锁接口。调用者必须为每次成功的 `lock*` 配对对应的 `unlock*`。
pub trait RawSpinLock: Default + Send + Sync {
    fn lock(&self);
    fn unlock(&self);
    fn lock_shared(&self);
    fn unlock_shared(&self);

    /// Single attempt at `lock`.
    fn try_lock(&self) -> bool;
    /// Single attempt at `lock_shared`.
    fn try_lock_shared(&self) -> bool;

    /// Snapshot of the raw state: `-1` held exclusively, `0` free, `n > 0` readers.
    fn state(&self) -> i32;
}

/// Exclusive spin lock. `0` is free, `-1` is held.
///
/// Shared locking is the exclusive lock under another name: this is the naive
/// baseline with no concurrent readers at all.
///
/// 独占自旋锁。`0` 表示空闲，`-1` 表示已持有。
/// 共享加锁只是独占锁的别名：这是完全没有并发读者的朴素基线。
#[derive(Debug, Default)]
pub struct SpinLock {
    state: AtomicI32,
}

impl SpinLock {
    pub fn new() -> Self {
        Self {
            state: AtomicI32::new(UNLOCKED),
        }
    }
}

impl RawSpinLock for SpinLock {
    #[inline]
    fn lock(&self) {
        // Spin on plain loads and only attempt the CAS once the lock looks free.
        while self.state.load(Ordering::Relaxed) != UNLOCKED || !self.try_lock() {
            spin_loop();
        }
    }

    #[inline]
    fn unlock(&self) {
        self.state.store(UNLOCKED, Ordering::Release);
    }

    #[inline]
    fn lock_shared(&self) {
        self.lock();
    }

    #[inline]
    fn unlock_shared(&self) {
        self.unlock();
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, EXCLUSIVE, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.try_lock()
    }

    #[inline]
    fn state(&self) -> i32 {
        self.state.load(Ordering::Relaxed)
    }
}

/// Reader/writer spin lock. `-1` is held exclusively, `n >= 0` counts readers.
///
/// 读写自旋锁。`-1` 表示独占持有，`n >= 0` 为读者数量。
#[derive(Debug, Default)]
pub struct ReadWriteSpinLock {
    state: AtomicI32,
}

impl ReadWriteSpinLock {
    pub fn new() -> Self {
        Self {
            state: AtomicI32::new(UNLOCKED),
        }
    }
}

impl RawSpinLock for ReadWriteSpinLock {
    #[inline]
    fn lock(&self) {
        while self.state.load(Ordering::Relaxed) != UNLOCKED || !self.try_lock() {
            spin_loop();
        }
    }

    /// Exclusive mode has no other holders, so a plain store releases it.
    #[inline]
    fn unlock(&self) {
        self.state.store(UNLOCKED, Ordering::Release);
    }

    #[inline]
    fn lock_shared(&self) {
        while !self.try_lock_shared() {
            spin_loop();
        }
    }

    #[inline]
    fn unlock_shared(&self) {
        self.state.fetch_sub(1, Ordering::Release);
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.state
            .compare_exchange(UNLOCKED, EXCLUSIVE, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Fails on an exclusive hold or on losing the increment race.
    #[inline]
    fn try_lock_shared(&self) -> bool {
        let readers = self.state.load(Ordering::Relaxed);
        readers >= 0
            && self
                .state
                .compare_exchange(readers, readers + 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
    }

    #[inline]
    fn state(&self) -> i32 {
        self.state.load(Ordering::Relaxed)
    }
}

struct SharedGuard<'a, L: RawSpinLock>(&'a L);

impl<L: RawSpinLock> Drop for SharedGuard<'_, L> {
    fn drop(&mut self) {
        self.0.unlock_shared();
    }
}

struct ExclusiveGuard<'a, L: RawSpinLock>(&'a L);

impl<L: RawSpinLock> Drop for ExclusiveGuard<'_, L> {
    fn drop(&mut self) {
        self.0.unlock();
    }
}

/// A single-value slot protected by a spin lock instead of epochs.
///
/// Writers take the lock exclusively to swap the value and free the displaced
/// one after unlocking; readers hold the shared side for the whole access.
///
/// 由自旋锁而非纪元保护的单值槽。
/// 写入者独占加锁以交换值，并在解锁后释放被替换的值；读者在整个访问期间持有共享锁。
pub struct LockedSlot<T, L: RawSpinLock> {
    lock: L,
    value: UnsafeCell<Option<Box<T>>>,
}

unsafe impl<T: Send, L: RawSpinLock> Send for LockedSlot<T, L> {}
unsafe impl<T: Send + Sync, L: RawSpinLock> Sync for LockedSlot<T, L> {}

impl<T, L: RawSpinLock> LockedSlot<T, L> {
    pub fn new() -> Self {
        Self {
            lock: L::default(),
            value: UnsafeCell::new(None),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            lock: L::default(),
            value: UnsafeCell::new(Some(Box::new(value))),
        }
    }

    /// Run `f` on the current value while holding the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        self.lock.lock_shared();
        let _guard = SharedGuard(&self.lock);
        // SAFETY: the shared lock excludes every writer.
        self.value.with(|value| f(unsafe { (*value).as_deref() }))
    }

    /// Swap in `value` under the exclusive lock and return the old value.
    ///
    /// The old value is returned rather than dropped so the caller frees it
    /// after the lock is released.
    pub fn replace(&self, value: Option<Box<T>>) -> Option<Box<T>> {
        self.lock.lock();
        let _guard = ExclusiveGuard(&self.lock);
        // SAFETY: the exclusive lock excludes every other reader and writer.
        self.value
            .with_mut(|slot| unsafe { std::mem::replace(&mut *slot, value) })
    }

    #[inline]
    pub fn remove(&self) -> Option<Box<T>> {
        self.replace(None)
    }

    /// The lock guarding this slot.
    #[inline]
    pub fn raw_lock(&self) -> &L {
        &self.lock
    }
}

impl<T, L: RawSpinLock> Default for LockedSlot<T, L> {
    fn default() -> Self {
        Self::new()
    }
}
