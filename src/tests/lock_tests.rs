/// 自旋锁测试模块
/// 测试 SpinLock / ReadWriteSpinLock 的状态转换、互斥性和 LockedSlot
use crate::harness::Payload;
use crate::{LockedSlot, RawSpinLock, ReadWriteSpinLock, SpinLock};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

/// 测试1: SpinLock 的状态转换，共享加锁是独占加锁的别名
#[test]
fn test_spin_lock_states() {
    let lock = SpinLock::new();
    assert_eq!(lock.state(), 0);

    lock.lock();
    assert_eq!(lock.state(), -1);
    assert!(!lock.try_lock());
    assert!(!lock.try_lock_shared());
    lock.unlock();
    assert_eq!(lock.state(), 0);

    lock.lock_shared();
    assert_eq!(lock.state(), -1);
    assert!(!lock.try_lock_shared());
    lock.unlock_shared();
    assert_eq!(lock.state(), 0);
}

/// 测试2: ReadWriteSpinLock 计数读者，独占持有时拒绝读者
#[test]
fn test_read_write_spin_lock_states() {
    let lock = ReadWriteSpinLock::new();

    lock.lock_shared();
    lock.lock_shared();
    assert_eq!(lock.state(), 2);
    assert!(!lock.try_lock());

    lock.unlock_shared();
    assert_eq!(lock.state(), 1);
    lock.unlock_shared();
    assert_eq!(lock.state(), 0);

    lock.lock();
    assert_eq!(lock.state(), -1);
    assert!(!lock.try_lock_shared());
    // 被拒绝的读者不能修改状态
    assert_eq!(lock.state(), -1);
    lock.unlock();
    assert_eq!(lock.state(), 0);
}

/// 测试3: 两个读者可以同时持有 ReadWriteSpinLock
#[test]
fn test_readers_hold_read_write_lock_together() {
    let lock = Arc::new(ReadWriteSpinLock::new());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let lock = lock.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                lock.lock_shared();
                barrier.wait();
                assert_eq!(lock.state(), 2);
                barrier.wait();
                lock.unlock_shared();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(lock.state(), 0);
}

/// Hammer `L` from several threads, tracking holders on each side.
fn check_mutual_exclusion<L: RawSpinLock + 'static>(shared_readers_allowed: bool) {
    let lock = Arc::new(L::default());
    let writers = Arc::new(AtomicI32::new(0));
    let readers = Arc::new(AtomicI32::new(0));
    let max_readers = Arc::new(AtomicI32::new(0));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let lock = lock.clone();
            let writers = writers.clone();
            let readers = readers.clone();
            let max_readers = max_readers.clone();
            thread::spawn(move || {
                for i in 0..5_000 {
                    if (i + t) % 4 == 0 {
                        lock.lock();
                        assert_eq!(writers.fetch_add(1, Ordering::SeqCst), 0);
                        assert_eq!(readers.load(Ordering::SeqCst), 0);
                        writers.fetch_sub(1, Ordering::SeqCst);
                        lock.unlock();
                    } else {
                        lock.lock_shared();
                        assert_eq!(writers.load(Ordering::SeqCst), 0);
                        let now = readers.fetch_add(1, Ordering::SeqCst) + 1;
                        max_readers.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        readers.fetch_sub(1, Ordering::SeqCst);
                        lock.unlock_shared();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(lock.state(), 0);
    if !shared_readers_allowed {
        assert_eq!(max_readers.load(Ordering::SeqCst), 1);
    }
}

/// 测试4: SpinLock 完全互斥，包括读者之间
#[test]
fn test_spin_lock_mutual_exclusion() {
    check_mutual_exclusion::<SpinLock>(false);
}

/// 测试5: ReadWriteSpinLock 写入者与所有人互斥
#[test]
fn test_read_write_spin_lock_mutual_exclusion() {
    check_mutual_exclusion::<ReadWriteSpinLock>(true);
}

/// 测试6: LockedSlot 的读、替换、删除
#[test]
fn test_locked_slot_operations() {
    let slot = LockedSlot::<Payload, ReadWriteSpinLock>::new();
    assert!(slot.read(|value| value.is_none()));

    assert!(slot.replace(Some(Box::new(Payload::new()))).is_none());
    assert!(slot.read(|value| value.is_some_and(Payload::is_intact)));
    assert_eq!(slot.raw_lock().state(), 0);

    let old = slot.remove();
    assert!(old.is_some_and(|payload| payload.is_intact()));
    assert!(slot.read(|value| value.is_none()));
}

/// 测试7: 闭包 panic 时读锁也会被释放
#[test]
fn test_locked_slot_unlocks_on_panic() {
    let slot = Arc::new(LockedSlot::<u32, SpinLock>::with_value(7));

    let panicking = slot.clone();
    let result = thread::spawn(move || {
        panicking.read(|_| -> () { panic!("reader failed") });
    })
    .join();

    assert!(result.is_err());
    assert_eq!(slot.raw_lock().state(), 0);
    assert_eq!(slot.read(|value| value.copied()), Some(7));
}
