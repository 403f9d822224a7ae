/// 宽限期测试模块
/// 测试 wait_for_quiescence 的正确性与活性、以及并发推进纪元
use crate::{Advance, RcuDomain};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

/// 测试1: 写入者等待仍处于临界区的读者退出
#[test]
fn test_synchronize_waits_for_open_section() {
    let domain = RcuDomain::builder().capacity(2).build();
    let writer = domain.join().unwrap();

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let reader_domain = domain.clone();
    let reader = thread::spawn(move || {
        let me = reader_domain.join().unwrap();
        let section = me.enter();
        entered_tx.send(me.epoch()).unwrap();
        release_rx.recv().unwrap();
        drop(section);
    });

    let reader_epoch = entered_rx.recv().unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let writer_done = done.clone();
    let writer_thread = thread::spawn(move || {
        let grace = writer.synchronize();
        writer_done.store(true, Ordering::SeqCst);
        grace
    });

    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst));
    // 读者停在 reader_epoch，全局纪元最多只能领先一步
    assert!(domain.global_epoch() <= reader_epoch + 1);

    release_tx.send(()).unwrap();
    reader.join().unwrap();
    let grace = writer_thread.join().unwrap();

    assert!(done.load(Ordering::SeqCst));
    assert!(grace.observed > grace.target);
    assert!(domain.global_epoch() > reader_epoch + 2);
}

/// 测试2: 空闲的参与者阻塞写入者，直到它 quiesce
#[test]
fn test_idle_participant_blocks_until_quiesce() {
    let domain = RcuDomain::builder().capacity(2).build();
    let idle = domain.join().unwrap();
    let writer = domain.join().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let writer_done = done.clone();
    let writer_thread = thread::spawn(move || {
        writer.synchronize();
        writer_done.store(true, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(20));
    assert!(!done.load(Ordering::SeqCst));
    assert!(domain.global_epoch() <= 1);

    while !done.load(Ordering::SeqCst) {
        idle.quiesce();
        thread::yield_now();
    }
    writer_thread.join().unwrap();
}

/// 测试3: 离开的参与者不再阻塞写入者
#[test]
fn test_leaving_participant_unblocks_writer() {
    let domain = RcuDomain::builder().capacity(2).build();
    let idle = domain.join().unwrap();
    let writer = domain.join().unwrap();

    let writer_thread = thread::spawn(move || writer.synchronize());

    thread::sleep(Duration::from_millis(20));
    assert!(!writer_thread.is_finished());

    drop(idle);
    let grace = writer_thread.join().unwrap();
    assert!(grace.observed > grace.target);
}

/// 测试4: 并发调用 try_advance 时每次成功都恰好推进 1
#[test]
fn test_concurrent_try_advance_counts_exactly() {
    let domain = RcuDomain::builder().capacity(4).build();
    let advanced = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let domain = domain.clone();
            let advanced = advanced.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    if let Advance::Advanced { .. } = domain.try_advance() {
                        advanced.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(domain.global_epoch(), advanced.load(Ordering::SeqCst));
    assert!(domain.global_epoch() >= 1000);
}

/// 测试5: 多个写入者并发等待宽限期时相互协作
#[test]
fn test_concurrent_writers_cooperate() {
    let domain = RcuDomain::builder().capacity(4).build();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let domain = domain.clone();
            thread::spawn(move || {
                let me = domain.join().unwrap();
                let mut last_seen = 0;
                for _ in 0..100 {
                    let grace = me.synchronize();
                    assert!(grace.observed > grace.target);
                    let now = domain.global_epoch();
                    assert!(now >= grace.observed);
                    assert!(now >= last_seen);
                    last_seen = now;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// 测试6: 读者持续读取时，写入者的每次等待都能结束
#[test]
fn test_writer_progress_under_reader_contention() {
    let domain = RcuDomain::builder().capacity(4).build();
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let domain = domain.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let me = domain.join().unwrap();
                let mut sections = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    let _section = me.enter();
                    sections += 1;
                }
                sections
            })
        })
        .collect();

    let writer = domain.join().unwrap();
    let mut total_polls = 0;
    for _ in 0..200 {
        let grace = writer.synchronize();
        assert!(grace.observed > grace.target);
        total_polls += grace.polls;
    }
    stop.store(true, Ordering::Relaxed);

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(total_polls >= 200);
}
