/// 遥测测试模块
/// 测试操作计数、按纪元采样、停止信号和完整性违规标志
use crate::{Operation, RcuDomain, Telemetry, TelemetryConfig};

/// 测试1: 每个参与者的计数被汇总
#[test]
fn test_record_and_totals() {
    let telemetry = Telemetry::new(2, TelemetryConfig::default());

    assert_eq!(telemetry.record(0, Operation::Read), 1);
    assert_eq!(telemetry.record(0, Operation::Read), 2);
    assert_eq!(telemetry.record(1, Operation::Read), 1);
    telemetry.record(1, Operation::Update);
    telemetry.record(0, Operation::Delete);

    let totals = telemetry.totals();
    assert_eq!(totals.reads, 3);
    assert_eq!(totals.updates, 1);
    assert_eq!(totals.deletes, 1);
    assert_eq!(totals.total(), 5);
}

/// 测试2: 检测器在纪元的非零倍数处采样
#[test]
fn test_detector_samples_every_n_epochs() {
    let domain = RcuDomain::builder()
        .capacity(1)
        .sample_every_epochs(2u64)
        .build();

    for _ in 0..5 {
        domain.try_advance();
    }
    assert_eq!(domain.global_epoch(), 5);

    let epochs: Vec<_> = domain
        .telemetry()
        .samples()
        .iter()
        .map(|sample| sample.epoch)
        .collect();
    assert_eq!(epochs, vec![Some(2), Some(4)]);
    assert!(!domain.telemetry().should_stop());
}

/// 测试3: 到达停止纪元时发出停止信号
#[test]
fn test_stop_at_epoch() {
    let domain = RcuDomain::builder().stop_at_epoch(3u64).build();

    for _ in 0..3 {
        domain.try_advance();
    }
    assert!(!domain.telemetry().should_stop());

    domain.try_advance();
    assert!(domain.telemetry().should_stop());
}

/// 测试4: 读取次数超过阈值的采样发出停止信号
#[test]
fn test_stop_after_reads() {
    let telemetry = Telemetry::new(
        1,
        TelemetryConfig {
            stop_after_reads: Some(2),
            ..TelemetryConfig::default()
        },
    );

    telemetry.record(0, Operation::Read);
    telemetry.record(0, Operation::Read);
    let sample = telemetry.sample(None);
    assert_eq!(sample.totals.reads, 2);
    assert!(!telemetry.should_stop());

    telemetry.record(0, Operation::Read);
    telemetry.sample(None);
    assert!(telemetry.should_stop());
    assert_eq!(telemetry.samples().len(), 2);
}

/// 测试5: 完整性违规被计数
#[test]
fn test_report_violation() {
    let telemetry = Telemetry::new(1, TelemetryConfig::default());
    assert_eq!(telemetry.violations(), 0);

    telemetry.report_violation(0);
    telemetry.report_violation(0);
    assert_eq!(telemetry.violations(), 2);
}

/// 测试6: 参与者的操作计入域的遥测
#[test]
fn test_participant_records_into_domain() {
    let domain = RcuDomain::builder().capacity(2).build();
    let a = domain.join().unwrap();
    let b = domain.join().unwrap();

    a.record(Operation::Read);
    b.record(Operation::Update);
    b.record(Operation::Delete);

    let totals = domain.telemetry().totals();
    assert_eq!((totals.reads, totals.updates, totals.deletes), (1, 1, 1));
}
