use thiserror::Error;

/// Errors raised while joining an RCU domain.
/// 加入 RCU 域时产生的错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every participant slot is claimed.
    /// 所有参与者槽位都已被占用。
    #[error("epoch registry is full: all {capacity} participant slots are claimed")]
    Full { capacity: usize },
}

/// Errors raised by the workload harness before or after a run.
///
/// The run itself never fails: integrity violations are counted in the report.
///
/// 工作负载驱动在运行前后产生的错误。
/// 运行本身不会失败：完整性违规会计入报告。
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("workload needs at least one worker thread")]
    NoThreads,

    #[error("read ({read}%) and update ({update}%) shares exceed 100%")]
    InvalidMix { read: u32, update: u32 },

    #[error("workload never stops: reads and read sampling must both be enabled")]
    Unbounded,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}
