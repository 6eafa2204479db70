use core::sync::atomic::{AtomicUsize, Ordering};

use super::PoolKind;

/// 单个池的统计快照。
///
/// # 契约说明（What）
/// - `capacity`：编译期槽位数；`limit`：运行期限额，恒有 `limit <= capacity`；
/// - `in_use`：当前借出（含分离状态）的槽位数，恒有 `in_use <= limit`；
/// - `total_acquired - total_released == in_use` 在无并发变更的观察点上成立；
/// - `failed_acquisitions`：因耗尽被拒绝的借出次数，用于评估背压频率。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub kind: PoolKind,
    pub capacity: usize,
    pub limit: usize,
    pub in_use: usize,
    pub available: usize,
    pub high_watermark: usize,
    pub total_acquired: usize,
    pub total_released: usize,
    pub failed_acquisitions: usize,
}

/// `PoolMetrics` 以原子计数记录借出、归还与失败次数。
///
/// 计数只用于诊断，采用 `Relaxed` 序即可；池的正确性由台账锁保证，不依赖这些计数。
pub(crate) struct PoolMetrics {
    acquired: AtomicUsize,
    released: AtomicUsize,
    failed_acquisitions: AtomicUsize,
    high_watermark: AtomicUsize,
}

impl PoolMetrics {
    pub(crate) const fn new() -> Self {
        Self {
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            failed_acquisitions: AtomicUsize::new(0),
            high_watermark: AtomicUsize::new(0),
        }
    }

    pub(crate) fn record_acquire(&self, in_use: usize) {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        self.high_watermark.fetch_max(in_use, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        kind: PoolKind,
        capacity: usize,
        limit: usize,
        in_use: usize,
    ) -> PoolStats {
        PoolStats {
            kind,
            capacity,
            limit,
            in_use,
            available: limit.saturating_sub(in_use),
            high_watermark: self.high_watermark.load(Ordering::Relaxed),
            total_acquired: self.acquired.load(Ordering::Relaxed),
            total_released: self.released.load(Ordering::Relaxed),
            failed_acquisitions: self.failed_acquisitions.load(Ordering::Relaxed),
        }
    }
}
