//! 固定容量块池与租约。
//!
//! # 模块角色（Why）
//! - [`BlockPool`] 是整个引擎唯一的内存来源：编译期定长的槽位数组加上一本台账，
//!   不增长、不阻塞、不依赖堆；
//! - [`BlockLease`] 在 `Drop` 时把槽位还给所属池，借出与归还因此天然一一对应，
//!   重复释放在类型层面不可表达；
//! - 需要把块交给帧记录、队列或驱动 DMA 描述符时，租约可以分离为带代数的 [`BlockId`]，
//!   之后再通过 [`BlockPool::reclaim`] 恢复所有权；过期或重复的标识会被台账拒绝。
//!
//! # 核心机制（How）
//! - 台账（自由链表 + 代数 + 借出计数）与每个槽位都放在临界区单元中，
//!   台账临界区只做 O(1) 的链表操作；
//! - 借出时把槽位重置为 [`Zeroed::ZEROED`]，保证调用方拿到的永远是零初始化内容。
//!
//! # 契约说明（What）
//! - **中断安全**：任何路径都不等待锁；中断处理函数可以在任务借出或归还的中途
//!   对同一池借出或归还，临界区保证台账不会被交错修改；
//! - 访问槽位内容的闭包在临界区内执行，只应做字节拷贝一类的短操作。

mod ledger;
mod metrics;

use core::fmt;

use crate::{
    error::{CpcError, Result},
    flow_control::FlowControl,
    sync::CriticalCell,
};

use self::ledger::{Ledger, SlotState};

pub use self::metrics::PoolStats;
use self::metrics::PoolMetrics;

/// 缓冲类别，每个类别对应一个独立的池。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PoolKind {
    FrameHandle,
    HeaderBuffer,
    RejectPayload,
    RxPayload,
    Endpoint,
    RxQueueItem,
    TxQueueItem,
    SupervisoryTxQueueItem,
    EndpointClosedNotice,
    SystemCommand,
}

impl PoolKind {
    /// 类别总数。
    pub const COUNT: usize = 10;

    /// 按注册表布局排列的全部类别。
    pub const ALL: [PoolKind; Self::COUNT] = [
        PoolKind::FrameHandle,
        PoolKind::HeaderBuffer,
        PoolKind::RejectPayload,
        PoolKind::RxPayload,
        PoolKind::Endpoint,
        PoolKind::RxQueueItem,
        PoolKind::TxQueueItem,
        PoolKind::SupervisoryTxQueueItem,
        PoolKind::EndpointClosedNotice,
        PoolKind::SystemCommand,
    ];

    /// 用于日志与错误信息的稳定名称。
    pub const fn as_str(self) -> &'static str {
        match self {
            PoolKind::FrameHandle => "frame_handle",
            PoolKind::HeaderBuffer => "header_buffer",
            PoolKind::RejectPayload => "reject_payload",
            PoolKind::RxPayload => "rx_payload",
            PoolKind::Endpoint => "endpoint",
            PoolKind::RxQueueItem => "rx_queue_item",
            PoolKind::TxQueueItem => "tx_queue_item",
            PoolKind::SupervisoryTxQueueItem => "supervisory_tx_queue_item",
            PoolKind::EndpointClosedNotice => "endpoint_closed_notice",
            PoolKind::SystemCommand => "system_command",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 可作为池槽位内容的类型：提供编译期可求值的零值。
///
/// 池在构造时用零值填满全部槽位，并在每次借出时重置，
/// 因此实现者的零值应当是“无任何关联资源”的状态。
pub trait Zeroed: Sized {
    const ZEROED: Self;
}

/// 带代数的槽位标识。
///
/// 槽位每归还一次代数加一，旧标识随即失效；
/// 它只在分离状态下代表所有权，不能被复制出第二份所有权（`reclaim` 只会成功一次）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId {
    index: u32,
    generation: u32,
}

impl BlockId {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// 槽位下标。
    pub const fn slot(&self) -> usize {
        self.index as usize
    }

    /// 借出时的代数。
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// `BlockPool` 是容量为 `N` 的定长块池。
///
/// # 契约说明（What）
/// - 同时借出的槽位数不超过运行期限额 `limit`（`limit <= N`）；
/// - 耗尽时立即返回 [`CpcError::Exhausted`]，既不阻塞也不扩容；
/// - 槽位归还后触发本池的 [`FlowControl`] 通知（仅接收负载池会注册钩子）。
pub struct BlockPool<T: Zeroed, const N: usize> {
    kind: PoolKind,
    ledger: CriticalCell<Ledger<N>>,
    slots: [CriticalCell<T>; N],
    metrics: PoolMetrics,
    flow_control: FlowControl,
}

impl<T: Zeroed, const N: usize> BlockPool<T, N> {
    /// 构造池；`limit` 超过 `N` 时截断为 `N`。
    pub const fn new(kind: PoolKind, limit: usize) -> Self {
        Self {
            kind,
            ledger: CriticalCell::new(Ledger::new(limit)),
            slots: [const { CriticalCell::new(T::ZEROED) }; N],
            metrics: PoolMetrics::new(),
            flow_control: FlowControl::new(),
        }
    }

    /// 借出一个零初始化的槽位。
    ///
    /// # 契约说明（What）
    /// - **返回值**：成功时返回独占租约；池耗尽时返回 [`CpcError::Exhausted`]；
    /// - **后置条件**：失败不改变任何槽位，仅累加 `failed_acquisitions`。
    pub fn acquire(&self) -> Result<BlockLease<'_, T, N>> {
        let taken = self
            .ledger
            .with(|ledger| ledger.take().map(|id| (id, ledger.in_use())));
        match taken {
            Some((id, in_use)) => {
                self.metrics.record_acquire(in_use);
                self.slots[id.slot()].with(|slot| *slot = T::ZEROED);
                Ok(BlockLease { pool: self, id })
            }
            None => {
                self.metrics.record_failure();
                tracing::debug!(pool = self.kind.as_str(), "pool exhausted");
                Err(CpcError::Exhausted { pool: self.kind })
            }
        }
    }

    /// 将分离的标识恢复为独占租约。
    ///
    /// # 契约说明（What）
    /// - **前置条件**：`id` 来自本池某个租约的 [`BlockLease::detach`]；
    /// - **返回值**：成功时返回租约；若标识过期、已被恢复过或从未分离，
    ///   返回 [`CpcError::StaleBlock`] 且不改变任何状态。
    pub fn reclaim(&self, id: BlockId) -> Result<BlockLease<'_, T, N>> {
        let transitioned = self
            .ledger
            .with(|ledger| ledger.transition(id, SlotState::Detached, SlotState::Owned));
        match transitioned {
            Ok(()) => Ok(BlockLease { pool: self, id }),
            Err(_) => {
                tracing::error!(
                    pool = self.kind.as_str(),
                    slot = id.slot(),
                    generation = id.generation(),
                    "reclaim of stale block id"
                );
                Err(CpcError::StaleBlock { pool: self.kind })
            }
        }
    }

    /// 池类别。
    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// 编译期容量。
    pub const fn capacity(&self) -> usize {
        N
    }

    /// 运行期限额。
    pub fn limit(&self) -> usize {
        self.ledger.with(|ledger| ledger.limit())
    }

    /// 当前借出数量。
    pub fn in_use(&self) -> usize {
        self.ledger.with(|ledger| ledger.in_use())
    }

    /// 当前仍可借出的数量。
    pub fn available(&self) -> usize {
        self.ledger
            .with(|ledger| ledger.limit().saturating_sub(ledger.in_use()))
    }

    /// 诊断快照。
    pub fn stats(&self) -> PoolStats {
        let (limit, in_use) = self
            .ledger
            .with(|ledger| (ledger.limit(), ledger.in_use()));
        self.metrics.snapshot(self.kind, N, limit, in_use)
    }

    /// 本池的归还通知槽位。
    pub fn flow_control(&self) -> &FlowControl {
        &self.flow_control
    }

    /// 归还一个分离状态的槽位，供帧记录与队列在回收内部标识时使用。
    pub(crate) fn release_detached(&self, id: BlockId) -> Result<()> {
        self.release_with(id, SlotState::Detached)
    }

    /// 按下标取得槽位单元，调用方需确保自己持有该槽位的所有权。
    pub(crate) fn slot(&self, id: BlockId) -> Option<&CriticalCell<T>> {
        self.slots.get(id.slot())
    }

    /// 标识是否仍指向一个借出中的槽位。
    pub(crate) fn is_live(&self, id: BlockId) -> bool {
        self.ledger.with(|ledger| ledger.is_live(id))
    }

    /// 访问一个仍然存活的槽位；标识过期或槽位正被访问时返回 `None`。
    ///
    /// 存活检查与访问处于同一临界区，槽位不会在两者之间被归还或重新借出。
    pub(crate) fn with_live<R>(&self, id: BlockId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|_| {
            if !self.is_live(id) {
                return None;
            }
            self.slots.get(id.slot())?.try_with(f)
        })
    }

    fn detach(&self, id: BlockId) {
        let transitioned = self
            .ledger
            .with(|ledger| ledger.transition(id, SlotState::Owned, SlotState::Detached));
        if transitioned.is_err() {
            tracing::error!(pool = self.kind.as_str(), slot = id.slot(), "detach of unowned block");
        }
    }

    fn release_with(&self, id: BlockId, expected: SlotState) -> Result<()> {
        let released = self.ledger.with(|ledger| ledger.give_back(id, expected));
        match released {
            Ok(()) => {
                self.metrics.record_release();
                self.flow_control.on_receive_buffer_freed();
                Ok(())
            }
            Err(_) => {
                tracing::error!(
                    pool = self.kind.as_str(),
                    slot = id.slot(),
                    generation = id.generation(),
                    "release of stale block id"
                );
                Err(CpcError::StaleBlock { pool: self.kind })
            }
        }
    }
}

/// `BlockLease` 是对池中单个槽位的独占租约。
///
/// # 角色定位（Why）
/// - 把“借出即负责归还”的约定交给所有权系统：租约只能被移动，不能被复制，
///   `Drop` 恰好执行一次归还；
/// - 失败路径上的部分组装（例如已取得头部、负载却耗尽）只需让租约离开作用域即可完整回滚。
///
/// # 契约说明（What）
/// - 内容访问通过 [`with`](Self::with)/[`with_mut`](Self::with_mut) 进行，
///   闭包在临界区内执行；
/// - [`detach`](Self::detach) 之后槽位保持借出，直到对应标识被 [`BlockPool::reclaim`]
///   恢复并再次 `Drop`。
pub struct BlockLease<'p, T: Zeroed, const N: usize> {
    pool: &'p BlockPool<T, N>,
    id: BlockId,
}

impl<'p, T: Zeroed, const N: usize> BlockLease<'p, T, N> {
    /// 槽位标识。
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// 所属池的类别。
    pub fn kind(&self) -> PoolKind {
        self.pool.kind
    }

    /// 只读访问槽位内容。
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.slot_ref().read(f)
    }

    /// 可写访问槽位内容。
    pub fn with_mut<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        self.slot_ref().with(f)
    }

    /// 分离为裸标识，槽位保持借出状态。
    pub fn detach(self) -> BlockId {
        let id = self.id;
        self.pool.detach(id);
        core::mem::forget(self);
        id
    }

    /// 显式归还槽位，等价于 `drop`。
    pub fn release(self) {
        drop(self);
    }

    /// 租约是否来自 `pool`。
    pub(crate) fn is_from(&self, pool: &BlockPool<T, N>) -> bool {
        core::ptr::eq(self.pool, pool)
    }

    pub(crate) fn slot_ref(&self) -> &'p CriticalCell<T> {
        &self.pool.slots[self.id.slot()]
    }
}

impl<T: Zeroed, const N: usize> Drop for BlockLease<'_, T, N> {
    fn drop(&mut self) {
        let _ = self.pool.release_with(self.id, SlotState::Owned);
    }
}

impl<T: Zeroed, const N: usize> fmt::Debug for BlockLease<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockLease")
            .field("pool", &self.pool.kind)
            .field("id", &self.id)
            .finish()
    }
}
