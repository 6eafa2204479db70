use core::fmt;

use crate::{
    config::{TX_QUEUE_ITEM_MAX_COUNT, TX_QUEUE_ITEM_SFRAME_MAX_COUNT},
    error::CpcError,
    frame::Frame,
    pool::{BlockId, BlockLease, BlockPool, Zeroed},
    registry::CpcBuffers,
    sync::CriticalCell,
};

use super::{Linked, LinkedFifo};

/// 发送帧的类别，决定队列项来自哪个池。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxClass {
    /// 信息帧（携带用户数据）。
    Data,
    /// 监督帧（确认、拒绝、复位）。
    Supervisory,
}

/// 发送队列项槽位：持有帧的一份共享引用。
pub struct TxQueueEntry {
    frame: Option<BlockId>,
    next: Option<BlockId>,
}

impl Zeroed for TxQueueEntry {
    const ZEROED: Self = Self {
        frame: None,
        next: None,
    };
}

impl Linked for TxQueueEntry {
    fn next(&self) -> Option<BlockId> {
        self.next
    }

    fn set_next(&mut self, next: Option<BlockId>) {
        self.next = next;
    }
}

/// 数据帧发送队列项租约。
pub type TxQueueItem<'p> = BlockLease<'p, TxQueueEntry, TX_QUEUE_ITEM_MAX_COUNT>;

/// 监督帧发送队列项租约。
pub type SupervisoryTxQueueItem<'p> =
    BlockLease<'p, TxQueueEntry, TX_QUEUE_ITEM_SFRAME_MAX_COUNT>;

/// 数据帧发送队列。
pub type DataTxQueue<'p> = TxQueue<'p, TX_QUEUE_ITEM_MAX_COUNT>;

/// 监督帧发送队列，队列项池与数据帧隔离。
pub type SupervisoryTxQueue<'p> = TxQueue<'p, TX_QUEUE_ITEM_SFRAME_MAX_COUNT>;

/// 等待物理层发送的帧队列。
///
/// # 契约说明（What）
/// - [`push`](Self::push) 从本类别的池借出一个队列项并持有帧的一份引用；
///   池耗尽或帧来自其他注册表时帧原样交还，调用方据此施加背压或修正调用；
/// - [`pop`](Self::pop) 取出的 [`TxItem`] 被丢弃时释放帧引用与队列项槽位；
/// - 需要同时保留在重传窗口中的帧，入队前先 `clone` 一份即可。
pub struct TxQueue<'p, const N: usize> {
    buffers: &'p CpcBuffers,
    pool: &'p BlockPool<TxQueueEntry, N>,
    class: TxClass,
    list: CriticalCell<LinkedFifo>,
}

impl<'p, const N: usize> TxQueue<'p, N> {
    pub(crate) const fn new(
        buffers: &'p CpcBuffers,
        pool: &'p BlockPool<TxQueueEntry, N>,
        class: TxClass,
    ) -> Self {
        Self {
            buffers,
            pool,
            class,
            list: CriticalCell::new(LinkedFifo::new()),
        }
    }

    pub fn class(&self) -> TxClass {
        self.class
    }

    pub fn len(&self) -> usize {
        self.list.with(|list| list.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 帧入队。
    pub fn push(&self, frame: Frame<'p>) -> Result<(), (CpcError, Frame<'p>)> {
        if !core::ptr::eq(frame.buffers(), self.buffers) {
            return Err((CpcError::ForeignRegistry, frame));
        }
        let mut item = match self.pool.acquire() {
            Ok(item) => item,
            Err(error) => return Err((error, frame)),
        };
        let frame = frame.into_raw();
        item.with_mut(|entry| entry.frame = Some(frame));
        let id = item.detach();
        self.list.with(|list| list.push_back(self.pool, id));
        Ok(())
    }

    /// 取出队首帧。
    pub fn pop(&self) -> Option<TxItem<'p, N>> {
        loop {
            let id = self.list.with(|list| list.pop_front(self.pool))?;
            let Ok(mut item) = self.pool.reclaim(id) else {
                continue;
            };
            let queued = item.with_mut(|entry| entry.frame.take());
            let Some(frame) = queued.and_then(|id| Frame::from_raw(self.buffers, id)) else {
                tracing::error!(
                    pool = self.pool.kind().as_str(),
                    slot = id.slot(),
                    "tx queue entry without live frame skipped"
                );
                continue;
            };
            return Some(TxItem { frame, item });
        }
    }
}

impl<const N: usize> Drop for TxQueue<'_, N> {
    fn drop(&mut self) {
        while let Some(item) = self.pop() {
            drop(item);
        }
    }
}

impl<const N: usize> fmt::Debug for TxQueue<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxQueue")
            .field("class", &self.class)
            .field("len", &self.len())
            .finish()
    }
}

/// 从发送队列取出的项。
#[derive(Debug)]
pub struct TxItem<'p, const N: usize> {
    frame: Frame<'p>,
    item: BlockLease<'p, TxQueueEntry, N>,
}

impl<'p, const N: usize> TxItem<'p, N> {
    pub fn frame(&self) -> &Frame<'p> {
        &self.frame
    }

    /// 取出帧引用，队列项槽位随即归还。
    pub fn into_frame(self) -> Frame<'p> {
        let Self { frame, item } = self;
        drop(item);
        frame
    }
}
